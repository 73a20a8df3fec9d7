//! AppStream provider error types

use appstream_plugin::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppStreamError {
    #[error("AppStream {operation} failed: {message}")]
    Api {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("AWS configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] appstream_config::ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] ProviderError),
}

impl AppStreamError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<AppStreamError> for ProviderError {
    fn from(err: AppStreamError) -> Self {
        match err {
            AppStreamError::Plugin(inner) => inner,
            AppStreamError::NotFound { kind, name } => {
                ProviderError::ResourceNotFound(format!("{} {}", kind, name))
            }
            AppStreamError::Config(message) => ProviderError::InvalidConfig(message),
            AppStreamError::Settings(e) => ProviderError::InvalidConfig(e.to_string()),
            other => ProviderError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppStreamError>;
