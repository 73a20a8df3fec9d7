//! Plugin error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the plugin host
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Resource type not registered: {0}")]
    UnknownResourceType(String),

    #[error("Provider is not configured")]
    NotConfigured,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid attribute '{attribute}': {message}")]
    InvalidAttribute { attribute: String, message: String },

    #[error("Invalid resource id '{id}': {message}")]
    InvalidId { id: String, message: String },

    #[error("Invalid protocol value: {0}")]
    Wire(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Timed out after {elapsed:?} waiting for {resource} to reach {target}")]
    Timeout {
        resource: String,
        target: String,
        elapsed: Duration,
    },

    #[error("Cancelled while waiting for {resource} to reach {target}")]
    Cancelled { resource: String, target: String },
}

impl ProviderError {
    pub fn invalid_attribute(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Failures while bringing up or running the plugin server
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
