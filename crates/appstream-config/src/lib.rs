pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing directly at a settings file
pub const SETTINGS_PATH_ENV: &str = "APPSTREAM_PROVIDER_CONFIG";

const CONFIG_DIR_NAME: &str = "terraform-provider-appstream";
const GLOBAL_SETTINGS_FILE: &str = "config.yaml";
const LOCAL_CANDIDATES: [&str; 3] = ["appstream.local.yaml", "appstream.yaml", ".appstream.yaml"];

/// Provider settings used when the provider block leaves a value unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AWS region; falls back to the SDK default chain when unset
    pub region: Option<String>,

    /// Named profile from the shared AWS config files
    pub profile: Option<String>,

    /// Seconds between two fleet state checks
    pub poll_interval_secs: u64,

    /// Upper bound for one fleet state wait, `0` waits forever
    pub state_timeout_secs: u64,

    /// Seconds to wait before tagging a freshly created resource
    pub tag_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            poll_interval_secs: 20,
            state_timeout_secs: 30 * 60,
            tag_delay_secs: 2,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn state_timeout(&self) -> Option<Duration> {
        (self.state_timeout_secs > 0).then(|| Duration::from_secs(self.state_timeout_secs))
    }

    pub fn tag_delay(&self) -> Duration {
        Duration::from_secs(self.tag_delay_secs)
    }

    /// Load settings from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Discover and load the settings file, or fall back to defaults
    pub fn load() -> Result<Self> {
        match find_settings_file()? {
            Some(path) => {
                tracing::debug!("Loading provider settings from {}", path.display());
                Self::load_from(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Directory holding the global settings file
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME))
}

/// Locate the provider settings file
///
/// Search order:
/// 1. `APPSTREAM_PROVIDER_CONFIG` (must exist when set)
/// 2. current directory: `appstream.local.yaml`, `appstream.yaml`, `.appstream.yaml`
/// 3. `~/.config/terraform-provider-appstream/config.yaml`
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(SETTINGS_PATH_ENV) {
        let path = PathBuf::from(&config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::SettingsFileNotFound(config_path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &LOCAL_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join(GLOBAL_SETTINGS_FILE);
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(20));
        assert_eq!(settings.state_timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(settings.tag_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let settings = Settings {
            state_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.state_timeout(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("appstream.yaml");
        fs::write(&path, "region: eu-west-1\npoll_interval_secs: 5\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.poll_interval_secs, 5);
        assert_eq!(settings.tag_delay_secs, 2);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("appstream.yaml");
        fs::write(&path, "poll_interval_secs: soon\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings { .. }));
    }

    #[test]
    #[serial]
    fn test_find_settings_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "profile: streaming\n").unwrap();

        temp_env::with_var(SETTINGS_PATH_ENV, Some(path.to_str().unwrap()), || {
            assert_eq!(find_settings_file().unwrap(), Some(path.clone()));
            let settings = Settings::load().unwrap();
            assert_eq!(settings.profile.as_deref(), Some("streaming"));
        });
    }

    #[test]
    #[serial]
    fn test_find_settings_env_var_missing_file() {
        temp_env::with_var(SETTINGS_PATH_ENV, Some("/nonexistent/appstream.yaml"), || {
            let err = find_settings_file().unwrap_err();
            assert!(matches!(err, ConfigError::SettingsFileNotFound(_)));
        });
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("appstream.yaml"), "region: us-east-1\n").unwrap();
        fs::write(
            temp_dir.path().join("appstream.local.yaml"),
            "region: eu-central-1\n",
        )
        .unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(SETTINGS_PATH_ENV, find_settings_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().unwrap().ends_with("appstream.local.yaml"));
    }
}
