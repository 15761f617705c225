//! Configuration file parser for ~/.config/chatter/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which is enough to run against a local service once a record id is given on
//! the command line. Unknown keys are accepted but logged as a warning.
use crate::feed::FeedSettings;
use crate::model::SortOrder;
use chrono::format::{Item, StrftimeItems};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `api_token` from the file.
pub const API_TOKEN_ENV: &str = "CHATTER_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// `Debug` masks `api_token` so the config can be logged safely.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the feed service. Must be https unless it points at loopback.
    pub base_url: String,

    /// Record whose feed is shown when `--record` is not given.
    pub record_id: Option<String>,

    /// Id of the signed-in user, used to flag own posts and comments.
    pub current_user_id: String,

    /// Posts per page.
    pub page_size: u32,

    /// Bearer token (alternative to CHATTER_API_TOKEN env var).
    /// Env var takes precedence over config file.
    pub api_token: Option<String>,

    pub request_timeout_secs: u64,

    /// Seconds a notification stays visible.
    pub notification_secs: u64,

    /// `chrono` strftime format for dates older than a week.
    pub date_format: String,

    /// "latest" or "oldest".
    pub default_sort: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            record_id: None,
            current_user_id: String::new(),
            page_size: 10,
            api_token: None,
            request_timeout_secs: 20,
            notification_secs: 3,
            date_format: crate::feed::projection::DEFAULT_DATE_FORMAT.to_string(),
            default_sort: "latest".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("record_id", &self.record_id)
            .field("current_user_id", &self.current_user_id)
            .field("page_size", &self.page_size)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("notification_secs", &self.notification_secs)
            .field("date_format", &self.date_format)
            .field("default_sort", &self.default_sort)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "base_url",
        "record_id",
        "current_user_id",
        "page_size",
        "api_token",
        "request_timeout_secs",
        "notification_secs",
        "date_format",
        "default_sort",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::InvalidValue)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            base_url = %config.base_url,
            page_size = config.page_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject values that would only fail later, far from the file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "page_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidValue {
                key: "date_format",
                message: format!("'{}' is not a valid strftime format", self.date_format),
            });
        }
        self.sort_order()?;
        Ok(())
    }

    pub fn sort_order(&self) -> Result<SortOrder, ConfigError> {
        self.default_sort
            .parse()
            .map_err(|message| ConfigError::InvalidValue {
                key: "default_sort",
                message,
            })
    }

    /// The bearer token, preferring the environment over the file.
    pub fn api_token(&self) -> Option<SecretString> {
        std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone())
            .map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// View-model settings for `record_id`.
    pub fn feed_settings(&self, record_id: String) -> FeedSettings {
        FeedSettings {
            record_id,
            current_user_id: self.current_user_id.clone(),
            page_size: self.page_size,
            sort: self.sort_order().unwrap_or_default(),
            date_format: self.date_format.clone(),
            notification_duration: Duration::from_secs(self.notification_secs),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("chatter_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.notification_secs, 3);
        assert_eq!(config.date_format, "%-m/%-d/%Y");
        assert_eq!(config.sort_order().unwrap(), SortOrder::Latest);
        assert!(config.record_id.is_none());
        assert!(config.api_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/chatter_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let path = write_config("empty", "");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 10);
        cleanup(&path);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_sort, "latest");
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "page_size = 25\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.request_timeout_secs, 20); // default
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
base_url = "https://example.com/services/data"
record_id = "001xx000003DGb2"
current_user_id = "005xx0000012345"
page_size = 5
api_token = "test-token-123"
request_timeout_secs = 5
notification_secs = 10
date_format = "%Y-%m-%d"
default_sort = "oldest"
"#;
        let path = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, "https://example.com/services/data");
        assert_eq!(config.record_id.as_deref(), Some("001xx000003DGb2"));
        assert_eq!(config.current_user_id, "005xx0000012345");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.api_token.as_deref(), Some("test-token-123"));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.sort_order().unwrap(), SortOrder::Oldest);

        let settings = config.feed_settings("rec".to_string());
        assert_eq!(settings.record_id, "rec");
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.sort, SortOrder::Oldest);
        assert_eq!(settings.date_format, "%Y-%m-%d");
        assert_eq!(settings.notification_duration, Duration::from_secs(10));

        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
page_size = 7
totally_fake_key = "should not fail"
"#;
        let path = write_config("unknown", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 7);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        // page_size should be an integer
        let path = write_config("wrongtype", "page_size = \"ten\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        cleanup(&path);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let path = write_config("zero_page", "page_size = 0\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "page_size", .. }));
        cleanup(&path);
    }

    #[test]
    fn test_bad_sort_rejected() {
        let path = write_config("bad_sort", "default_sort = \"random\"\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "default_sort", .. }));
        cleanup(&path);
    }

    #[test]
    fn test_bad_date_format_rejected() {
        let config = Config {
            date_format: "%Q".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "date_format", .. })
        ));
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }

    #[test]
    fn test_debug_masks_api_token() {
        let config = Config {
            api_token: Some("super-secret-token-12345".to_string()),
            ..Default::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_token() {
        let debug_output = format!("{:?}", Config::default());
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
