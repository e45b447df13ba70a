//! Runtime configuration.
//!
//! Loaded from a TOML file at:
//! 1. the path given on the command line
//! 2. `$PARCEL_CONFIG`
//! 3. built-in defaults
//!
//! The download size ceiling and progress epsilon are fixed constants and
//! cannot be configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parcel_fetch::{Backoff, MAX_ATTEMPTS, RETRY_BACKOFF, RetryPolicy, TransportConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::locator::ResourceLocator;

pub const CONFIG_ENV: &str = "PARCEL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid CDN base URL: {0}")]
    CdnBase(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelConfig {
    pub paths:   PathsConfig,
    pub network: NetworkConfig,
    pub retry:   RetryConfig,
    pub events:  EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where in-flight ciphertext is staged.
    pub scratch_dir:  PathBuf,
    /// Where decrypted artifacts are stored.
    pub artifact_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cdn_base:             String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs:    u64,
    pub user_agent:           Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_attempts:   u32,
    pub backoff_ms:     u64,
    /// Double the delay on every retry instead of waiting a fixed time.
    pub exponential:    bool,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events retained per subscriber before it starts lagging.
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace".
    pub level: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("parcel");
        Self {
            scratch_dir:  base.join("scratch"),
            artifact_dir: base.join("artifacts"),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cdn_base:             "https://cdn.example.org/".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs:    30,
            user_agent:           None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts:   MAX_ATTEMPTS,
            backoff_ms:     RETRY_BACKOFF.as_millis() as u64,
            exponential:    false,
            max_backoff_ms: 30_000,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self { Self { capacity: 64 } }
}

impl Default for LoggingConfig {
    fn default() -> Self { Self { level: "warn".to_string() } }
}

impl ParcelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(content)?) }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// `path` if given, else `$PARCEL_CONFIG` if set, else defaults.
    pub fn load_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.retry.backoff_ms);
        let backoff = if self.retry.exponential {
            Backoff::Exponential {
                base,
                max: Duration::from_millis(self.retry.max_backoff_ms),
            }
        } else {
            Backoff::Fixed(base)
        };
        RetryPolicy::default()
            .max_attempts(self.retry.max_attempts)
            .backoff(backoff)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            read_timeout:    Duration::from_secs(self.network.read_timeout_secs),
            user_agent:      self.network.user_agent.clone(),
        }
    }

    pub fn locator(&self) -> Result<ResourceLocator, ConfigError> {
        let base = Url::parse(&self.network.cdn_base)
            .map_err(|e| ConfigError::CdnBase(format!("{}: {e}", self.network.cdn_base)))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::CdnBase(self.network.cdn_base.clone()));
        }
        Ok(ResourceLocator::new(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ParcelConfig::from_toml_str("").unwrap();
        assert_eq!(config, ParcelConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = ParcelConfig::from_toml_str(
            r#"
            [retry]
            max_attempts = 3
            exponential = true

            [network]
            cdn_base = "https://media.example.net/v1"
            "#,
        )
        .unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                base: RETRY_BACKOFF,
                max:  Duration::from_secs(30),
            }
        );
        assert_eq!(config.network.read_timeout_secs, 30);
        assert_eq!(config.locator().unwrap().cdn_base().as_str(), "https://media.example.net/v1");
    }

    #[test]
    fn test_rejects_unparseable_cdn() {
        let mut config = ParcelConfig::default();
        config.network.cdn_base = "not a url".into();
        assert!(matches!(config.locator(), Err(ConfigError::CdnBase(_))));
        config.network.cdn_base = "mailto:ops@example.org".into();
        assert!(matches!(config.locator(), Err(ConfigError::CdnBase(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parcel.toml");
        std::fs::write(&path, "[events]\ncapacity = 8\n[logging]\nlevel = \"debug\"\n").unwrap();
        let config = ParcelConfig::load_default(Some(&path)).unwrap();
        assert_eq!(config.events.capacity, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = ParcelConfig::load(Path::new("/nonexistent/parcel.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
