//! Overlay configuration.
//!
//! Defaults match the stock overlay: one minute of inactivity before an
//! archive is dropped from memory, backups beside the archive as
//! `<name>.backup`, registered under `zip:`.
//!
//! Configs can be written in RON; every field is optional:
//!
//! ```ron
//! (
//!     cache_ttl_secs: 120,
//!     backup_suffix: ".bak",
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::path::ZIP_SCHEME_SHORT;

/// Environment override for [`ZipFsConfig::cache_ttl_secs`].
pub const ENV_CACHE_TTL: &str = "ZIPFS_CACHE_TTL_SECS";

/// Environment override for [`ZipFsConfig::sweep_interval_secs`].
pub const ENV_SWEEP_INTERVAL: &str = "ZIPFS_SWEEP_INTERVAL_SECS";

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZipFsConfig {
    /// Seconds of inactivity before a decoded archive is evicted.
    pub cache_ttl_secs: u64,
    /// Seconds between background sweeps. `0` disables the sweeper; expired
    /// archives are then only dropped lazily on the next cache access.
    pub sweep_interval_secs: u64,
    /// Suffix of the backup copy written beside each archive.
    pub backup_suffix: String,
    /// Url prefix the overlay registers under.
    pub scheme: String,
    /// Deflate entries when writing archives back. `false` stores them as-is.
    pub compress: bool,
}

impl Default for ZipFsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            sweep_interval_secs: 15,
            backup_suffix: ".backup".to_string(),
            scheme: ZIP_SCHEME_SHORT.to_string(),
            compress: true,
        }
    }
}

impl ZipFsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = interval.as_secs();
        self
    }

    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Background sweep interval, or `None` if the sweeper is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Parse and validate a RON config.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_ron_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded zipfs config");
        Ok(config)
    }

    /// Apply `ZIPFS_*` environment overrides on top of `self`.
    pub fn from_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_CACHE_TTL) {
            self.cache_ttl_secs = parse_secs(ENV_CACHE_TTL, &value)?;
        }
        if let Some(value) = lookup(ENV_SWEEP_INTERVAL) {
            self.sweep_interval_secs = parse_secs(ENV_SWEEP_INTERVAL, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::invalid("cache_ttl_secs", "must be greater than zero"));
        }
        if self.backup_suffix.is_empty() {
            return Err(ConfigError::invalid("backup_suffix", "must not be empty"));
        }
        if self.backup_suffix.contains('/') {
            return Err(ConfigError::invalid("backup_suffix", "must not contain '/'"));
        }
        if self.scheme.is_empty() {
            return Err(ConfigError::invalid("scheme", "must not be empty"));
        }
        Ok(())
    }
}

fn parse_secs(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(field, format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ZipFsConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(15)));
        assert_eq!(config.backup_suffix, ".backup");
        assert_eq!(config.scheme, "zip:");
        assert!(config.compress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron() {
        let config = ZipFsConfig::from_ron_str("(cache_ttl_secs: 5, sweep_interval_secs: 0)").unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.backup_suffix, ".backup");
        assert!(config.compress);

        let config = ZipFsConfig::from_ron_str("(compress: false)").unwrap();
        assert!(!config.compress);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ZipFsConfig::from_ron_str("(cache_ttl_secs: 0)"),
            Err(ConfigError::Invalid { field: "cache_ttl_secs", .. })
        ));
        assert!(ZipFsConfig::new().with_backup_suffix("").validate().is_err());
        assert!(ZipFsConfig::new().with_backup_suffix("/bak").validate().is_err());
        assert!(matches!(
            ZipFsConfig::from_ron_str("(cache_ttl_secs: \"soon\")"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("zipfs.ron");
        std::fs::write(&file, "(backup_suffix: \".bak\")").unwrap();

        let config = ZipFsConfig::load(&file).unwrap();
        assert_eq!(config.backup_suffix, ".bak");
        assert!(matches!(
            ZipFsConfig::load(dir.path().join("missing.ron")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_CACHE_TTL, "90"), (ENV_SWEEP_INTERVAL, " 30 ")].into();
        let config = ZipFsConfig::default()
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.cache_ttl_secs, 90);
        assert_eq!(config.sweep_interval_secs, 30);

        let bad: HashMap<&str, &str> = [(ENV_CACHE_TTL, "never")].into();
        assert!(ZipFsConfig::default()
            .apply_overrides(|key| bad.get(key).map(|v| v.to_string()))
            .is_err());
    }
}
