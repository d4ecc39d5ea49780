//! Configuration management.
//!
//! Structured configuration with validation, loadable from programmatic
//! defaults, a builder, or `AQUAVEIL_`-prefixed environment variables.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Complete aquaveil configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AquaveilConfig {
    /// Oracle trust anchor.
    pub oracle: OracleConfig,

    /// Resource bounds.
    pub limits: LimitsConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl AquaveilConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AquaveilConfigBuilder {
        AquaveilConfigBuilder::default()
    }

    /// Load configuration from environment variables:
    /// - `AQUAVEIL_ORACLE_KEY_HEX` — hex-encoded oracle verifying key
    /// - `AQUAVEIL_MAX_PENDING_PER_OPERATOR` — pending-request bound (0 = unbounded)
    /// - `AQUAVEIL_LOG_LEVEL` — trace, debug, info, warn, error
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("AQUAVEIL_ORACLE_KEY_HEX") {
            config.oracle.verifying_key_hex = Some(key);
        }

        if let Ok(max) = std::env::var("AQUAVEIL_MAX_PENDING_PER_OPERATOR") {
            config.limits.max_pending_per_operator = max.parse().map_err(|e| {
                Error::Config(format!("invalid AQUAVEIL_MAX_PENDING_PER_OPERATOR: {e}"))
            })?;
        }

        if let Ok(level) = std::env::var("AQUAVEIL_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref key) = self.oracle.verifying_key_hex {
            if key.len() != 64 {
                return Err(Error::Config(
                    "oracle verifying key must be 64 hex characters (32 bytes)".into(),
                ));
            }
            if hex::decode(key).is_err() {
                return Err(Error::Config("oracle verifying key is not valid hex".into()));
            }
        }
        Ok(())
    }
}

/// Oracle trust anchor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Hex-encoded ed25519 verifying key of the decryption oracle.
    /// If `None`, a verifier must be supplied programmatically.
    pub verifying_key_hex: Option<String>,
}

/// Resource bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum outstanding decryption requests per operator.
    ///
    /// Pending requests never expire, so this is the only guard against
    /// abandoned-request buildup. Zero means unbounded (the reference
    /// behavior).
    pub max_pending_per_operator: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pending_per_operator: 0,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// JSON output format.
    pub json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json_output: false,
        }
    }
}

/// Builder for [`AquaveilConfig`].
#[derive(Default)]
pub struct AquaveilConfigBuilder {
    config: AquaveilConfig,
}

impl AquaveilConfigBuilder {
    /// Set the oracle verifying key from hex.
    pub fn oracle_key_hex(mut self, key: impl Into<String>) -> Self {
        self.config.oracle.verifying_key_hex = Some(key.into());
        self
    }

    /// Bound outstanding decryption requests per operator (0 = unbounded).
    pub fn max_pending_per_operator(mut self, max: usize) -> Self {
        self.config.limits.max_pending_per_operator = max;
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Enable JSON log output.
    pub fn json_logs(mut self, enabled: bool) -> Self {
        self.config.logging.json_output = enabled;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<AquaveilConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AquaveilConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_creates_valid_config() {
        let key = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";
        let config = AquaveilConfig::builder()
            .oracle_key_hex(key)
            .max_pending_per_operator(8)
            .log_level("debug")
            .build()
            .expect("should build");

        assert_eq!(config.oracle.verifying_key_hex.as_deref(), Some(key));
        assert_eq!(config.limits.max_pending_per_operator, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_oracle_key_rejected() {
        let result = AquaveilConfig::builder().oracle_key_hex("not-hex").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn non_hex_oracle_key_rejected() {
        let key = "zz".repeat(32);
        let result = AquaveilConfig::builder().oracle_key_hex(key).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
