//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (COURIER_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Dispatch configuration.
    #[serde(default)]
    pub courier: CourierConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Shared secret used to verify webhook tokens.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Prefix namespacing this application's subscriptions.
    #[serde(default = "default_sub_prefix")]
    pub sub_prefix: String,

    /// Path the delivery endpoint is mounted on.
    #[serde(default = "default_receive_path")]
    pub receive_path: String,

    /// Largest number of messages per broker batch call.
    #[serde(default = "default_batch_max_messages")]
    pub batch_max_messages: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("COURIER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("COURIER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_secret() -> String {
    std::env::var("COURIER_SECRET").unwrap_or_default()
}

fn default_sub_prefix() -> String {
    std::env::var("COURIER_SUB_PREFIX").unwrap_or_else(|_| "courier".to_string())
}

fn default_receive_path() -> String {
    courier_core::config::DEFAULT_PROCESSOR_PATH.to_string()
}

fn default_batch_max_messages() -> usize {
    courier_core::config::DEFAULT_BATCH_MAX_MESSAGES
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            courier: CourierConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            sub_prefix: default_sub_prefix(),
            receive_path: default_receive_path(),
            batch_max_messages: default_batch_max_messages(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        // Try to load from default paths
        let config_paths = [
            "courier.toml",
            "/etc/courier/courier.toml",
            "~/.config/courier/courier.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                let config = Self::from_file(expanded.as_ref())?;
                config.validate()?;
                return Ok(config);
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is servable.
    ///
    /// # Errors
    ///
    /// Returns an error when no webhook secret is configured. Serving with
    /// an empty secret would accept any token signed with the empty string,
    /// so the server refuses to start instead.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.courier.secret.is_empty(),
            "No webhook secret configured: set COURIER_SECRET or [courier] secret in courier.toml"
        );
        Ok(())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error when host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Build the dispatch-core configuration.
    #[must_use]
    pub fn to_core(&self) -> courier_core::Config {
        courier_core::Config::new(&self.courier.secret, &self.courier.sub_prefix)
            .with_processor_path(&self.courier.receive_path)
            .with_batch_max_messages(self.courier.batch_max_messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.courier.receive_path, "/courier/receive");
        assert_eq!(config.courier.batch_max_messages, 1000);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = Config::default();
        config.courier.secret = String::new();
        assert!(config.validate().is_err());

        config.courier.secret = "s3cret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [courier]
            secret = "s3cret"
            sub_prefix = "my-app"
            batch_max_messages = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.courier.secret, "s3cret");
        assert_eq!(config.courier.batch_max_messages, 250);
    }

    #[test]
    fn test_to_core() {
        let config: Config = toml::from_str(
            r#"
            [courier]
            secret = "s3cret"
            sub_prefix = "my-app"
        "#,
        )
        .unwrap();

        let core = config.to_core();
        assert_eq!(core.secret(), "s3cret");
        assert_eq!(core.sub_prefix(), "my-app");
        assert_eq!(core.batch_max_messages(), 1000);
    }
}
