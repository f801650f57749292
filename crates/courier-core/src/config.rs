//! Core runtime configuration.
//!
//! Two values are mandatory: the shared webhook secret and the subscription
//! prefix that namespaces this application's subscriptions on the broker.
//! Everything else has a default.

use crate::error::CourierError;
use courier_protocol::auth;

/// Default path the delivery endpoint is mounted on.
pub const DEFAULT_PROCESSOR_PATH: &str = "/courier/receive";

/// Largest number of messages sent to the broker in one batch call.
pub const DEFAULT_BATCH_MAX_MESSAGES: usize = 1000;

/// Runtime configuration for a [`Bus`](crate::bus::Bus).
#[derive(Debug, Clone)]
pub struct Config {
    secret: String,
    sub_prefix: String,
    processor_host: Option<String>,
    processor_path: String,
    batch_max_messages: usize,
}

impl Config {
    /// Create a configuration from the two mandatory values.
    #[must_use]
    pub fn new(secret: impl Into<String>, sub_prefix: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            sub_prefix: sub_prefix.into(),
            processor_host: None,
            processor_path: DEFAULT_PROCESSOR_PATH.to_string(),
            batch_max_messages: DEFAULT_BATCH_MAX_MESSAGES,
        }
    }

    /// Set the externally reachable host, e.g. `https://app.example.com`.
    #[must_use]
    pub fn with_processor_host(mut self, host: impl Into<String>) -> Self {
        self.processor_host = Some(host.into());
        self
    }

    /// Set the path the delivery endpoint is mounted on.
    #[must_use]
    pub fn with_processor_path(mut self, path: impl Into<String>) -> Self {
        self.processor_path = path.into();
        self
    }

    /// Set the per-call batch size cap.
    #[must_use]
    pub fn with_batch_max_messages(mut self, max: usize) -> Self {
        self.batch_max_messages = max;
        self
    }

    /// Shared secret used to sign and verify webhook tokens.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Prefix namespacing this application's subscriptions.
    #[must_use]
    pub fn sub_prefix(&self) -> &str {
        &self.sub_prefix
    }

    /// Per-call batch size cap.
    #[must_use]
    pub fn batch_max_messages(&self) -> usize {
        self.batch_max_messages
    }

    /// Absolute URL of the delivery endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no processor host is set.
    pub fn processor_url(&self) -> Result<String, CourierError> {
        let host = self.processor_host.as_deref().ok_or_else(|| {
            CourierError::Config("processor host is required to build the processor URL".into())
        })?;
        Ok(format!(
            "{}{}",
            host.trim_end_matches('/'),
            self.processor_path
        ))
    }

    /// Delivery endpoint URL with a freshly signed auth token attached, in
    /// the form the broker is configured to push to.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no processor host is set, or an
    /// internal error if token signing fails.
    pub fn webhook_url(&self) -> Result<String, CourierError> {
        let url = self.processor_url()?;
        let token = auth::issue(&self.secret)?;
        Ok(format!("{url}?token={token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("s3cret", "my-app");
        assert_eq!(config.secret(), "s3cret");
        assert_eq!(config.sub_prefix(), "my-app");
        assert_eq!(config.batch_max_messages(), 1000);
    }

    #[test]
    fn test_processor_url_requires_host() {
        let config = Config::new("s3cret", "my-app");
        assert!(matches!(
            config.processor_url(),
            Err(CourierError::Config(_))
        ));

        let config = config.with_processor_host("https://app.example.com/");
        assert_eq!(
            config.processor_url().unwrap(),
            "https://app.example.com/courier/receive"
        );
    }

    #[test]
    fn test_webhook_url_carries_valid_token() {
        let config = Config::new("s3cret", "my-app")
            .with_processor_host("https://app.example.com")
            .with_processor_path("/hooks/messages");

        let url = config.webhook_url().unwrap();
        let (base, token) = url.split_once("?token=").unwrap();
        assert_eq!(base, "https://app.example.com/hooks/messages");
        assert!(auth::verify(token, "s3cret"));
    }
}
