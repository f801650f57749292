//! Error taxonomy for the dispatch core.
//!
//! The core recovers nothing on behalf of handlers: its only local handling
//! is timing/log bookkeeping and the optional `on_error` notification. All
//! failures surface to the caller, which translates them into HTTP statuses
//! at the webhook boundary (401 for authentication, 404 for an unresolved
//! handler, 422 for everything else).

use courier_protocol::{AuthError, DescriptorError};
use thiserror::Error;

/// Dispatch errors.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Token missing, malformed, or signature mismatch. Fails closed.
    #[error("authentication failed: invalid or missing token")]
    Authentication,

    /// Subscription name decoded but names no registered handler with the
    /// required capability.
    #[error("no handler registered for '{0}'")]
    InvalidHandler(String),

    /// Publishing required a topic but none was resolved.
    #[error("no topic resolved for '{0}'")]
    MissingTopic(String),

    /// The broker collaborator failed.
    #[error("broker error: {0}")]
    Broker(String),

    /// Handler-side failure: a `process`/`payload` implementation or an
    /// interceptor raised, or inbound data could not be parsed. Malformed
    /// descriptor payloads land here too, since by the time they are
    /// observed they are indistinguishable from handler data errors.
    #[error("processing error: {0}")]
    Processing(String),

    /// Configuration is incomplete for the requested operation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for CourierError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => Self::Authentication,
            AuthError::Issue(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DescriptorError> for CourierError {
    fn from(err: DescriptorError) -> Self {
        Self::Processing(err.to_string())
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Processing(err.to_string())
    }
}
