//! Webhook delivery descriptors.
//!
//! The broker pushes deliveries as a JSON body:
//!
//! ```json
//! {
//!   "message": {
//!     "message_id": "123",
//!     "data": "<base64 of a JSON payload>",
//!     "attributes": { "k": "v" }
//!   },
//!   "subscription": ".../subscriptions/<encoded-subscription-name>"
//! }
//! ```
//!
//! Extra fields alongside the body (such as the verification `token`) are
//! ignored during parsing, so the descriptor is the body minus the token.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Descriptor parsing errors.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Body or payload is not valid JSON.
    #[error("invalid descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload data is not valid base64.
    #[error("invalid payload encoding: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// The message portion of a delivery descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Broker-assigned message identifier.
    pub message_id: String,
    /// Base64-encoded JSON payload.
    pub data: String,
    /// Message attributes.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// A parsed delivery descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// The delivered message.
    pub message: WireMessage,
    /// The subscription URI the delivery was made for.
    pub subscription: String,
}

impl Descriptor {
    /// Build a descriptor from a payload value, encoding it the way the
    /// broker would.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn new(
        message_id: impl Into<String>,
        payload: &serde_json::Value,
        attributes: HashMap<String, String>,
        subscription: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let data = STANDARD.encode(serde_json::to_vec(payload)?);
        Ok(Self {
            message: WireMessage {
                message_id: message_id.into(),
                data,
                attributes,
            },
            subscription: subscription.into(),
        })
    }

    /// Parse a descriptor from a raw request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid descriptor JSON.
    pub fn parse(body: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Decode the base64 payload into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not base64 or not JSON.
    pub fn decoded_payload(&self) -> Result<serde_json::Value, DescriptorError> {
        let raw = STANDARD.decode(&self.message.data)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_decode() {
        let payload = json!({"id": 42, "name": "alice"});
        let descriptor = Descriptor::new(
            "msg-1",
            &payload,
            HashMap::from([("kind".to_string(), "user".to_string())]),
            "projects/p/subscriptions/my-app.user_subscriber.users",
        )
        .unwrap();

        let body = serde_json::to_string(&descriptor).unwrap();
        let parsed = Descriptor::parse(&body).unwrap();
        assert_eq!(parsed, descriptor);
        assert_eq!(parsed.decoded_payload().unwrap(), payload);
    }

    #[test]
    fn test_parse_ignores_token_field() {
        let body = r#"{
            "token": "some.signed.token",
            "message": {"message_id": "m1", "data": "e30=", "attributes": {}},
            "subscription": "sub"
        }"#;
        let parsed = Descriptor::parse(body).unwrap();
        assert_eq!(parsed.message.message_id, "m1");
        assert_eq!(parsed.subscription, "sub");
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(Descriptor::parse("not json").is_err());
        assert!(Descriptor::parse(r#"{"subscription": "s"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_data() {
        let descriptor = Descriptor {
            message: WireMessage {
                message_id: "m1".to_string(),
                data: "!!not-base64!!".to_string(),
                attributes: HashMap::new(),
            },
            subscription: "sub".to_string(),
        };
        assert!(matches!(
            descriptor.decoded_payload(),
            Err(DescriptorError::Base64(_))
        ));

        let descriptor = Descriptor {
            message: WireMessage {
                message_id: "m1".to_string(),
                data: STANDARD.encode("not json"),
                attributes: HashMap::new(),
            },
            subscription: "sub".to_string(),
        };
        assert!(matches!(
            descriptor.decoded_payload(),
            Err(DescriptorError::Json(_))
        ));
    }

    #[test]
    fn test_attributes_default_to_empty() {
        let body = r#"{
            "message": {"message_id": "m1", "data": "e30="},
            "subscription": "sub"
        }"#;
        let parsed = Descriptor::parse(body).unwrap();
        assert!(parsed.message.attributes.is_empty());
    }
}
