//! The canonical in-memory message representation.
//!
//! A message is constructed either by the publish pipeline before a send
//! (id absent) or from a webhook delivery descriptor (id present). The id is
//! write-once: it is assigned by the broker on publish and never changes
//! afterwards.

use crate::error::CourierError;
use courier_protocol::{subname, Descriptor};
use serde_json::Value;
use std::collections::HashMap;

/// Message attributes, sent alongside the payload and usable for filtering.
pub type Metadata = HashMap<String, String>;

/// A unit of data moving through the system.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: Option<String>,
    /// Message payload: a JSON object or string.
    pub payload: Value,
    /// Message attributes.
    pub metadata: Metadata,
    topic: Option<String>,
    sub_uri: Option<String>,
}

impl Message {
    /// Create an outbound message, ready for publishing. No id is assigned
    /// until the broker accepts it.
    #[must_use]
    pub fn outbound(topic: impl Into<String>, payload: Value, metadata: Metadata) -> Self {
        Self {
            id: None,
            payload,
            metadata,
            topic: Some(topic.into()),
            sub_uri: None,
        }
    }

    /// Build a message from an inbound delivery descriptor.
    ///
    /// # Errors
    ///
    /// Returns a processing error if the payload cannot be decoded.
    pub fn from_descriptor(descriptor: &Descriptor) -> Result<Self, CourierError> {
        let payload = descriptor.decoded_payload()?;
        Ok(Self {
            id: Some(descriptor.message.message_id.clone()),
            payload,
            metadata: descriptor.message.attributes.clone(),
            topic: None,
            sub_uri: Some(descriptor.subscription.clone()),
        })
    }

    /// Attach a broker-assigned id to an inbound or test message.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Get the message id, if one has been assigned.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Assign the broker id. A message keeps the first id it was given;
    /// later assignments are ignored.
    pub fn assign_id(&mut self, id: impl Into<String>) {
        if self.id.is_none() {
            self.id = Some(id.into());
        }
    }

    /// Get the message topic.
    ///
    /// Falls back to the topic encoded in the subscription URI when no
    /// explicit topic was set. Yields `None`, not an error, when neither is
    /// available.
    #[must_use]
    pub fn topic(&self) -> Option<String> {
        if let Some(topic) = &self.topic {
            return Some(topic.clone());
        }
        let sub_uri = self.sub_uri.as_deref()?;
        let (_, topic) = subname::decode(sub_uri);
        if topic.is_empty() {
            None
        } else {
            Some(topic)
        }
    }

    /// Get the subscription URI this message was delivered for.
    #[must_use]
    pub fn sub_uri(&self) -> Option<&str> {
        self.sub_uri.as_deref()
    }

    /// Get the handler name encoded in the subscription URI.
    #[must_use]
    pub fn handler_name(&self) -> Option<String> {
        let sub_uri = self.sub_uri.as_deref()?;
        let (handler, _) = subname::decode(sub_uri);
        if handler.is_empty() {
            None
        } else {
            Some(handler)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_message() {
        let msg = Message::outbound("orders", json!({"id": 1}), Metadata::new());
        assert_eq!(msg.topic(), Some("orders".to_string()));
        assert!(msg.id().is_none());
    }

    #[test]
    fn test_id_is_write_once() {
        let mut msg = Message::outbound("orders", json!({}), Metadata::new());
        msg.assign_id("first");
        msg.assign_id("second");
        assert_eq!(msg.id(), Some("first"));
    }

    #[test]
    fn test_topic_derived_from_sub_uri() {
        let msg = Message {
            id: Some("m1".to_string()),
            payload: json!({}),
            metadata: Metadata::new(),
            topic: None,
            sub_uri: Some("projects/p/subscriptions/my-app.user_subscriber.orders.created".into()),
        };
        assert_eq!(msg.topic(), Some("orders.created".to_string()));
        assert_eq!(msg.handler_name(), Some("user_subscriber".to_string()));
    }

    #[test]
    fn test_topic_absent_without_source() {
        let msg = Message {
            id: None,
            payload: json!({}),
            metadata: Metadata::new(),
            topic: None,
            sub_uri: None,
        };
        assert_eq!(msg.topic(), None);
        assert_eq!(msg.handler_name(), None);
    }

    #[test]
    fn test_from_descriptor() {
        let payload = json!({"name": "alice"});
        let descriptor = Descriptor::new(
            "m42",
            &payload,
            HashMap::from([("kind".to_string(), "user".to_string())]),
            "projects/p/subscriptions/my-app.user_subscriber.users",
        )
        .unwrap();

        let msg = Message::from_descriptor(&descriptor).unwrap();
        assert_eq!(msg.id(), Some("m42"));
        assert_eq!(msg.payload, payload);
        assert_eq!(msg.metadata.get("kind").map(String::as_str), Some("user"));
        assert_eq!(msg.topic(), Some("users".to_string()));
    }

    #[test]
    fn test_from_descriptor_bad_payload() {
        let descriptor = Descriptor {
            message: courier_protocol::WireMessage {
                message_id: "m1".to_string(),
                data: "@@@".to_string(),
                attributes: HashMap::new(),
            },
            subscription: "sub".to_string(),
        };
        assert!(matches!(
            Message::from_descriptor(&descriptor),
            Err(CourierError::Processing(_))
        ));
    }
}
