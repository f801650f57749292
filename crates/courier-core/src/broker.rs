//! The broker collaborator contract.
//!
//! The core never talks to a pub/sub backend directly; it goes through the
//! [`Broker`] trait. A real backend implements it over the network;
//! [`MemoryBroker`] implements it over per-topic in-memory queues and is the
//! backend of choice for tests and local development. Broker calls are
//! blocking; the core applies no timeout of its own.

use crate::error::CourierError;
use crate::handler::SubscriptionOptions;
use crate::message::{Message, Metadata};
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

/// An upserted topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    /// Topic name.
    pub name: String,
}

/// An upserted subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    /// Subscription name.
    pub name: String,
}

/// Interface to the pub/sub backend.
pub trait Broker: Send + Sync {
    /// Publish one message to a topic. The returned message carries the
    /// broker-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a broker error if the backend rejects the message.
    fn publish(
        &self,
        topic: &str,
        payload: &Value,
        metadata: &Metadata,
    ) -> Result<Message, CourierError>;

    /// Publish a batch of `(payload, metadata)` pairs to one topic.
    /// Order-preserving: one message per input pair, in input order.
    ///
    /// # Errors
    ///
    /// Returns a broker error if the backend rejects the batch.
    fn publish_batch(
        &self,
        topic: &str,
        batch: &[(Value, Metadata)],
    ) -> Result<Vec<Message>, CourierError>;

    /// Create or update a topic.
    ///
    /// # Errors
    ///
    /// Returns a broker error if provisioning fails.
    fn upsert_topic(&self, topic: &str) -> Result<TopicInfo, CourierError>;

    /// Create or update a subscription on a topic.
    ///
    /// # Errors
    ///
    /// Returns a broker error if provisioning fails.
    fn upsert_subscription(
        &self,
        topic: &str,
        name: &str,
        options: &SubscriptionOptions,
    ) -> Result<SubscriptionInfo, CourierError>;
}

/// In-memory broker backend with inspectable per-topic queues.
#[derive(Default)]
pub struct MemoryBroker {
    queues: DashMap<String, Vec<Message>>,
}

impl MemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to a topic, in publish order.
    #[must_use]
    pub fn queue(&self, topic: &str) -> Vec<Message> {
        self.queues.get(topic).map(|q| q.clone()).unwrap_or_default()
    }

    /// Number of messages published to a topic.
    #[must_use]
    pub fn queue_len(&self, topic: &str) -> usize {
        self.queues.get(topic).map_or(0, |q| q.len())
    }

    /// Clear one topic's queue.
    pub fn clear(&self, topic: &str) {
        if let Some(mut queue) = self.queues.get_mut(topic) {
            queue.clear();
        }
    }

    /// Clear every queue.
    pub fn clear_all(&self) {
        self.queues.clear();
    }

    fn build(topic: &str, payload: &Value, metadata: &Metadata) -> Message {
        let mut message = Message::outbound(topic, payload.clone(), metadata.clone());
        message.assign_id(Uuid::new_v4().to_string());
        message
    }
}

impl Broker for MemoryBroker {
    fn publish(
        &self,
        topic: &str,
        payload: &Value,
        metadata: &Metadata,
    ) -> Result<Message, CourierError> {
        let message = Self::build(topic, payload, metadata);
        self.queues
            .entry(topic.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    fn publish_batch(
        &self,
        topic: &str,
        batch: &[(Value, Metadata)],
    ) -> Result<Vec<Message>, CourierError> {
        let messages: Vec<Message> = batch
            .iter()
            .map(|(payload, metadata)| Self::build(topic, payload, metadata))
            .collect();
        self.queues
            .entry(topic.to_string())
            .or_default()
            .extend(messages.iter().cloned());
        Ok(messages)
    }

    fn upsert_topic(&self, topic: &str) -> Result<TopicInfo, CourierError> {
        Ok(TopicInfo {
            name: topic.to_string(),
        })
    }

    fn upsert_subscription(
        &self,
        _topic: &str,
        name: &str,
        _options: &SubscriptionOptions,
    ) -> Result<SubscriptionInfo, CourierError> {
        Ok(SubscriptionInfo {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_assigns_id_and_queues() {
        let broker = MemoryBroker::new();
        let msg = broker
            .publish("orders", &json!({"id": 1}), &Metadata::new())
            .unwrap();

        assert!(msg.id().is_some());
        assert_eq!(msg.topic(), Some("orders".to_string()));
        assert_eq!(broker.queue_len("orders"), 1);
        assert_eq!(broker.queue("orders")[0], msg);
    }

    #[test]
    fn test_publish_batch_preserves_order() {
        let broker = MemoryBroker::new();
        let batch: Vec<(Value, Metadata)> = (0..5)
            .map(|i| (json!({"n": i}), Metadata::new()))
            .collect();

        let messages = broker.publish_batch("orders", &batch).unwrap();
        assert_eq!(messages.len(), 5);
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.payload, json!({"n": i}));
            assert!(msg.id().is_some());
        }
        assert_eq!(broker.queue("orders"), messages);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let broker = MemoryBroker::new();
        broker
            .publish("a", &json!({}), &Metadata::new())
            .unwrap();
        broker
            .publish("b", &json!({}), &Metadata::new())
            .unwrap();

        broker.clear("a");
        assert_eq!(broker.queue_len("a"), 0);
        assert_eq!(broker.queue_len("b"), 1);

        broker.clear_all();
        assert_eq!(broker.queue_len("b"), 0);
    }

    #[test]
    fn test_upserts() {
        let broker = MemoryBroker::new();
        assert_eq!(broker.upsert_topic("orders").unwrap().name, "orders");
        let sub = broker
            .upsert_subscription("orders", "my-app.s.orders", &SubscriptionOptions::default())
            .unwrap();
        assert_eq!(sub.name, "my-app.s.orders");
    }
}
