//! Publisher and subscriber capabilities.
//!
//! Concrete types gain pub/sub behavior by implementing these traits and
//! registering with the [`Registry`](crate::registry::Registry) at startup.
//! Per-type configuration (default topic, subscribed topics and their
//! options) is expressed through trait methods rather than mutable
//! class-level state.

use crate::error::CourierError;
use crate::message::{Message, Metadata};
use serde_json::Value;

/// Options applied when provisioning a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Acknowledgement deadline in seconds.
    pub ack_deadline: Option<u32>,
    /// Whether acknowledged messages are retained.
    pub retain_acked: bool,
}

/// A topic a subscriber listens to, with its subscription options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBinding {
    /// Topic name.
    pub name: String,
    /// Subscription options for this topic.
    pub options: SubscriptionOptions,
}

impl TopicBinding {
    /// Bind a topic with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: SubscriptionOptions::default(),
        }
    }

    /// Set the subscription options.
    #[must_use]
    pub fn with_options(mut self, options: SubscriptionOptions) -> Self {
        self.options = options;
        self
    }
}

/// The publishing capability: maps caller arguments to a topic, payload and
/// attributes.
pub trait Publisher: Send + Sync + 'static {
    /// The caller-supplied arguments a publish call is built from.
    type Args: Send + Sync;

    /// The topic this publisher publishes to by default.
    fn default_topic(&self) -> Option<String> {
        None
    }

    /// Resolve the topic for a specific publish call. Defaults to
    /// [`Publisher::default_topic`]; override to pick the topic dynamically
    /// from the arguments.
    fn topic(&self, _args: &Self::Args) -> Option<String> {
        self.default_topic()
    }

    /// Map the arguments to the message payload.
    ///
    /// # Errors
    ///
    /// Any error aborts the publish and propagates to the caller.
    fn payload(&self, args: &Self::Args) -> Result<Value, CourierError>;

    /// Message attributes, sent to the broker and usable for filtering.
    fn attributes(&self, _args: &Self::Args) -> Metadata {
        Metadata::new()
    }

    /// Called once, best-effort, when a publish fails. The pipeline ignores
    /// the outcome and re-raises the original error.
    fn on_error(&self, _error: &CourierError) {}
}

/// The subscribing capability: processes messages delivered for the topics
/// the type is bound to.
pub trait Subscriber: Send + Sync + 'static {
    /// The topics this subscriber listens to.
    fn topics(&self) -> Vec<TopicBinding>;

    /// Process one delivered message.
    ///
    /// Deliveries are at-least-once; implementations are responsible for
    /// idempotent handling of repeats.
    ///
    /// # Errors
    ///
    /// Any error propagates to the delivery boundary, which reports a
    /// retryable status.
    fn process(&self, message: &Message) -> Result<(), CourierError>;

    /// Called once, best-effort, when processing fails. The pipeline
    /// ignores the outcome and re-raises the original error.
    fn on_error(&self, _error: &CourierError) {}
}

/// Derive the canonical handler name from a type name: the last path
/// segment, lower-snake-cased (`my_app::UserSubscriber` becomes
/// `user_subscriber`). A run of consecutive capitals is one word, so
/// `HTTPPublisher` becomes `http_publisher`.
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    let base = raw.split('<').next().unwrap_or(raw);
    let base = base.rsplit("::").next().unwrap_or(base);

    let chars: Vec<char> = base.chars().collect();
    let mut name = String::with_capacity(base.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            // Word boundary: after a lowercase character, or at the last
            // capital of a run that a lowercase character follows.
            let after_lower = i > 0 && !chars[i - 1].is_ascii_uppercase();
            let ends_run = i > 0 && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || ends_run {
                name.push('_');
            }
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push(ch);
        }
    }
    name
}

/// Canonical name of a handler type.
#[must_use]
pub fn canonical_name_of<T: 'static>() -> String {
    canonical_name(std::any::type_name::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserSubscriber;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("UserSubscriber"), "user_subscriber");
        assert_eq!(canonical_name("my_app::UserSubscriber"), "user_subscriber");
        assert_eq!(canonical_name("plain"), "plain");
    }

    #[test]
    fn test_canonical_name_keeps_acronyms_together() {
        assert_eq!(canonical_name("HTTPPublisher"), "http_publisher");
        assert_eq!(canonical_name("APIClient"), "api_client");
        assert_eq!(canonical_name("HTTP"), "http");
    }

    #[test]
    fn test_canonical_name_of_type() {
        assert_eq!(canonical_name_of::<UserSubscriber>(), "user_subscriber");
    }

    #[test]
    fn test_topic_binding() {
        let binding = TopicBinding::new("orders").with_options(SubscriptionOptions {
            ack_deadline: Some(30),
            retain_acked: true,
        });
        assert_eq!(binding.name, "orders");
        assert_eq!(binding.options.ack_deadline, Some(30));
    }
}
