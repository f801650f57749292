//! Process-wide handler registry.
//!
//! In a statically typed target, resolving a handler from a decoded name
//! needs an explicit mapping from canonical name to handler instance,
//! populated by registration calls at startup. Registration is additive and
//! idempotent per type; the registry is read-mostly after startup and only
//! mutated again by the explicit test-support [`Registry::reset`].

use crate::handler::{canonical_name_of, Publisher, Subscriber, TopicBinding};
use dashmap::DashMap;
use std::sync::Arc;

/// Object-safe publisher view used by setup/provisioning flows.
pub(crate) trait ErasedPublisher: Send + Sync {
    fn default_topic(&self) -> Option<String>;
}

impl<P: Publisher> ErasedPublisher for P {
    fn default_topic(&self) -> Option<String> {
        Publisher::default_topic(self)
    }
}

#[derive(Default)]
struct Registration {
    publisher: Option<Arc<dyn ErasedPublisher>>,
    subscriber: Option<Arc<dyn Subscriber>>,
}

/// Mapping from canonical handler name to registered capabilities.
#[derive(Default)]
pub struct Registry {
    entries: DashMap<String, Registration>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a publisher under its canonical name. Re-registering the
    /// same type replaces the previous instance.
    pub fn register_publisher<P: Publisher>(&self, publisher: P) -> String {
        let name = canonical_name_of::<P>();
        self.entries.entry(name.clone()).or_default().publisher = Some(Arc::new(publisher));
        name
    }

    /// Register a subscriber under its canonical name. Re-registering the
    /// same type replaces the previous instance.
    pub fn register_subscriber<S: Subscriber>(&self, subscriber: S) -> String {
        let name = canonical_name_of::<S>();
        self.entries.entry(name.clone()).or_default().subscriber = Some(Arc::new(subscriber));
        name
    }

    /// Resolve a subscriber by canonical name.
    ///
    /// Returns `None` when nothing is registered under the name, or when
    /// the registered type lacks the subscribing capability.
    #[must_use]
    pub fn resolve_subscriber(&self, name: &str) -> Option<Arc<dyn Subscriber>> {
        self.entries.get(name).and_then(|e| e.subscriber.clone())
    }

    /// All registered publishers, for provisioning flows.
    pub(crate) fn publishers(&self) -> Vec<(String, Arc<dyn ErasedPublisher>)> {
        self.entries
            .iter()
            .filter_map(|e| e.publisher.clone().map(|p| (e.key().clone(), p)))
            .collect()
    }

    /// All registered subscribers with their topic bindings, for
    /// provisioning flows.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(String, Vec<TopicBinding>)> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.subscriber
                    .as_ref()
                    .map(|s| (e.key().clone(), s.topics()))
            })
            .collect()
    }

    /// Whether any capability is registered under the name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered handler names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all registrations. Test support only.
    pub fn reset(&self) {
        self.entries.clear();
    }
}
