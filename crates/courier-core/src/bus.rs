//! The dispatch facade.
//!
//! A [`Bus`] ties the configuration, the broker, the handler registry and
//! the two interceptor chains together. Applications build one bus at
//! startup, register their handlers, then publish through it and hand it
//! inbound webhook deliveries.

use crate::broker::{Broker, MemoryBroker, SubscriptionInfo, TopicInfo};
use crate::config::Config;
use crate::error::CourierError;
use crate::handler::Publisher;
use crate::message::{Message, Metadata};
use crate::pipeline::{
    ConsumeContext, ConsumePipeline, PublishPipeline, PublisherChain, SubscriberChain,
};
use crate::registry::Registry;
use courier_protocol::{subname, Descriptor};
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Recover a usable guard from a poisoned lock. Chains hold no invariant a
/// panicked writer could have half-applied beyond entry order.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Message dispatch entry point.
pub struct Bus {
    config: Config,
    broker: Arc<dyn Broker>,
    registry: Registry,
    publisher_chain: RwLock<PublisherChain>,
    subscriber_chain: RwLock<SubscriberChain>,
}

impl Bus {
    /// Create a bus over a broker backend.
    #[must_use]
    pub fn new(config: Config, broker: Arc<dyn Broker>) -> Self {
        Self {
            config,
            broker,
            registry: Registry::new(),
            publisher_chain: RwLock::new(PublisherChain::new()),
            subscriber_chain: RwLock::new(SubscriberChain::new()),
        }
    }

    /// Create a bus over an in-memory broker, for tests and local
    /// development.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryBroker::new()))
    }

    /// The bus configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The broker backend.
    #[must_use]
    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    /// The handler registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Reconfigure the publisher-side interceptor chain.
    pub fn configure_publisher_chain(&self, configure: impl FnOnce(&mut PublisherChain)) {
        configure(&mut write_lock(&self.publisher_chain));
    }

    /// Reconfigure the subscriber-side interceptor chain.
    pub fn configure_subscriber_chain(&self, configure: impl FnOnce(&mut SubscriberChain)) {
        configure(&mut write_lock(&self.subscriber_chain));
    }

    /// Publish one message through a publisher.
    ///
    /// The publisher maps the arguments to topic, payload and attributes;
    /// the publisher chain wraps the broker send. The returned message
    /// carries the broker-assigned id.
    ///
    /// # Errors
    ///
    /// Propagates resolution, interceptor and broker errors after notifying
    /// the publisher's `on_error` hook.
    pub fn publish<P: Publisher>(
        &self,
        publisher: &P,
        args: &P::Args,
    ) -> Result<Message, CourierError> {
        let handler = crate::handler::canonical_name_of::<P>();
        let chain = read_lock(&self.publisher_chain);
        let mut pipeline = PublishPipeline::new(self.broker.as_ref(), &chain);

        pipeline.execute(
            &handler,
            || Self::build_outbound(publisher, args, &handler),
            &|err| publisher.on_error(err),
        )
    }

    /// Publish a batch of messages through a publisher.
    ///
    /// Arguments resolve to messages one by one, each wrapped by the
    /// publisher chain; sends go to the broker in topic groups sliced to at
    /// most [`Config::batch_max_messages`] per call. Results come back in
    /// argument order.
    ///
    /// # Errors
    ///
    /// Propagates resolution, interceptor and broker errors after notifying
    /// the publisher's `on_error` hook.
    pub fn publish_all<P: Publisher>(
        &self,
        publisher: &P,
        args_list: &[P::Args],
    ) -> Result<Vec<Message>, CourierError> {
        let handler = crate::handler::canonical_name_of::<P>();
        let chain = read_lock(&self.publisher_chain);
        let mut pipeline = PublishPipeline::new(self.broker.as_ref(), &chain);

        pipeline.execute_batch(
            &handler,
            || {
                args_list
                    .iter()
                    .map(|args| Self::build_outbound(publisher, args, &handler))
                    .collect()
            },
            self.config.batch_max_messages(),
            &|err| publisher.on_error(err),
        )
    }

    fn build_outbound<P: Publisher>(
        publisher: &P,
        args: &P::Args,
        handler: &str,
    ) -> Result<Message, CourierError> {
        let topic = publisher
            .topic(args)
            .ok_or_else(|| CourierError::MissingTopic(handler.to_string()))?;
        let payload = publisher.payload(args)?;
        let metadata = publisher.attributes(args);
        Ok(Message::outbound(topic, payload, metadata))
    }

    /// Publish an ad-hoc message straight to a topic, bypassing publishers
    /// and the interceptor chain.
    ///
    /// # Errors
    ///
    /// Propagates broker errors.
    pub fn publish_message(
        &self,
        topic: &str,
        payload: &Value,
        metadata: &Metadata,
    ) -> Result<Message, CourierError> {
        self.broker.publish(topic, payload, metadata)
    }

    /// Publish a batch of ad-hoc messages straight to a topic, sliced to at
    /// most [`Config::batch_max_messages`] per broker call.
    ///
    /// # Errors
    ///
    /// Propagates broker errors.
    pub fn publish_messages(
        &self,
        topic: &str,
        batch: &[(Value, Metadata)],
    ) -> Result<Vec<Message>, CourierError> {
        let mut sent = Vec::with_capacity(batch.len());
        for slice in batch.chunks(self.config.batch_max_messages().max(1)) {
            sent.extend(self.broker.publish_batch(topic, slice)?);
        }
        Ok(sent)
    }

    /// Dispatch one inbound webhook delivery to its subscriber.
    ///
    /// The message is reconstructed from the descriptor before handler
    /// resolution, so a malformed payload surfaces as a processing error
    /// even when the handler is unknown.
    ///
    /// # Errors
    ///
    /// Returns a processing error for an undecodable payload, an
    /// invalid-handler error when no subscriber is registered under the
    /// decoded name, and propagates interceptor and handler errors.
    pub fn receive(&self, descriptor: &Descriptor) -> Result<(), CourierError> {
        let message = Message::from_descriptor(descriptor)?;

        let (handler, _) = subname::decode(&descriptor.subscription);
        let subscriber = self
            .registry
            .resolve_subscriber(&handler)
            .ok_or_else(|| CourierError::InvalidHandler(handler.clone()))?;

        let chain = read_lock(&self.subscriber_chain);
        let mut pipeline = ConsumePipeline::new(subscriber, &chain);
        pipeline.execute(ConsumeContext { handler, message })
    }

    /// The broker-side subscription name for a handler/topic pair.
    #[must_use]
    pub fn subscription_name(&self, handler: &str, topic: &str) -> String {
        subname::encode(self.config.sub_prefix(), handler, topic)
    }

    /// Provision topics for every registered publisher with a default
    /// topic.
    ///
    /// # Errors
    ///
    /// Propagates broker provisioning errors.
    pub fn setup_publishers(&self) -> Result<Vec<TopicInfo>, CourierError> {
        let mut topics = Vec::new();
        for (name, publisher) in self.registry.publishers() {
            if let Some(topic) = publisher.default_topic() {
                let info = self.broker.upsert_topic(&topic)?;
                info!(handler = %name, topic = %info.name, "topic provisioned");
                topics.push(info);
            }
        }
        Ok(topics)
    }

    /// Provision topics and subscriptions for every registered subscriber.
    ///
    /// # Errors
    ///
    /// Propagates broker provisioning errors.
    pub fn setup_subscribers(&self) -> Result<Vec<SubscriptionInfo>, CourierError> {
        let mut subscriptions = Vec::new();
        for (name, bindings) in self.registry.subscriptions() {
            for binding in bindings {
                self.broker.upsert_topic(&binding.name)?;
                let sub_name = self.subscription_name(&name, &binding.name);
                let info =
                    self.broker
                        .upsert_subscription(&binding.name, &sub_name, &binding.options)?;
                info!(handler = %name, subscription = %info.name, "subscription provisioned");
                subscriptions.push(info);
            }
        }
        Ok(subscriptions)
    }
}
