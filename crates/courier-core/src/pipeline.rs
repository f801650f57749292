//! Publish and consume pipelines.
//!
//! A pipeline wraps one operation — "format payload, send to broker" or
//! "run handler logic" — in the interceptor chain, with timing and
//! success/failure logging around it. Pipelines never swallow errors: the
//! bookkeeping (end timestamp, duration, log event, best-effort `on_error`
//! notification) always happens, then the original error propagates.

use crate::broker::Broker;
use crate::error::CourierError;
use crate::interceptor::Chain;
use crate::message::{Message, Metadata};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Pipeline lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not yet started.
    Idle,
    /// Currently executing.
    Running,
    /// Finished successfully. Terminal.
    Completed,
    /// Finished with an error. Terminal.
    Failed,
}

/// Round a duration in seconds up to 3 decimal places.
fn ceil_millis(secs: f64) -> f64 {
    (secs * 1000.0).ceil() / 1000.0
}

/// Start/end accounting shared by both pipelines.
#[derive(Debug)]
struct Timing {
    state: PipelineState,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

impl Timing {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            started_at: None,
            ended_at: None,
        }
    }

    fn start(&mut self) {
        self.state = PipelineState::Running;
        self.started_at = Some(Instant::now());
    }

    fn finish(&mut self, ok: bool) {
        self.ended_at = Some(Instant::now());
        self.state = if ok {
            PipelineState::Completed
        } else {
            PipelineState::Failed
        };
    }

    /// Elapsed seconds, rounded up to 3 decimals; `0.0` while either
    /// endpoint is unset.
    fn duration(&self) -> f64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => ceil_millis(end.duration_since(start).as_secs_f64()),
            _ => 0.0,
        }
    }
}

/// Invocation context handed to publisher-side interceptors.
pub struct PublishContext {
    /// Canonical name of the publisher.
    pub handler: String,
    /// The message being published. No id until the broker accepts it;
    /// interceptors may mutate payload and metadata.
    pub message: Message,
}

/// Invocation context handed to subscriber-side interceptors.
pub struct ConsumeContext {
    /// Canonical name of the subscriber.
    pub handler: String,
    /// The delivered message.
    pub message: Message,
}

/// Publisher-side interceptor chain.
pub type PublisherChain = Chain<PublishContext, Message>;

/// Subscriber-side interceptor chain.
pub type SubscriberChain = Chain<ConsumeContext, ()>;

/// Timed, interceptor-wrapped execution of a publish.
pub struct PublishPipeline<'a> {
    broker: &'a dyn Broker,
    chain: &'a PublisherChain,
    timing: Timing,
}

impl<'a> PublishPipeline<'a> {
    /// Create an idle pipeline.
    #[must_use]
    pub fn new(broker: &'a dyn Broker, chain: &'a PublisherChain) -> Self {
        Self {
            broker,
            chain,
            timing: Timing::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.timing.state
    }

    /// Elapsed seconds, rounded up to 3 decimals.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.timing.duration()
    }

    /// Publish one message.
    ///
    /// `build` resolves topic/payload/attributes into an unsent message; it
    /// runs inside the timed region so resolution failures get the same
    /// bookkeeping as send failures. The interceptor chain wraps the broker
    /// call; the resulting message carries the broker-assigned id.
    ///
    /// # Errors
    ///
    /// Re-raises any resolution, interceptor, or broker error after
    /// bookkeeping and the best-effort `on_error` notification.
    pub fn execute<F>(
        &mut self,
        handler: &str,
        build: F,
        on_error: &dyn Fn(&CourierError),
    ) -> Result<Message, CourierError>
    where
        F: FnOnce() -> Result<Message, CourierError>,
    {
        self.timing.start();

        let broker = self.broker;
        let result = build().and_then(|unsent| {
            let mut ctx = PublishContext {
                handler: handler.to_string(),
                message: unsent,
            };
            self.chain.invoke(&mut ctx, |ctx| {
                let topic = ctx
                    .message
                    .topic()
                    .ok_or_else(|| CourierError::MissingTopic(ctx.handler.clone()))?;
                broker.publish(&topic, &ctx.message.payload, &ctx.message.metadata)
            })
        });

        self.timing.finish(result.is_ok());

        match result {
            Ok(message) => {
                info!(
                    handler = %handler,
                    id = message.id().unwrap_or(""),
                    duration = self.duration(),
                    "message published"
                );
                Ok(message)
            }
            Err(err) => {
                error!(
                    handler = %handler,
                    error = %err,
                    duration = self.duration(),
                    "publish failed"
                );
                on_error(&err);
                Err(err)
            }
        }
    }

    /// Publish a batch of messages.
    ///
    /// Each message first goes through the interceptor chain with a
    /// payload-finalizing terminal, so per-message interceptors still
    /// apply. Messages are then grouped by resolved topic (first-seen topic
    /// order, original order within a topic), each group is sliced to
    /// `max_batch` messages per broker call, and the broker results are
    /// reassembled into input order. Slicing never reorders messages.
    ///
    /// # Errors
    ///
    /// Re-raises any error after bookkeeping and `on_error`.
    pub fn execute_batch<F>(
        &mut self,
        handler: &str,
        build: F,
        max_batch: usize,
        on_error: &dyn Fn(&CourierError),
    ) -> Result<Vec<Message>, CourierError>
    where
        F: FnOnce() -> Result<Vec<Message>, CourierError>,
    {
        self.timing.start();

        let result = build().and_then(|unsent| self.send_batch(handler, unsent, max_batch));

        self.timing.finish(result.is_ok());

        match result {
            Ok(messages) => {
                info!(
                    handler = %handler,
                    count = messages.len(),
                    duration = self.duration(),
                    "batch published"
                );
                Ok(messages)
            }
            Err(err) => {
                error!(
                    handler = %handler,
                    error = %err,
                    duration = self.duration(),
                    "batch publish failed"
                );
                on_error(&err);
                Err(err)
            }
        }
    }

    fn send_batch(
        &self,
        handler: &str,
        unsent: Vec<Message>,
        max_batch: usize,
    ) -> Result<Vec<Message>, CourierError> {
        // Per-message chain pass: the terminal yields the finalized message
        // instead of sending it.
        let mut prepared = Vec::with_capacity(unsent.len());
        for message in unsent {
            let mut ctx = PublishContext {
                handler: handler.to_string(),
                message,
            };
            let finalized = self.chain.invoke(&mut ctx, |ctx| Ok(ctx.message.clone()))?;
            prepared.push(finalized);
        }
        let total = prepared.len();

        // Group by topic, preserving first-seen topic order and original
        // per-topic ordering.
        let mut topic_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<(usize, Message)>> = HashMap::new();
        for (index, message) in prepared.into_iter().enumerate() {
            let topic = message
                .topic()
                .ok_or_else(|| CourierError::MissingTopic(handler.to_string()))?;
            if !groups.contains_key(&topic) {
                topic_order.push(topic.clone());
            }
            groups.entry(topic).or_default().push((index, message));
        }

        // One broker call per topic per slice; results go back to their
        // original positions.
        let mut results: Vec<Option<Message>> = (0..total).map(|_| None).collect();
        for topic in &topic_order {
            let group = &groups[topic];
            for slice in group.chunks(max_batch.max(1)) {
                let pairs: Vec<(Value, Metadata)> = slice
                    .iter()
                    .map(|(_, m)| (m.payload.clone(), m.metadata.clone()))
                    .collect();
                let sent = self.broker.publish_batch(topic, &pairs)?;
                if sent.len() != slice.len() {
                    return Err(CourierError::Broker(format!(
                        "batch result size mismatch: sent {}, got {}",
                        slice.len(),
                        sent.len()
                    )));
                }
                for ((index, _), message) in slice.iter().zip(sent) {
                    results[*index] = Some(message);
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                m.ok_or_else(|| CourierError::Internal(format!("missing batch result {i}")))
            })
            .collect()
    }
}

/// Timed, interceptor-wrapped execution of one inbound delivery.
///
/// Handler resolution happens before a pipeline is constructed and is not
/// wrapped by the chain; by the time a pipeline exists, the subscriber is
/// known.
pub struct ConsumePipeline<'a> {
    subscriber: Arc<dyn crate::handler::Subscriber>,
    chain: &'a SubscriberChain,
    timing: Timing,
}

impl<'a> ConsumePipeline<'a> {
    /// Create an idle pipeline for a resolved subscriber.
    #[must_use]
    pub fn new(subscriber: Arc<dyn crate::handler::Subscriber>, chain: &'a SubscriberChain) -> Self {
        Self {
            subscriber,
            chain,
            timing: Timing::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.timing.state
    }

    /// Elapsed seconds, rounded up to 3 decimals.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.timing.duration()
    }

    /// Run the subscriber's processing logic through the chain.
    ///
    /// # Errors
    ///
    /// Re-raises any interceptor or handler error after bookkeeping and the
    /// best-effort `on_error` notification.
    pub fn execute(&mut self, mut ctx: ConsumeContext) -> Result<(), CourierError> {
        self.timing.start();

        let subscriber = Arc::clone(&self.subscriber);
        let result = self
            .chain
            .invoke(&mut ctx, |ctx| subscriber.process(&ctx.message));

        self.timing.finish(result.is_ok());

        match result {
            Ok(()) => {
                info!(
                    handler = %ctx.handler,
                    id = ctx.message.id().unwrap_or(""),
                    duration = self.duration(),
                    "message processed"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    handler = %ctx.handler,
                    id = ctx.message.id().unwrap_or(""),
                    error = %err,
                    duration = self.duration(),
                    "processing failed"
                );
                self.subscriber.on_error(&err);
                Err(err)
            }
        }
    }
}
