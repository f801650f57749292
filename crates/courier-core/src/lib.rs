//! # courier-core
//!
//! Message dispatch core for the Courier pub/sub toolkit.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Bus** - Dispatch facade tying config, broker, registry and chains together
//! - **Publisher / Subscriber** - Handler capabilities implemented by application types
//! - **Chain** - Ordered interceptor chains wrapping publish and consume operations
//! - **Broker** - Backend contract, with an in-memory implementation for tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Publisher  │────▶│     Bus     │────▶│   Broker    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  Registry   │────▶│ Subscriber  │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! Everything here is synchronous; async concerns live at the webhook
//! boundary, not in the dispatch core.

pub mod broker;
pub mod bus;
pub mod config;
pub mod error;
pub mod handler;
pub mod interceptor;
pub mod message;
pub mod pipeline;
pub mod registry;

pub use broker::{Broker, MemoryBroker, SubscriptionInfo, TopicInfo};
pub use bus::Bus;
pub use config::Config;
pub use error::CourierError;
pub use handler::{Publisher, Subscriber, SubscriptionOptions, TopicBinding};
pub use interceptor::{Chain, Interceptor, Next};
pub use message::{Message, Metadata};
pub use pipeline::{
    ConsumeContext, ConsumePipeline, PipelineState, PublishContext, PublishPipeline,
    PublisherChain, SubscriberChain,
};
pub use registry::Registry;
