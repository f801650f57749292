//! # courier-protocol
//!
//! Wire-level primitives for the Courier pub/sub framework.
//!
//! This crate owns everything that crosses the process boundary:
//!
//! - **Descriptor** - The parsed webhook body describing one inbound delivery
//! - **Subscription names** - Encoding/decoding of handler identity + topic
//! - **Tokens** - Signed verification tokens guarding the webhook endpoint
//!
//! It has no dependency on the dispatch core; `courier-core` builds on top
//! of these types.

pub mod auth;
pub mod descriptor;
pub mod subname;

pub use auth::AuthError;
pub use descriptor::{Descriptor, DescriptorError, WireMessage};
