//! # fleet-events
//!
//! Shared service model and discovery event definitions for the fleetsync
//! platform.
//!
//! ## Design Principles
//!
//! - The service model (`CloudService` and friends) is the normalized view of
//!   what the orchestrator is actually running; it carries no provider-native
//!   handles and is safe to serialize over any surface.
//! - Discovery events are immutable snapshots of a reconciliation delta.
//!   Delivery is at-most-once and unacknowledged; consumers tolerate missed
//!   events via their own periodic resync.
//! - Full value equality on `CloudService` is what drives "changed"
//!   classification, so every field participates in `PartialEq`.

mod bus;
mod error;
mod model;
mod types;

pub use bus::{BroadcastBus, EventPublisher};
pub use error::EventError;
pub use model::*;
pub use types::*;
