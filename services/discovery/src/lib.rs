//! fleetsync discovery service library.
//!
//! The discovery service keeps an internal registry of deployed service
//! instances synchronized with the topology reported by the cloud compute
//! orchestrator, and keeps a DNS directory pointed at the IPs of the manager
//! role. A single worker owns the registry cache; a fixed-period tick drives
//! the fetch → classify → build → reconcile → DNS sync pipeline, and command
//! requests are serialized through the same mailbox.

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod labels;
pub mod provider;
pub mod sync;
pub mod topology;
