//! Error taxonomy for the discovery service.

use thiserror::Error;

/// Errors surfaced by the sync pipeline and the command surface.
///
/// The tick loop distinguishes three outcomes: a hard error (any variant
/// here) aborts the tick and leaves the cache untouched; structural emptiness
/// is not an error and flows through the pipeline as an empty topology; a
/// clean tick replaces the cache.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Orchestrator call failed, including partial-failure batches.
    #[error("provider error: {0}")]
    Provider(#[source] anyhow::Error),

    /// Application instances exist but no sidecar runs anywhere in the
    /// fleet, so no advertised endpoint can be computed.
    #[error("no sidecar instances found across the fleet")]
    NoSidecars,

    /// DNS zone lookup/bootstrap or batch apply failed.
    #[error("dns error: {0}")]
    Dns(#[source] anyhow::Error),

    /// The sync worker is gone; commands can no longer be served.
    #[error("sync worker unavailable")]
    WorkerUnavailable,
}
