//! Topology pipeline: fetch raw orchestrator state, classify it, and build
//! the normalized service set.
//!
//! Each tick runs the stages in order: [`fetch::fetch`] pulls one arena of
//! records per stage, [`classify::classify`] joins and tags them, and
//! [`build`] assembles `CloudService`s and materializes shadow services.

pub mod build;
pub mod classify;
pub mod fetch;

pub use build::{build_services, materialize_shadows, ShadowMapping, ShadowTarget};
pub use classify::{classify, ApplicationInfo, Classified, EnrichedTask, InstanceInfo};
pub use fetch::{fetch, RawTopology};

use fleet_events::CloudService;
use serde::{Deserialize, Serialize};

/// Provider-native handle kept beside a cached service so mutations need no
/// re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHandle {
    pub provider_id: String,
    pub task_definition: String,
}

/// Cache entry: the normalized service plus its provider handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredService {
    pub service: CloudService,
    pub handle: ProviderHandle,
}
