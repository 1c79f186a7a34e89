//! Normalized service model shared across the platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A host/port pair for one sub-instance of a running replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A sidecar (proxy/gateway) instance fronting the applications on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarInstance {
    /// Host IP the sidecar runs on.
    pub host: String,

    /// Port accepting ingress traffic for colocated applications.
    pub ingress_port: u16,

    /// Port used for egress traffic from colocated applications.
    pub egress_port: u16,

    /// Administrative/status port.
    pub admin_port: u16,
}

/// An image reference split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Parse a `repository[:tag]` reference.
    ///
    /// The tag is everything after the last `:`, unless that segment contains
    /// a `/` (a registry port, not a tag). Defaults to `latest`.
    pub fn parse(image: &str) -> Self {
        match image.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => Self {
                repository: repo.to_string(),
                tag: tag.to_string(),
            },
            _ => Self {
                repository: image.to_string(),
                tag: "latest".to_string(),
            },
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// One running replica of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Provider-assigned identifier of the compute unit.
    pub instance_id: String,

    /// Main application endpoint.
    pub app: Endpoint,

    /// Sidecar advertised for this replica.
    pub sidecar: SidecarInstance,

    /// Optional model endpoint co-scheduled with the application.
    pub model: Option<Endpoint>,

    /// Endpoint callers should address; comes from the sidecar colocated on
    /// the application's host, falling back to an arbitrary sidecar.
    pub advertised_host: String,
    pub advertised_port: u16,
}

/// A deployed service as reported by the cloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudService {
    /// Numeric service identifier; the reconciliation key.
    pub id: i64,

    pub name: String,

    /// Status text as reported by the provider.
    pub status: String,

    /// Provider-assigned service identifier.
    pub provider_id: String,

    pub image: ImageRef,

    /// Running replicas, in build order.
    pub instances: Vec<ServiceInstance>,
}

/// Request to deploy a new service against the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub service_id: i64,
    pub name: String,

    /// `repository[:tag]` image reference.
    pub image: String,

    /// Container port the application listens on.
    pub port: u16,

    /// Environment passed to the application container.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Resource labels attached to the container definition.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Optional placement constraint expression.
    #[serde(default)]
    pub placement_constraint: Option<String>,
}
