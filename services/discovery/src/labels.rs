//! Container labels and well-known ports driving topology classification.
//!
//! Classification is purely label-driven: container definitions declare what
//! they are, so co-scheduled sidecar/app/model containers can be told apart
//! without naming conventions on the service.

/// Marker label: a container definition carrying it belongs to this platform.
pub const MANAGED: &str = "fleet.managed";

/// Deployment-type label on container definitions.
pub const DEPLOYMENT_TYPE: &str = "fleet.deployment-type";

/// `fleet.deployment-type` values.
pub const TYPE_SIDECAR: &str = "sidecar";
pub const TYPE_APP: &str = "app";
pub const TYPE_MODEL: &str = "model";

/// Service-level tags carrying the platform identity of a provider service.
pub const SERVICE_ID: &str = "fleet.service.id";
pub const SERVICE_NAME: &str = "fleet.service.name";

/// Sidecar port advertisement labels; defaults apply when absent.
pub const SIDECAR_INGRESS_PORT: &str = "fleet.sidecar.ingress-port";
pub const SIDECAR_EGRESS_PORT: &str = "fleet.sidecar.egress-port";
pub const SIDECAR_ADMIN_PORT: &str = "fleet.sidecar.admin-port";

/// Task group prefix linking a task to its owning service.
pub const SERVICE_GROUP_PREFIX: &str = "service:";

pub const DEFAULT_SIDECAR_INGRESS_PORT: u16 = 8080;
pub const DEFAULT_SIDECAR_EGRESS_PORT: u16 = 8081;
pub const DEFAULT_SIDECAR_ADMIN_PORT: u16 = 8082;

/// Application port when the main container has no host mapping.
pub const DEFAULT_APP_PORT: u16 = 9091;

/// Model port when the model container has no host mapping.
pub const DEFAULT_MODEL_PORT: u16 = 9092;

/// Fixed HTTP-compatible port shadow services expose.
pub const SHADOW_HTTP_PORT: u16 = 9090;
