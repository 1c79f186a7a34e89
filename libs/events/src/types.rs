//! Discovery event definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CloudService;

/// All discovery event type names as constants.
pub mod event_types {
    pub const SERVICES_CHANGED: &str = "discovery.services_changed";
    pub const SERVICES_REMOVED: &str = "discovery.services_removed";
}

/// A reconciliation delta published to discovery consumers.
///
/// `ServicesChanged` carries both newly added and modified services in a
/// single event; consumers treat them identically (upsert).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "services", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    /// Services no longer present at the provider.
    ServicesRemoved(Vec<CloudService>),

    /// Services added or changed since the previous snapshot.
    ServicesChanged(Vec<CloudService>),
}

impl DiscoveryEvent {
    /// The event type name for routing and logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            DiscoveryEvent::ServicesRemoved(_) => event_types::SERVICES_REMOVED,
            DiscoveryEvent::ServicesChanged(_) => event_types::SERVICES_CHANGED,
        }
    }

    /// Services carried by the event.
    pub fn services(&self) -> &[CloudService] {
        match self {
            DiscoveryEvent::ServicesRemoved(s) | DiscoveryEvent::ServicesChanged(s) => s,
        }
    }
}

/// Envelope wrapping a discovery event with its publication timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub occurred_at: DateTime<Utc>,
    pub event: DiscoveryEvent,
}

impl EventEnvelope {
    pub fn now(event: DiscoveryEvent) -> Self {
        Self {
            occurred_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageRef;

    fn service(id: i64) -> CloudService {
        CloudService {
            id,
            name: format!("svc-{id}"),
            status: "ACTIVE".to_string(),
            provider_id: format!("arn:{id}"),
            image: ImageRef::parse("app:v1"),
            instances: vec![],
        }
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            DiscoveryEvent::ServicesChanged(vec![]).event_type(),
            "discovery.services_changed"
        );
        assert_eq!(
            DiscoveryEvent::ServicesRemoved(vec![]).event_type(),
            "discovery.services_removed"
        );
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = DiscoveryEvent::ServicesChanged(vec![service(1), service(2)]);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"services_changed\""));

        let back: DiscoveryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.services().len(), 2);
        assert_eq!(back, event);
    }
}
