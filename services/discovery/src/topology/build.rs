//! Composite service builder and shadow service materializer.

use std::collections::BTreeMap;

use fleet_events::{CloudService, Endpoint, ImageRef, ServiceInstance, SidecarInstance};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::labels;

use super::classify::{ApplicationInfo, Classified, ContainerPair, SidecarCandidate};
use super::{ProviderHandle, StoredService};

/// Build one sidecar per host; a host with multiple sidecar tasks keeps the
/// last one seen.
pub fn build_sidecars(candidates: Vec<SidecarCandidate>) -> BTreeMap<String, SidecarInstance> {
    let mut sidecars = BTreeMap::new();
    for candidate in candidates {
        let labels_map = &candidate.pair.definition.labels;
        let sidecar = SidecarInstance {
            host: candidate.host.ip.clone(),
            ingress_port: label_port(
                labels_map,
                labels::SIDECAR_INGRESS_PORT,
                labels::DEFAULT_SIDECAR_INGRESS_PORT,
            ),
            egress_port: label_port(
                labels_map,
                labels::SIDECAR_EGRESS_PORT,
                labels::DEFAULT_SIDECAR_EGRESS_PORT,
            ),
            admin_port: label_port(
                labels_map,
                labels::SIDECAR_ADMIN_PORT,
                labels::DEFAULT_SIDECAR_ADMIN_PORT,
            ),
        };
        sidecars.insert(candidate.host.ip, sidecar);
    }
    sidecars
}

fn label_port(labels_map: &BTreeMap<String, String>, key: &str, default: u16) -> u16 {
    labels_map
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Assemble the normalized service set from a classified topology.
///
/// Fails hard when application instances exist but no sidecar runs anywhere:
/// no advertised endpoint can be computed, which is fleet inconsistency
/// rather than structural emptiness.
pub fn build_services(classified: Classified) -> Result<Vec<StoredService>, DiscoveryError> {
    let sidecars = build_sidecars(classified.sidecars);

    if classified.applications.is_empty() {
        return Ok(Vec::new());
    }
    // The guard and the fallback are the same lookup: a first sidecar exists
    // exactly when the build may proceed.
    let Some(fallback) = sidecars.values().next().cloned() else {
        return Err(DiscoveryError::NoSidecars);
    };

    // Group application candidates by owning numeric service id.
    let mut groups: BTreeMap<i64, Vec<ApplicationInfo>> = BTreeMap::new();
    for app in classified.applications {
        let Some(id) = service_id(&app) else {
            warn!(
                service = %app.task.service.name,
                "Service has no parsable id tag, skipping"
            );
            continue;
        };
        groups.entry(id).or_default().push(app);
    }

    let mut services = Vec::new();
    for (id, group) in groups {
        // Representative metadata comes from the first group member.
        let first = &group[0];
        let service = &first.task.service;
        let name = service
            .tags
            .get(labels::SERVICE_NAME)
            .cloned()
            .unwrap_or_else(|| service.name.clone());
        let image = ImageRef::parse(&first.app.definition.image);
        let handle = ProviderHandle {
            provider_id: service.provider_id.clone(),
            task_definition: service.task_definition.clone(),
        };
        let status = service.status.clone();

        let instances = group
            .iter()
            .map(|app| build_instance(app, &sidecars, &fallback))
            .collect();

        services.push(StoredService {
            service: CloudService {
                id,
                name,
                status,
                provider_id: service.provider_id.clone(),
                image,
                instances,
            },
            handle,
        });
    }

    debug!(services = services.len(), "Built service set");
    Ok(services)
}

fn service_id(app: &ApplicationInfo) -> Option<i64> {
    app.task
        .service
        .tags
        .get(labels::SERVICE_ID)
        .and_then(|v| v.parse().ok())
}

fn build_instance(
    app: &ApplicationInfo,
    sidecars: &BTreeMap<String, SidecarInstance>,
    fallback: &SidecarInstance,
) -> ServiceInstance {
    let host = &app.task.host.ip;

    // Advertise via the colocated sidecar; fall back to an arbitrary one,
    // which callers must not assume to be a usable endpoint.
    let sidecar = match sidecars.get(host) {
        Some(sidecar) => sidecar.clone(),
        None => {
            warn!(
                task_id = %app.task.task.task_id,
                host = %host,
                fallback_host = %fallback.host,
                "No sidecar colocated with application, using fallback"
            );
            fallback.clone()
        }
    };

    let model = app.model.as_ref().map(|pair| {
        Endpoint::new(host.clone(), host_port(pair, labels::DEFAULT_MODEL_PORT))
    });

    ServiceInstance {
        instance_id: app.task.task.task_id.clone(),
        app: Endpoint::new(host.clone(), host_port(&app.app, labels::DEFAULT_APP_PORT)),
        advertised_host: sidecar.host.clone(),
        advertised_port: sidecar.ingress_port,
        sidecar,
        model,
    }
}

/// Host port for a container: runtime binding first, then the declared
/// mapping, then the default.
fn host_port(pair: &ContainerPair, default: u16) -> u16 {
    pair.runtime
        .ports
        .iter()
        .find_map(|p| p.host_port)
        .or_else(|| pair.definition.port_mappings.iter().find_map(|p| p.host_port))
        .unwrap_or(default)
}

/// Shadow service target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowTarget {
    pub id: i64,
    pub name: String,
}

/// Static real-service-id → shadow-service mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowMapping(BTreeMap<i64, ShadowTarget>);

impl ShadowMapping {
    pub fn new(mapping: BTreeMap<i64, ShadowTarget>) -> Self {
        Self(mapping)
    }

    pub fn get(&self, real_id: i64) -> Option<&ShadowTarget> {
        self.0.get(&real_id)
    }

    /// Whether `id` is one of the synthetic shadow ids.
    pub fn is_shadow_id(&self, id: i64) -> bool {
        self.0.values().any(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Append a synthetic service for every real service present in the mapping.
///
/// Shadows expose the fixed alternate HTTP port on every instance's main
/// application; everything else, including the provider handle, is carried
/// over unchanged. Originals are never replaced. A shadow's handle aliases
/// the real service's provider resources, so teardown paths must never act
/// on a shadow id (see [`ShadowMapping::is_shadow_id`]).
pub fn materialize_shadows(services: &mut Vec<StoredService>, mapping: &ShadowMapping) {
    if mapping.is_empty() {
        return;
    }

    let mut shadows = Vec::new();
    for stored in services.iter() {
        let Some(target) = mapping.get(stored.service.id) else {
            continue;
        };

        let mut shadow = stored.clone();
        shadow.service.id = target.id;
        shadow.service.name = target.name.clone();
        for instance in &mut shadow.service.instances {
            instance.app.port = labels::SHADOW_HTTP_PORT;
        }

        debug!(
            real_id = stored.service.id,
            shadow_id = target.id,
            shadow_name = %target.name,
            "Materialized shadow service"
        );
        shadows.push(shadow);
    }

    services.extend(shadows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ContainerDefinition, PortMapping, RuntimeContainer, ServiceDescription, Task, TaskDefinition};
    use crate::topology::classify::{ContainerPair, EnrichedTask, InstanceInfo, SidecarCandidate};

    fn host(ip: &str) -> InstanceInfo {
        InstanceInfo {
            ip: ip.to_string(),
            host_id: format!("ci-{ip}"),
            node_id: format!("n-{ip}"),
        }
    }

    fn pair(name: &str, labels_map: BTreeMap<String, String>, host_port: Option<u16>) -> ContainerPair {
        ContainerPair {
            definition: ContainerDefinition {
                name: name.to_string(),
                image: "ghcr.io/org/app:v3".to_string(),
                labels: labels_map,
                port_mappings: vec![],
                environment: BTreeMap::new(),
                memory_reservation: None,
            },
            runtime: RuntimeContainer {
                name: name.to_string(),
                ports: vec![PortMapping {
                    container_port: 9091,
                    host_port,
                }],
            },
        }
    }

    fn sidecar_candidate(ip: &str) -> SidecarCandidate {
        SidecarCandidate {
            host: host(ip),
            pair: pair("proxy", BTreeMap::new(), None),
        }
    }

    fn app_info(service_id: i64, task_id: &str, ip: &str, port: Option<u16>) -> ApplicationInfo {
        let mut tags = BTreeMap::new();
        tags.insert(labels::SERVICE_ID.to_string(), service_id.to_string());
        tags.insert(labels::SERVICE_NAME.to_string(), "scorer".to_string());

        ApplicationInfo {
            task: EnrichedTask {
                task: Task {
                    task_id: task_id.to_string(),
                    group: Some("service:scorer".to_string()),
                    container_instance_id: Some(format!("ci-{ip}")),
                    containers: vec![],
                },
                service: ServiceDescription {
                    provider_id: "svc/scorer".to_string(),
                    name: "scorer-42".to_string(),
                    status: "ACTIVE".to_string(),
                    task_definition: "def-1".to_string(),
                    tags,
                },
                definition: TaskDefinition {
                    id: "def-1".to_string(),
                    family: "scorer".to_string(),
                    containers: vec![],
                },
                host: host(ip),
            },
            app: pair("app", BTreeMap::new(), port),
            model: None,
        }
    }

    #[test]
    fn test_sidecar_last_write_wins_per_host() {
        let sidecars = build_sidecars(vec![sidecar_candidate("10.0.0.1"), sidecar_candidate("10.0.0.1")]);
        assert_eq!(sidecars.len(), 1);
    }

    #[test]
    fn test_sidecar_ports_from_labels_with_defaults() {
        let mut labeled = sidecar_candidate("10.0.0.1");
        labeled
            .pair
            .definition
            .labels
            .insert(labels::SIDECAR_INGRESS_PORT.to_string(), "18080".to_string());

        let sidecars = build_sidecars(vec![labeled]);
        let sidecar = &sidecars["10.0.0.1"];
        assert_eq!(sidecar.ingress_port, 18080);
        assert_eq!(sidecar.egress_port, labels::DEFAULT_SIDECAR_EGRESS_PORT);
        assert_eq!(sidecar.admin_port, labels::DEFAULT_SIDECAR_ADMIN_PORT);
    }

    #[test]
    fn test_no_sidecars_with_applications_is_hard_failure() {
        let classified = Classified {
            sidecars: vec![],
            applications: vec![app_info(42, "t-1", "10.0.0.1", None)],
        };

        assert!(matches!(
            build_services(classified),
            Err(DiscoveryError::NoSidecars)
        ));
    }

    #[test]
    fn test_nothing_to_build_is_empty_not_error() {
        let classified = Classified::default();
        assert!(build_services(classified).unwrap().is_empty());
    }

    #[test]
    fn test_build_groups_by_service_id() {
        let classified = Classified {
            sidecars: vec![sidecar_candidate("10.0.0.1"), sidecar_candidate("10.0.0.2")],
            applications: vec![
                app_info(42, "t-1", "10.0.0.1", Some(32001)),
                app_info(42, "t-2", "10.0.0.2", None),
                app_info(7, "t-3", "10.0.0.1", None),
            ],
        };

        let services = build_services(classified).unwrap();
        assert_eq!(services.len(), 2);

        let svc42 = services.iter().find(|s| s.service.id == 42).unwrap();
        assert_eq!(svc42.service.name, "scorer");
        assert_eq!(svc42.service.image.tag, "v3");
        assert_eq!(svc42.service.instances.len(), 2);

        // Mapped host port kept, default applied when unmapped.
        assert_eq!(svc42.service.instances[0].app.port, 32001);
        assert_eq!(svc42.service.instances[1].app.port, labels::DEFAULT_APP_PORT);

        // Each instance is advertised via its colocated sidecar.
        assert_eq!(svc42.service.instances[0].advertised_host, "10.0.0.1");
        assert_eq!(svc42.service.instances[1].advertised_host, "10.0.0.2");
    }

    #[test]
    fn test_fallback_sidecar_when_not_colocated() {
        let classified = Classified {
            sidecars: vec![sidecar_candidate("10.0.0.9")],
            applications: vec![app_info(42, "t-1", "10.0.0.1", None)],
        };

        let services = build_services(classified).unwrap();
        let instance = &services[0].service.instances[0];
        assert_eq!(instance.app.host, "10.0.0.1");
        assert_eq!(instance.advertised_host, "10.0.0.9");
    }

    #[test]
    fn test_unparsable_service_id_is_skipped() {
        let mut bad = app_info(42, "t-1", "10.0.0.1", None);
        bad.task
            .service
            .tags
            .insert(labels::SERVICE_ID.to_string(), "not-a-number".to_string());

        let classified = Classified {
            sidecars: vec![sidecar_candidate("10.0.0.1")],
            applications: vec![bad],
        };

        assert!(build_services(classified).unwrap().is_empty());
    }

    #[test]
    fn test_shadow_materialization() {
        let classified = Classified {
            sidecars: vec![sidecar_candidate("10.0.0.1")],
            applications: vec![app_info(42, "t-1", "10.0.0.1", Some(32001))],
        };
        let mut services = build_services(classified).unwrap();

        let mapping: ShadowMapping = serde_json::from_str(
            r#"{"42": {"id": 142, "name": "scorer-http"}}"#,
        )
        .unwrap();
        materialize_shadows(&mut services, &mapping);

        assert_eq!(services.len(), 2);
        let original = services.iter().find(|s| s.service.id == 42).unwrap();
        let shadow = services.iter().find(|s| s.service.id == 142).unwrap();

        assert_eq!(shadow.service.name, "scorer-http");
        assert_eq!(
            shadow.service.instances[0].app.port,
            labels::SHADOW_HTTP_PORT
        );
        // Only the app port differs from the original.
        assert_eq!(original.service.instances[0].app.port, 32001);
        assert_eq!(
            shadow.service.instances[0].advertised_host,
            original.service.instances[0].advertised_host
        );
        assert_eq!(shadow.handle, original.handle);
    }

    #[test]
    fn test_shadow_mapping_miss_adds_nothing() {
        let classified = Classified {
            sidecars: vec![sidecar_candidate("10.0.0.1")],
            applications: vec![app_info(42, "t-1", "10.0.0.1", None)],
        };
        let mut services = build_services(classified).unwrap();

        materialize_shadows(&mut services, &ShadowMapping::default());
        assert_eq!(services.len(), 1);
    }
}
