//! Topology classification: join raw records and tag compute units.
//!
//! A task survives enrichment only when its owning service, task definition,
//! and host info all resolve and its definition carries the managed marker.
//! Retained tasks are then split by the deployment-type label on their
//! container definitions; a container only counts when a runtime container
//! with the same name actually exists in the task.

use std::collections::BTreeMap;

use tracing::debug;

use crate::labels;
use crate::provider::{
    ContainerDefinition, RuntimeContainer, ServiceDescription, Task, TaskDefinition,
};

use super::fetch::RawTopology;

/// Network location of the host backing a compute unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub ip: String,
    pub host_id: String,
    pub node_id: String,
}

/// A task with everything needed to classify it.
#[derive(Debug, Clone)]
pub struct EnrichedTask {
    pub task: Task,
    pub service: ServiceDescription,
    pub definition: TaskDefinition,
    pub host: InstanceInfo,
}

/// A container definition matched with its running counterpart.
#[derive(Debug, Clone)]
pub struct ContainerPair {
    pub definition: ContainerDefinition,
    pub runtime: RuntimeContainer,
}

/// A sidecar container running on a known host.
#[derive(Debug, Clone)]
pub struct SidecarCandidate {
    pub host: InstanceInfo,
    pub pair: ContainerPair,
}

/// A classified application task, with its optional model sibling.
#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    pub task: EnrichedTask,
    pub app: ContainerPair,
    pub model: Option<ContainerPair>,
}

/// Output of classification.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    pub sidecars: Vec<SidecarCandidate>,
    pub applications: Vec<ApplicationInfo>,
}

/// Classify a raw topology snapshot.
pub fn classify(topology: RawTopology) -> Classified {
    let services: BTreeMap<&str, &ServiceDescription> = topology
        .services
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();
    let definitions: BTreeMap<&str, &TaskDefinition> = topology
        .task_definitions
        .iter()
        .map(|d| (d.id.as_str(), d))
        .collect();
    let instance_nodes: BTreeMap<&str, &str> = topology
        .container_instances
        .iter()
        .map(|c| (c.id.as_str(), c.node_id.as_str()))
        .collect();
    let node_ips: BTreeMap<&str, &str> = topology
        .nodes
        .iter()
        .map(|n| (n.node_id.as_str(), n.private_ip.as_str()))
        .collect();

    let mut classified = Classified::default();

    for task in &topology.tasks {
        let Some(enriched) = enrich(task, &services, &definitions, &instance_nodes, &node_ips)
        else {
            continue;
        };

        if let Some(pair) = container_pair(&enriched, labels::TYPE_SIDECAR) {
            classified.sidecars.push(SidecarCandidate {
                host: enriched.host.clone(),
                pair,
            });
        }

        if let Some(app) = container_pair(&enriched, labels::TYPE_APP) {
            let model = container_pair(&enriched, labels::TYPE_MODEL);
            classified.applications.push(ApplicationInfo {
                task: enriched,
                app,
                model,
            });
        }
    }

    debug!(
        sidecars = classified.sidecars.len(),
        applications = classified.applications.len(),
        "Classified topology"
    );

    classified
}

/// Join one task against the service/definition/host arenas.
///
/// All three must resolve, the host IP must be non-empty, and the definition
/// must carry the managed marker on some container; otherwise the task is
/// dropped.
fn enrich(
    task: &Task,
    services: &BTreeMap<&str, &ServiceDescription>,
    definitions: &BTreeMap<&str, &TaskDefinition>,
    instance_nodes: &BTreeMap<&str, &str>,
    node_ips: &BTreeMap<&str, &str>,
) -> Option<EnrichedTask> {
    let service_name = task
        .group
        .as_deref()?
        .strip_prefix(labels::SERVICE_GROUP_PREFIX)?;
    let service = services.get(service_name)?;
    let definition = definitions.get(service.task_definition.as_str())?;

    let host_id = task.container_instance_id.as_deref()?;
    let node_id = instance_nodes.get(host_id)?;
    let ip = node_ips.get(node_id).copied().unwrap_or_default();
    if ip.is_empty() {
        debug!(task_id = %task.task_id, node_id, "Dropping task on node without an IP");
        return None;
    }

    let managed = definition
        .containers
        .iter()
        .any(|c| c.labels.contains_key(labels::MANAGED));
    if !managed {
        return None;
    }

    Some(EnrichedTask {
        task: task.clone(),
        service: (*service).clone(),
        definition: (*definition).clone(),
        host: InstanceInfo {
            ip: ip.to_string(),
            host_id: host_id.to_string(),
            node_id: node_id.to_string(),
        },
    })
}

/// Find the container pair for a deployment type: a definition labeled with
/// it plus the identically named runtime container.
fn container_pair(enriched: &EnrichedTask, deployment_type: &str) -> Option<ContainerPair> {
    let definition = enriched
        .definition
        .containers
        .iter()
        .find(|c| c.labels.get(labels::DEPLOYMENT_TYPE).map(String::as_str) == Some(deployment_type))?;
    let runtime = enriched
        .task
        .containers
        .iter()
        .find(|c| c.name == definition.name)?;

    Some(ContainerPair {
        definition: definition.clone(),
        runtime: runtime.clone(),
    })
}
