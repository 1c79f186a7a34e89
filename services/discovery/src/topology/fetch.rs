//! Staged, paginated topology fetch.
//!
//! Stage order is significant: tasks → services → task definitions →
//! container instances → nodes; each stage's id set derives from the previous
//! one. An empty result at any stage short-circuits to an empty topology,
//! which is a valid "nothing to do yet" outcome, not an error. Partial
//! failures inside a batch response are hard errors.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, info};

use crate::labels;
use crate::provider::{
    CloudProvider, ContainerInstance, NodeDescription, ServiceDescription, Task, TaskDefinition,
};

/// Ids per batch describe call.
const DESCRIBE_BATCH: usize = 100;

/// One arena of records per fetch stage, joined later by explicit id lookups.
#[derive(Debug, Clone, Default)]
pub struct RawTopology {
    pub tasks: Vec<Task>,
    pub services: Vec<ServiceDescription>,
    pub task_definitions: Vec<TaskDefinition>,
    pub container_instances: Vec<ContainerInstance>,
    pub nodes: Vec<NodeDescription>,
}

impl RawTopology {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when some stage came back empty and there is nothing to build.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            || self.services.is_empty()
            || self.task_definitions.is_empty()
            || self.container_instances.is_empty()
            || self.nodes.is_empty()
    }
}

/// Fetch the full topology snapshot from the orchestrator.
pub async fn fetch(provider: &dyn CloudProvider) -> Result<RawTopology> {
    // Stage 1: running task ids, following continuation tokens.
    let mut task_ids = Vec::new();
    let mut token = None;
    loop {
        let page = provider.list_task_ids(token).await?;
        task_ids.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    if task_ids.is_empty() {
        debug!("No running tasks, topology is empty");
        return Ok(RawTopology::empty());
    }

    // Stage 2: task descriptions.
    let mut tasks = Vec::new();
    for chunk in task_ids.chunks(DESCRIBE_BATCH) {
        let batch = provider.describe_tasks(chunk).await?;
        tasks.extend(batch.into_items("tasks")?);
    }
    if tasks.is_empty() {
        return Ok(RawTopology::empty());
    }

    // Stage 3: owning services, resolved from task groups.
    let service_names: Vec<String> = tasks
        .iter()
        .filter_map(|t| t.group.as_deref())
        .filter_map(|g| g.strip_prefix(labels::SERVICE_GROUP_PREFIX))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if service_names.is_empty() {
        debug!("No service-owned tasks, topology is empty");
        return Ok(RawTopology::empty());
    }

    let mut services = Vec::new();
    for chunk in service_names.chunks(DESCRIBE_BATCH) {
        let batch = provider.describe_services(chunk).await?;
        services.extend(batch.into_items("services")?);
    }
    if services.is_empty() {
        return Ok(RawTopology::empty());
    }

    // Stage 4: task definitions declared by the services.
    let definition_ids: BTreeSet<String> =
        services.iter().map(|s| s.task_definition.clone()).collect();
    let mut task_definitions = Vec::new();
    for id in &definition_ids {
        task_definitions.push(provider.describe_task_definition(id).await?);
    }
    if task_definitions.is_empty() {
        return Ok(RawTopology::empty());
    }

    // Stage 5: container instance → node mapping.
    let instance_ids: Vec<String> = tasks
        .iter()
        .filter_map(|t| t.container_instance_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if instance_ids.is_empty() {
        debug!("No container instance ids on tasks, topology is empty");
        return Ok(RawTopology::empty());
    }

    let mut container_instances = Vec::new();
    for chunk in instance_ids.chunks(DESCRIBE_BATCH) {
        let batch = provider.describe_container_instances(chunk).await?;
        container_instances.extend(batch.into_items("container instances")?);
    }
    if container_instances.is_empty() {
        return Ok(RawTopology::empty());
    }

    // Stage 6: node → IP mapping.
    let node_ids: Vec<String> = container_instances
        .iter()
        .map(|c| c.node_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut nodes = Vec::new();
    for chunk in node_ids.chunks(DESCRIBE_BATCH) {
        let batch = provider.describe_nodes(chunk).await?;
        nodes.extend(batch.into_items("nodes")?);
    }
    if nodes.is_empty() {
        return Ok(RawTopology::empty());
    }

    info!(
        tasks = tasks.len(),
        services = services.len(),
        definitions = task_definitions.len(),
        container_instances = container_instances.len(),
        nodes = nodes.len(),
        "Fetched topology"
    );

    Ok(RawTopology {
        tasks,
        services,
        task_definitions,
        container_instances,
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockCloudProvider, RuntimeContainer};

    fn task(id: &str, group: Option<&str>, instance: Option<&str>) -> Task {
        Task {
            task_id: id.to_string(),
            group: group.map(str::to_string),
            container_instance_id: instance.map(str::to_string),
            containers: vec![RuntimeContainer {
                name: "app".to_string(),
                ports: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn test_fetch_no_tasks_is_empty() {
        let provider = MockCloudProvider::new();
        let topology = fetch(&provider).await.unwrap();
        assert!(topology.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_no_service_groups_is_empty() {
        let provider = MockCloudProvider::new();
        provider.set_tasks(vec![task("t-1", None, Some("ci-1"))]);

        let topology = fetch(&provider).await.unwrap();
        assert!(topology.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_listing_failure_is_error() {
        let provider = MockCloudProvider::new();
        provider.fail_listing(true);

        assert!(fetch(&provider).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_partial_failure_is_error() {
        let provider = MockCloudProvider::new();
        provider.set_tasks(vec![task("t-1", Some("service:a"), Some("ci-1"))]);
        provider.set_task_failures(vec![crate::provider::BatchFailure {
            id: "t-2".to_string(),
            reason: "MISSING".to_string(),
        }]);

        let err = fetch(&provider).await.unwrap_err();
        assert!(err.to_string().contains("t-2"));
    }

    #[tokio::test]
    async fn test_fetch_follows_pagination() {
        // Five tasks at a mock page size of two exercises three pages; the
        // tasks carry no groups so the fetch short-circuits after stage 3,
        // but all ids must have been listed.
        let provider = MockCloudProvider::new();
        provider.set_tasks((0..5).map(|i| task(&format!("t-{i}"), None, None)).collect());

        let mut ids = Vec::new();
        let mut token = None;
        loop {
            let page = provider.list_task_ids(token).await.unwrap();
            ids.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(ids.len(), 5);
    }
}
