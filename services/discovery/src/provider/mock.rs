//! Scriptable in-memory provider for tests and development.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{
    Batch, BatchFailure, CloudProvider, ContainerDefinition, ContainerInstance, NodeDescription,
    Page, ServiceDescription, ServiceSpec, Task, TaskDefinition, TaskDefinitionSpec,
};

/// In-memory provider holding a scripted topology snapshot.
///
/// Listings paginate with a small page size so continuation-token handling is
/// exercised; mutations are recorded for assertions.
pub struct MockCloudProvider {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    tasks: Vec<Task>,
    services: Vec<ServiceDescription>,
    definitions: Vec<TaskDefinition>,
    container_instances: Vec<ContainerInstance>,
    nodes: Vec<NodeDescription>,

    fail_listing: bool,
    fail_create: bool,
    task_failures: Vec<BatchFailure>,

    definition_seq: u64,
    registered: Vec<TaskDefinitionSpec>,
    created: Vec<ServiceSpec>,
    scaled: Vec<(String, u32)>,
    deleted_services: Vec<String>,
    deregistered: Vec<String>,
}

const PAGE_SIZE: usize = 2;

impl MockCloudProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Replace the whole scripted topology.
    pub fn set_topology(
        &self,
        tasks: Vec<Task>,
        services: Vec<ServiceDescription>,
        definitions: Vec<TaskDefinition>,
        container_instances: Vec<ContainerInstance>,
        nodes: Vec<NodeDescription>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.tasks = tasks;
        state.services = services;
        state.definitions = definitions;
        state.container_instances = container_instances;
        state.nodes = nodes;
    }

    /// Replace only the running tasks (topology change between ticks).
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.state.lock().unwrap().tasks = tasks;
    }

    /// Make the task listing fail with a provider error.
    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_listing = fail;
    }

    /// Make service creation fail with a provider error.
    pub fn fail_create_service(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    /// Inject a partial-failure list into task describes.
    pub fn set_task_failures(&self, failures: Vec<BatchFailure>) {
        self.state.lock().unwrap().task_failures = failures;
    }

    pub fn created_services(&self) -> Vec<ServiceSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn registered_definitions(&self) -> Vec<TaskDefinitionSpec> {
        self.state.lock().unwrap().registered.clone()
    }

    pub fn scaled_calls(&self) -> Vec<(String, u32)> {
        self.state.lock().unwrap().scaled.clone()
    }

    pub fn deleted_services(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_services.clone()
    }

    pub fn deregistered_definitions(&self) -> Vec<String> {
        self.state.lock().unwrap().deregistered.clone()
    }
}

impl Default for MockCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for MockCloudProvider {
    async fn list_task_ids(&self, next_token: Option<String>) -> Result<Page<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            anyhow::bail!("mock provider configured to fail listings");
        }

        let start: usize = next_token.as_deref().and_then(|t| t.parse().ok()).unwrap_or(0);
        let ids: Vec<String> = state
            .tasks
            .iter()
            .skip(start)
            .take(PAGE_SIZE)
            .map(|t| t.task_id.clone())
            .collect();

        let consumed = start + ids.len();
        let next_token = (consumed < state.tasks.len()).then(|| consumed.to_string());

        Ok(Page {
            items: ids,
            next_token,
        })
    }

    async fn describe_tasks(&self, ids: &[String]) -> Result<Batch<Task>> {
        let state = self.state.lock().unwrap();
        Ok(Batch {
            items: state
                .tasks
                .iter()
                .filter(|t| ids.contains(&t.task_id))
                .cloned()
                .collect(),
            failures: state.task_failures.clone(),
        })
    }

    async fn describe_services(&self, names: &[String]) -> Result<Batch<ServiceDescription>> {
        let state = self.state.lock().unwrap();
        Ok(Batch {
            items: state
                .services
                .iter()
                .filter(|s| names.contains(&s.name))
                .cloned()
                .collect(),
            failures: vec![],
        })
    }

    async fn describe_task_definition(&self, id: &str) -> Result<TaskDefinition> {
        let state = self.state.lock().unwrap();
        state
            .definitions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown task definition: {id}"))
    }

    async fn describe_container_instances(
        &self,
        ids: &[String],
    ) -> Result<Batch<ContainerInstance>> {
        let state = self.state.lock().unwrap();
        Ok(Batch {
            items: state
                .container_instances
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect(),
            failures: vec![],
        })
    }

    async fn describe_nodes(&self, ids: &[String]) -> Result<Batch<NodeDescription>> {
        let state = self.state.lock().unwrap();
        Ok(Batch {
            items: state
                .nodes
                .iter()
                .filter(|n| ids.contains(&n.node_id))
                .cloned()
                .collect(),
            failures: vec![],
        })
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition> {
        let mut state = self.state.lock().unwrap();
        state.definition_seq += 1;
        let definition = TaskDefinition {
            id: format!("{}:{}", spec.family, state.definition_seq),
            family: spec.family.clone(),
            containers: spec
                .containers
                .iter()
                .map(|c| ContainerDefinition {
                    name: c.name.clone(),
                    image: c.image.clone(),
                    labels: c.labels.clone(),
                    port_mappings: c.port_mappings.clone(),
                    environment: c.environment.clone(),
                    memory_reservation: c.memory_reservation,
                })
                .collect(),
        };
        state.registered.push(spec.clone());
        state.definitions.push(definition.clone());
        Ok(definition)
    }

    async fn deregister_task_definition(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deregistered.push(id.to_string());
        state.definitions.retain(|d| d.id != id);
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceDescription> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            anyhow::bail!("mock provider configured to fail service creation");
        }
        let description = ServiceDescription {
            provider_id: format!("svc/{}", spec.name),
            name: spec.name.clone(),
            status: "ACTIVE".to_string(),
            task_definition: spec.task_definition.clone(),
            tags: spec.tags.clone(),
        };
        state.created.push(spec.clone());
        state.services.push(description.clone());
        Ok(description)
    }

    async fn scale_service(&self, provider_id: &str, desired_count: u32) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .scaled
            .push((provider_id.to_string(), desired_count));
        Ok(())
    }

    async fn delete_service(&self, provider_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted_services.push(provider_id.to_string());
        state.services.retain(|s| s.provider_id != provider_id);
        Ok(())
    }
}
