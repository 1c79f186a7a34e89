//! Cloud provider adapter: the orchestrator read/write seam.
//!
//! The trait mirrors the orchestrator's API shape: paginated listings via
//! opaque continuation tokens, batch describes that can partially fail, and
//! the mutation calls the command surface needs. A reqwest-backed
//! implementation lives in [`http`]; a scriptable in-memory one in [`mock`].

mod http;
mod mock;

pub use http::HttpCloudProvider;
pub use mock::MockCloudProvider;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation token; `None` signals the last page.
    pub next_token: Option<String>,
}

/// One entry of the partial-failure list inside a batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

/// A batch describe response: resolved items plus per-id failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub failures: Vec<BatchFailure>,
}

impl<T> Batch<T> {
    /// Unwrap the items, treating any partial failure as a hard error.
    pub fn into_items(self, what: &str) -> Result<Vec<T>> {
        if !self.failures.is_empty() {
            anyhow::bail!(
                "{} batch reported {} failure(s): {}",
                what,
                self.failures.len(),
                self.failures
                    .iter()
                    .map(|f| format!("{}: {}", f.id, f.reason))
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
        Ok(self.items)
    }
}

/// Container port mapping; `host_port` is absent when unmapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: Option<u16>,
}

/// A container actually running inside a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeContainer {
    pub name: String,
    /// Runtime container→host bindings.
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

/// One scheduled compute unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    /// Scheduling group, `service:<name>` for service-owned tasks.
    #[serde(default)]
    pub group: Option<String>,
    /// Container instance hosting the task.
    #[serde(default)]
    pub container_instance_id: Option<String>,
    #[serde(default)]
    pub containers: Vec<RuntimeContainer>,
}

/// A provider service as returned by a describe call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescription {
    /// Provider-assigned identifier; the mutation handle.
    pub provider_id: String,
    pub name: String,
    pub status: String,
    /// Task definition the service launches tasks from.
    pub task_definition: String,
    /// Provider tags; carries `fleet.service.id` / `fleet.service.name`.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A container template inside a task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub memory_reservation: Option<i64>,
}

/// A registered task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub family: String,
    #[serde(default)]
    pub containers: Vec<ContainerDefinition>,
}

/// Mapping from a container instance to its hosting node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInstance {
    pub id: String,
    pub node_id: String,
}

/// A physical/virtual node and its network location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub node_id: String,
    #[serde(default)]
    pub private_ip: String,
}

/// Logging driver attached to a deployed container definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDriver {
    pub driver: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Container template submitted on deploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub memory_reservation: Option<i64>,
    #[serde(default)]
    pub log_driver: Option<LogDriver>,
}

/// Task definition submitted on deploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub containers: Vec<ContainerSpec>,
}

/// Service submitted on deploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub task_definition: String,
    pub desired_count: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub placement_constraint: Option<String>,
}

/// Read/write access to the compute orchestrator, scoped to one cluster.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// List ids of running tasks, one page at a time.
    async fn list_task_ids(&self, next_token: Option<String>) -> Result<Page<String>>;

    /// Describe tasks by id.
    async fn describe_tasks(&self, ids: &[String]) -> Result<Batch<Task>>;

    /// Describe services by name.
    async fn describe_services(&self, names: &[String]) -> Result<Batch<ServiceDescription>>;

    /// Describe a single task definition.
    async fn describe_task_definition(&self, id: &str) -> Result<TaskDefinition>;

    /// Describe container instances by id.
    async fn describe_container_instances(&self, ids: &[String])
        -> Result<Batch<ContainerInstance>>;

    /// Describe nodes by id.
    async fn describe_nodes(&self, ids: &[String]) -> Result<Batch<NodeDescription>>;

    /// Register a new task definition.
    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition>;

    /// Deregister a task definition.
    async fn deregister_task_definition(&self, id: &str) -> Result<()>;

    /// Create a service.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceDescription>;

    /// Set a service's desired replica count.
    async fn scale_service(&self, provider_id: &str, desired_count: u32) -> Result<()>;

    /// Delete a service.
    async fn delete_service(&self, provider_id: &str) -> Result<()>;
}
