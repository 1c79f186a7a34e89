//! Orchestrator API client.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{
    Batch, CloudProvider, ContainerInstance, NodeDescription, Page, ServiceDescription,
    ServiceSpec, Task, TaskDefinition, TaskDefinitionSpec,
};

/// Orchestrator REST API client scoped to one cluster.
pub struct HttpCloudProvider {
    client: reqwest::Client,
    base_url: String,
    cluster: String,
}

impl HttpCloudProvider {
    pub fn new(base_url: impl Into<String>, cluster: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            cluster: cluster.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "Provider GET");
        let response = self.client.get(url).send().await?;
        Self::decode(url, response).await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!(url = %url, "Provider POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::decode(url, response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %body, "Provider call failed");
            anyhow::bail!("provider call failed: {} - {}", status, body);
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Serialize)]
struct IdsRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct NamesRequest<'a> {
    names: &'a [String],
}

#[derive(Debug, Serialize)]
struct ScaleRequest {
    desired_count: u32,
}

#[derive(Debug, Deserialize)]
struct TaskIdPage {
    task_ids: Vec<String>,
    #[serde(default)]
    next_token: Option<String>,
}

#[async_trait]
impl CloudProvider for HttpCloudProvider {
    async fn list_task_ids(&self, next_token: Option<String>) -> Result<Page<String>> {
        let mut url = format!("{}/v1/clusters/{}/tasks", self.base_url, self.cluster);
        if let Some(token) = &next_token {
            url = format!("{url}?page_token={token}");
        }

        let page: TaskIdPage = self.get_json(&url).await?;
        Ok(Page {
            items: page.task_ids,
            next_token: page.next_token,
        })
    }

    async fn describe_tasks(&self, ids: &[String]) -> Result<Batch<Task>> {
        let url = format!(
            "{}/v1/clusters/{}/tasks:describe",
            self.base_url, self.cluster
        );
        self.post_json(&url, &IdsRequest { ids }).await
    }

    async fn describe_services(&self, names: &[String]) -> Result<Batch<ServiceDescription>> {
        let url = format!(
            "{}/v1/clusters/{}/services:describe",
            self.base_url, self.cluster
        );
        self.post_json(&url, &NamesRequest { names }).await
    }

    async fn describe_task_definition(&self, id: &str) -> Result<TaskDefinition> {
        let url = format!("{}/v1/task-definitions/{}", self.base_url, id);
        self.get_json(&url).await
    }

    async fn describe_container_instances(
        &self,
        ids: &[String],
    ) -> Result<Batch<ContainerInstance>> {
        let url = format!(
            "{}/v1/clusters/{}/container-instances:describe",
            self.base_url, self.cluster
        );
        self.post_json(&url, &IdsRequest { ids }).await
    }

    async fn describe_nodes(&self, ids: &[String]) -> Result<Batch<NodeDescription>> {
        let url = format!("{}/v1/nodes:describe", self.base_url);
        self.post_json(&url, &IdsRequest { ids }).await
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition> {
        let url = format!("{}/v1/task-definitions", self.base_url);
        self.post_json(&url, spec).await
    }

    async fn deregister_task_definition(&self, id: &str) -> Result<()> {
        let url = format!("{}/v1/task-definitions/{}", self.base_url, id);
        debug!(url = %url, "Provider DELETE");
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "deregister task definition failed with status {}",
                response.status()
            );
        }
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceDescription> {
        let url = format!("{}/v1/clusters/{}/services", self.base_url, self.cluster);
        self.post_json(&url, spec).await
    }

    async fn scale_service(&self, provider_id: &str, desired_count: u32) -> Result<()> {
        let url = format!(
            "{}/v1/clusters/{}/services/{}:scale",
            self.base_url, self.cluster, provider_id
        );
        let _: serde_json::Value = self.post_json(&url, &ScaleRequest { desired_count }).await?;
        Ok(())
    }

    async fn delete_service(&self, provider_id: &str) -> Result<()> {
        let url = format!(
            "{}/v1/clusters/{}/services/{}",
            self.base_url, self.cluster, provider_id
        );
        debug!(url = %url, "Provider DELETE");
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("delete service failed with status {}", response.status());
        }
        Ok(())
    }
}
