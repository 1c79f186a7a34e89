//! DNS provider API client.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::provider::Page;

use super::{Change, DnsProvider, RecordSet, Zone};

/// DNS REST API client.
pub struct HttpDnsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDnsProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %body, "DNS call failed");
            anyhow::bail!("dns call failed: {} - {}", status, body);
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ZoneList {
    zones: Vec<Zone>,
}

#[derive(Debug, Serialize)]
struct CreateZoneRequest<'a> {
    name: &'a str,
    network_id: &'a str,
    private: bool,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<RecordSet>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangeBatchRequest {
    changes: Vec<Change>,
}

#[async_trait]
impl DnsProvider for HttpDnsProvider {
    async fn find_zone(&self, name: &str) -> Result<Option<Zone>> {
        let url = format!("{}/v1/zones?name={}", self.base_url, name);
        debug!(url = %url, "DNS GET");

        let response = self.client.get(&url).send().await?;
        let list: ZoneList = Self::decode(&url, response).await?;
        Ok(list.zones.into_iter().find(|z| z.name == name))
    }

    async fn create_private_zone(&self, name: &str, network_id: &str) -> Result<Zone> {
        let url = format!("{}/v1/zones", self.base_url);
        debug!(url = %url, zone = %name, "DNS create zone");

        let response = self
            .client
            .post(&url)
            .json(&CreateZoneRequest {
                name,
                network_id,
                private: true,
            })
            .send()
            .await?;
        Self::decode(&url, response).await
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
        next_token: Option<String>,
    ) -> Result<Page<RecordSet>> {
        let mut url = format!(
            "{}/v1/zones/{}/records?name={}&type={}",
            self.base_url, zone_id, name, record_type
        );
        if let Some(token) = &next_token {
            url = format!("{url}&page_token={token}");
        }
        debug!(url = %url, "DNS GET");

        let response = self.client.get(&url).send().await?;
        let page: RecordPage = Self::decode(&url, response).await?;
        Ok(Page {
            items: page.records,
            next_token: page.next_token,
        })
    }

    async fn apply_changes(&self, zone_id: &str, changes: Vec<Change>) -> Result<()> {
        let url = format!("{}/v1/zones/{}/records:batch", self.base_url, zone_id);
        debug!(url = %url, changes = changes.len(), "DNS apply batch");

        let response = self
            .client
            .post(&url)
            .json(&ChangeBatchRequest { changes })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(url = %url, status = %status, body = %body, "DNS batch failed");
            anyhow::bail!("dns batch apply failed: {} - {}", status, body);
        }
        Ok(())
    }
}
