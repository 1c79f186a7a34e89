//! DNS provider adapter and the directory synchronizer.

mod http;
mod mock;
mod sync;

pub use http::HttpDnsProvider;
pub use mock::MockDnsProvider;
pub use sync::DirectorySync;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::Page;

/// A hosted zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// One multi-value record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub record_type: String,
    pub value: String,
    /// Distinguishes multi-value records sharing a name.
    pub set_identifier: String,
    pub ttl: u32,
}

/// Batch change action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Delete,
}

/// One entry of an atomic record change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    pub record: RecordSet,
}

/// Access to the DNS provider.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up a zone by name.
    async fn find_zone(&self, name: &str) -> Result<Option<Zone>>;

    /// Create a private zone attached to a network.
    async fn create_private_zone(&self, name: &str, network_id: &str) -> Result<Zone>;

    /// List records matching a name and type, one page at a time.
    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
        next_token: Option<String>,
    ) -> Result<Page<RecordSet>>;

    /// Apply a batch of record changes atomically.
    async fn apply_changes(&self, zone_id: &str, changes: Vec<Change>) -> Result<()>;
}
