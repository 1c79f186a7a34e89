//! In-memory DNS provider for tests and development.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::provider::Page;

use super::{Change, ChangeAction, DnsProvider, RecordSet, Zone};

/// In-memory DNS provider that applies batches to real state and records
/// them for assertions.
pub struct MockDnsProvider {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    zones: Vec<Zone>,
    /// zone id → records.
    records: BTreeMap<String, Vec<RecordSet>>,
    /// All applied batches, in order.
    batches: Vec<Vec<Change>>,
    zone_seq: u64,
    fail_apply: bool,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Make batch applies fail.
    pub fn fail_apply(&self, fail: bool) {
        self.state.lock().unwrap().fail_apply = fail;
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.state.lock().unwrap().zones.clone()
    }

    pub fn records(&self, zone_id: &str) -> Vec<RecordSet> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn applied_batches(&self) -> Vec<Vec<Change>> {
        self.state.lock().unwrap().batches.clone()
    }
}

impl Default for MockDnsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_zone(&self, name: &str) -> Result<Option<Zone>> {
        let state = self.state.lock().unwrap();
        Ok(state.zones.iter().find(|z| z.name == name).cloned())
    }

    async fn create_private_zone(&self, name: &str, _network_id: &str) -> Result<Zone> {
        let mut state = self.state.lock().unwrap();
        state.zone_seq += 1;
        let zone = Zone {
            id: format!("zone-{}", state.zone_seq),
            name: name.to_string(),
        };
        state.zones.push(zone.clone());
        Ok(zone)
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
        _next_token: Option<String>,
    ) -> Result<Page<RecordSet>> {
        let state = self.state.lock().unwrap();
        let items = state
            .records
            .get(zone_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.name == name && r.record_type == record_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Page {
            items,
            next_token: None,
        })
    }

    async fn apply_changes(&self, zone_id: &str, changes: Vec<Change>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_apply {
            anyhow::bail!("mock dns configured to fail batch applies");
        }

        let records = state.records.entry(zone_id.to_string()).or_default();
        for change in &changes {
            match change.action {
                ChangeAction::Create => records.push(change.record.clone()),
                ChangeAction::Delete => records.retain(|r| {
                    !(r.name == change.record.name
                        && r.record_type == change.record.record_type
                        && r.value == change.record.value)
                }),
            }
        }

        state.batches.push(changes);
        Ok(())
    }
}
