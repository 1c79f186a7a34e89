//! Directory synchronizer: keep the manager record set equal to the manager
//! role's instance IPs.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use fleet_reconcile::{set_delta, SetDelta};
use tracing::{debug, info};

use super::{Change, ChangeAction, DnsProvider, RecordSet, Zone};

/// Synchronizes the managed zone with a desired address set.
///
/// The zone is looked up (and created, as a private zone on the configured
/// network) on first use only; afterwards the id is cached.
pub struct DirectorySync {
    dns: Arc<dyn DnsProvider>,
    zone_name: String,
    network_id: String,
    fqdn: String,
    zone: Option<Zone>,
}

impl DirectorySync {
    pub fn new(
        dns: Arc<dyn DnsProvider>,
        zone_name: impl Into<String>,
        network_id: impl Into<String>,
        fqdn: impl Into<String>,
    ) -> Self {
        Self {
            dns,
            zone_name: zone_name.into(),
            network_id: network_id.into(),
            fqdn: fqdn.into(),
            zone: None,
        }
    }

    /// Converge the manager record set to `desired_ips`.
    ///
    /// Returns the applied delta, empty when the directory already matched.
    pub async fn sync(&mut self, desired_ips: &BTreeSet<String>) -> Result<SetDelta<String>> {
        let zone_id = self.ensure_zone().await?;

        // Actual state: every multi-value A record under the manager name.
        let mut records = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .dns
                .list_records(&zone_id, &self.fqdn, "A", token)
                .await?;
            records.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let actual_ips: BTreeSet<String> = records.iter().map(|r| r.value.clone()).collect();
        let delta = set_delta(&actual_ips, desired_ips);
        if delta.is_empty() {
            debug!(fqdn = %self.fqdn, ips = actual_ips.len(), "Directory already converged");
            return Ok(delta);
        }

        let mut changes = Vec::with_capacity(delta.to_delete.len() + delta.to_create.len());
        for ip in &delta.to_delete {
            // Deletes must name the exact record, set identifier included.
            if let Some(record) = records.iter().find(|r| &r.value == ip) {
                changes.push(Change {
                    action: ChangeAction::Delete,
                    record: record.clone(),
                });
            }
        }
        for ip in &delta.to_create {
            changes.push(Change {
                action: ChangeAction::Create,
                record: RecordSet {
                    name: self.fqdn.clone(),
                    record_type: "A".to_string(),
                    value: ip.clone(),
                    set_identifier: uuid::Uuid::new_v4().to_string(),
                    ttl: 0,
                },
            });
        }

        self.dns.apply_changes(&zone_id, changes).await?;

        info!(
            fqdn = %self.fqdn,
            created = delta.to_create.len(),
            deleted = delta.to_delete.len(),
            "Applied directory changes"
        );
        Ok(delta)
    }

    async fn ensure_zone(&mut self) -> Result<String> {
        if let Some(zone) = &self.zone {
            return Ok(zone.id.clone());
        }

        let zone = match self.dns.find_zone(&self.zone_name).await? {
            Some(zone) => zone,
            None => {
                info!(zone = %self.zone_name, "Managed zone absent, creating private zone");
                self.dns
                    .create_private_zone(&self.zone_name, &self.network_id)
                    .await?
            }
        };
        let id = zone.id.clone();
        self.zone = Some(zone);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::MockDnsProvider;
    use super::*;

    fn ips(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sync_under_test(dns: Arc<MockDnsProvider>) -> DirectorySync {
        DirectorySync::new(dns, "fleet.local", "net-1", "manager.fleet.local")
    }

    #[tokio::test]
    async fn test_zone_bootstrap_is_one_time() {
        let dns = Arc::new(MockDnsProvider::new());
        let mut sync = sync_under_test(Arc::clone(&dns));

        sync.sync(&ips(&["10.0.0.1"])).await.unwrap();
        sync.sync(&ips(&["10.0.0.1"])).await.unwrap();

        assert_eq!(dns.zones().len(), 1);
    }

    #[tokio::test]
    async fn test_converged_directory_applies_nothing() {
        let dns = Arc::new(MockDnsProvider::new());
        let mut sync = sync_under_test(Arc::clone(&dns));

        sync.sync(&ips(&["10.0.0.1"])).await.unwrap();
        let delta = sync.sync(&ips(&["10.0.0.1"])).await.unwrap();

        assert!(delta.is_empty());
        assert_eq!(dns.applied_batches().len(), 1);
    }

    #[tokio::test]
    async fn test_ip_move_is_one_minimal_batch() {
        let dns = Arc::new(MockDnsProvider::new());
        let mut sync = sync_under_test(Arc::clone(&dns));

        sync.sync(&ips(&["10.0.0.1"])).await.unwrap();
        sync.sync(&ips(&["10.0.0.2"])).await.unwrap();

        let batches = dns.applied_batches();
        assert_eq!(batches.len(), 2);

        let batch = &batches[1];
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().any(|c| c.action == ChangeAction::Delete
            && c.record.value == "10.0.0.1"));
        assert!(batch.iter().any(|c| c.action == ChangeAction::Create
            && c.record.value == "10.0.0.2"
            && c.record.ttl == 0));

        let zone_id = dns.zones()[0].id.clone();
        let remaining: BTreeSet<String> = dns
            .records(&zone_id)
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(remaining, ips(&["10.0.0.2"]));
    }

    #[tokio::test]
    async fn test_records_scoped_to_manager_name() {
        let dns = Arc::new(MockDnsProvider::new());
        let mut sync = sync_under_test(Arc::clone(&dns));

        // Seed a record under a different name in the same zone.
        sync.sync(&ips(&["10.0.0.1"])).await.unwrap();
        let zone_id = dns.zones()[0].id.clone();
        dns.apply_changes(
            &zone_id,
            vec![Change {
                action: ChangeAction::Create,
                record: RecordSet {
                    name: "other.fleet.local".to_string(),
                    record_type: "A".to_string(),
                    value: "10.9.9.9".to_string(),
                    set_identifier: "x".to_string(),
                    ttl: 0,
                },
            }],
        )
        .await
        .unwrap();

        // Converged for the manager name; the foreign record is untouched.
        let delta = sync.sync(&ips(&["10.0.0.1"])).await.unwrap();
        assert!(delta.is_empty());
        assert_eq!(dns.records(&zone_id).len(), 2);
    }
}
