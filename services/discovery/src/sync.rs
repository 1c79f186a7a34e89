//! Sync worker: the single writer of the service cache.
//!
//! One actor owns the cache and processes commands one at a time from its
//! mailbox, so reads, ticks, and mutations never interleave. Periodic ticks
//! come from [`spawn_ticker`], which waits for each tick to finish before
//! arming the next one; ticks never pile up behind a slow provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fleet_events::{CloudService, DeployRequest, DiscoveryEvent, EventPublisher, ImageRef};
use fleet_reconcile::diff_keyed;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dns::DirectorySync;
use crate::error::DiscoveryError;
use crate::labels;
use crate::provider::{
    CloudProvider, ContainerSpec, PortMapping, ServiceSpec, TaskDefinitionSpec,
};
use crate::topology::{self, ProviderHandle, StoredService};

/// Commands served by the sync worker.
#[derive(Debug)]
pub enum Command {
    /// Run one reconciliation pass. `done` fires after the pass completes,
    /// successful or not.
    Tick { done: Option<oneshot::Sender<()>> },

    ListAll {
        reply: oneshot::Sender<Vec<CloudService>>,
    },

    ListByIds {
        ids: Vec<i64>,
        reply: oneshot::Sender<Vec<CloudService>>,
    },

    Deploy {
        request: DeployRequest,
        reply: oneshot::Sender<Result<CloudService, DiscoveryError>>,
    },

    Remove {
        id: i64,
        reply: oneshot::Sender<Result<(), DiscoveryError>>,
    },
}

/// Cloneable handle for sending commands to the sync worker.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
}

impl SyncHandle {
    pub async fn list_all(&self) -> Result<Vec<CloudService>, DiscoveryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ListAll { reply })
            .await
            .map_err(|_| DiscoveryError::WorkerUnavailable)?;
        rx.await.map_err(|_| DiscoveryError::WorkerUnavailable)
    }

    pub async fn list_by_ids(&self, ids: Vec<i64>) -> Result<Vec<CloudService>, DiscoveryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ListByIds { ids, reply })
            .await
            .map_err(|_| DiscoveryError::WorkerUnavailable)?;
        rx.await.map_err(|_| DiscoveryError::WorkerUnavailable)
    }

    pub async fn deploy(&self, request: DeployRequest) -> Result<CloudService, DiscoveryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Deploy { request, reply })
            .await
            .map_err(|_| DiscoveryError::WorkerUnavailable)?;
        rx.await.map_err(|_| DiscoveryError::WorkerUnavailable)?
    }

    pub async fn remove(&self, id: i64) -> Result<(), DiscoveryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Remove { id, reply })
            .await
            .map_err(|_| DiscoveryError::WorkerUnavailable)?;
        rx.await.map_err(|_| DiscoveryError::WorkerUnavailable)?
    }

    /// Request a tick and wait until it has run.
    pub async fn trigger_tick(&self) -> Result<(), DiscoveryError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Command::Tick { done: Some(done) })
            .await
            .map_err(|_| DiscoveryError::WorkerUnavailable)?;
        rx.await.map_err(|_| DiscoveryError::WorkerUnavailable)
    }
}

/// The sync worker. Owns the service cache exclusively.
pub struct SyncActor {
    config: Config,
    provider: Arc<dyn CloudProvider>,
    directory: DirectorySync,
    publisher: Arc<dyn EventPublisher>,
    cache: BTreeMap<i64, StoredService>,
    rx: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
}

impl SyncActor {
    /// Spawn the worker and return its handle plus join handle.
    pub fn spawn(
        config: Config,
        provider: Arc<dyn CloudProvider>,
        directory: DirectorySync,
        publisher: Arc<dyn EventPublisher>,
        shutdown: watch::Receiver<bool>,
    ) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let actor = Self {
            config,
            provider,
            directory,
            publisher,
            cache: BTreeMap::new(),
            rx,
            shutdown,
        };
        let join = tokio::spawn(actor.run());
        (SyncHandle { tx }, join)
    }

    async fn run(mut self) {
        info!("Sync worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("Sync worker received shutdown signal");
                        break;
                    }
                }

                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => {
                            debug!("Sync worker mailbox closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("Sync worker stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Tick { done } => {
                if let Err(e) = self.run_tick().await {
                    error!(error = %e, "Sync tick failed");
                }
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }

            Command::ListAll { reply } => {
                let services = self.cache.values().map(|s| s.service.clone()).collect();
                let _ = reply.send(services);
            }

            Command::ListByIds { ids, reply } => {
                let services = ids
                    .iter()
                    .filter_map(|id| self.cache.get(id))
                    .map(|s| s.service.clone())
                    .collect();
                let _ = reply.send(services);
            }

            Command::Deploy { request, reply } => {
                let result = self.deploy(request).await;
                let _ = reply.send(result);
                self.forced_resync().await;
            }

            Command::Remove { id, reply } => {
                let result = self.remove(id).await;
                let _ = reply.send(result);
                self.forced_resync().await;
            }
        }
    }

    /// Resync immediately after a mutation so the cache reflects it without
    /// waiting out the tick period.
    async fn forced_resync(&mut self) {
        if let Err(e) = self.run_tick().await {
            warn!(error = %e, "Post-mutation resync failed");
        }
    }

    /// One full reconciliation pass: fetch, build, diff, publish, sync DNS.
    ///
    /// Any error aborts the pass and leaves the cache untouched. A
    /// structurally empty topology is not an error and replaces the cache
    /// with an empty set.
    async fn run_tick(&mut self) -> Result<(), DiscoveryError> {
        let raw = topology::fetch(self.provider.as_ref())
            .await
            .map_err(DiscoveryError::Provider)?;

        let mut next = if raw.is_empty() {
            if !self.cache.is_empty() {
                warn!(
                    cached = self.cache.len(),
                    "Topology is structurally empty, clearing service cache"
                );
            }
            Vec::new()
        } else {
            topology::build_services(topology::classify(raw))?
        };
        topology::materialize_shadows(&mut next, &self.config.shadow_services);

        let next: BTreeMap<i64, StoredService> =
            next.into_iter().map(|s| (s.service.id, s)).collect();

        // Diff on the normalized services only; provider handles are not part
        // of the published identity.
        let prev_view: BTreeMap<i64, &CloudService> =
            self.cache.iter().map(|(id, s)| (*id, &s.service)).collect();
        let next_view: BTreeMap<i64, &CloudService> =
            next.iter().map(|(id, s)| (*id, &s.service)).collect();
        let diff = diff_keyed(&prev_view, &next_view);

        let removed: Vec<CloudService> = diff
            .removed
            .iter()
            .filter_map(|id| self.cache.get(id))
            .map(|s| s.service.clone())
            .collect();
        let changed: Vec<CloudService> = diff
            .added
            .iter()
            .chain(diff.changed.iter())
            .filter_map(|id| next.get(id))
            .map(|s| s.service.clone())
            .collect();

        if !diff.is_empty() {
            info!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                changed = diff.changed.len(),
                total = next.len(),
                "Service topology changed"
            );
        }

        self.cache = next;

        // Fire-and-forget, but strictly ordered: removals land before the
        // matching changes so consumers never resurrect a dead service.
        if !removed.is_empty() || !changed.is_empty() {
            let publisher = Arc::clone(&self.publisher);
            tokio::spawn(async move {
                if !removed.is_empty() {
                    if let Err(e) = publisher
                        .publish(DiscoveryEvent::ServicesRemoved(removed))
                        .await
                    {
                        warn!(error = %e, "Failed to publish removal event");
                    }
                }
                if !changed.is_empty() {
                    if let Err(e) = publisher
                        .publish(DiscoveryEvent::ServicesChanged(changed))
                        .await
                    {
                        warn!(error = %e, "Failed to publish change event");
                    }
                }
            });
        }

        let manager_ips: BTreeSet<String> = self
            .cache
            .get(&self.config.manager_service_id)
            .map(|s| {
                s.service
                    .instances
                    .iter()
                    .map(|i| i.app.host.clone())
                    .collect()
            })
            .unwrap_or_default();

        self.directory
            .sync(&manager_ips)
            .await
            .map_err(DiscoveryError::Dns)?;

        Ok(())
    }

    async fn deploy(&mut self, request: DeployRequest) -> Result<CloudService, DiscoveryError> {
        info!(
            service_id = request.service_id,
            name = %request.name,
            image = %request.image,
            "Deploying service"
        );

        let mut container_labels = request.labels.clone();
        container_labels.insert(labels::MANAGED.to_string(), "true".to_string());
        container_labels.insert(
            labels::DEPLOYMENT_TYPE.to_string(),
            labels::TYPE_APP.to_string(),
        );

        let definition_spec = TaskDefinitionSpec {
            family: request.name.clone(),
            containers: vec![ContainerSpec {
                name: request.name.clone(),
                image: request.image.clone(),
                labels: container_labels,
                port_mappings: vec![PortMapping {
                    container_port: request.port,
                    host_port: None,
                }],
                environment: request.environment.clone(),
                memory_reservation: Some(self.config.memory_reservation),
                log_driver: self.config.log_driver.clone(),
            }],
        };

        let definition = self
            .provider
            .register_task_definition(&definition_spec)
            .await
            .map_err(DiscoveryError::Provider)?;

        let mut tags = BTreeMap::new();
        tags.insert(
            labels::SERVICE_ID.to_string(),
            request.service_id.to_string(),
        );
        tags.insert(labels::SERVICE_NAME.to_string(), request.name.clone());

        let service_spec = ServiceSpec {
            name: request.name.clone(),
            task_definition: definition.id.clone(),
            desired_count: 1,
            tags,
            placement_constraint: request.placement_constraint.clone(),
        };

        let created = match self.provider.create_service(&service_spec).await {
            Ok(created) => created,
            Err(e) => {
                // Best effort: do not leave the just-registered definition
                // orphaned.
                if let Err(cleanup) = self
                    .provider
                    .deregister_task_definition(&definition.id)
                    .await
                {
                    warn!(
                        task_definition = %definition.id,
                        error = %cleanup,
                        "Failed to clean up task definition after create failure"
                    );
                }
                return Err(DiscoveryError::Provider(e));
            }
        };

        info!(
            service_id = request.service_id,
            provider_id = %created.provider_id,
            task_definition = %definition.id,
            "Service deployed"
        );

        // Instances appear on the next tick once tasks are placed.
        Ok(CloudService {
            id: request.service_id,
            name: request.name,
            status: created.status,
            provider_id: created.provider_id,
            image: ImageRef::parse(&request.image),
            instances: Vec::new(),
        })
    }

    async fn remove(&mut self, id: i64) -> Result<(), DiscoveryError> {
        // Shadows alias the real service's provider handle; removing one
        // would tear down the real service.
        if self.config.shadow_services.is_shadow_id(id) {
            debug!(service_id = id, "Remove for shadow service, nothing to do");
            return Ok(());
        }
        let Some(stored) = self.cache.get(&id) else {
            debug!(service_id = id, "Remove for unknown service, nothing to do");
            return Ok(());
        };
        let ProviderHandle {
            provider_id,
            task_definition,
        } = stored.handle.clone();

        info!(service_id = id, provider_id = %provider_id, "Removing service");

        self.provider
            .scale_service(&provider_id, 0)
            .await
            .map_err(DiscoveryError::Provider)?;
        self.provider
            .delete_service(&provider_id)
            .await
            .map_err(DiscoveryError::Provider)?;
        self.provider
            .deregister_task_definition(&task_definition)
            .await
            .map_err(DiscoveryError::Provider)?;

        Ok(())
    }
}

/// Drive the worker with periodic ticks.
///
/// Each tick is acknowledged before the next period starts, so a slow pass
/// delays the following one instead of queueing behind it.
pub fn spawn_ticker(
    handle: SyncHandle,
    config: &Config,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let initial_delay = config.initial_delay;
    let period = config.tick_period;

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {}
            _ = shutdown.changed() => return,
        }

        loop {
            if let Err(e) = handle.trigger_tick().await {
                warn!(error = %e, "Ticker could not reach sync worker, stopping");
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Ticker received shutdown signal");
                        return;
                    }
                }
            }
        }
    })
}
