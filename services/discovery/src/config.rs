//! Configuration for the discovery service.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::provider::LogDriver;
use crate::topology::ShadowMapping;

/// Discovery service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP command surface listen address.
    pub listen_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Orchestrator API base URL.
    pub provider_url: String,

    /// DNS provider API base URL.
    pub dns_url: String,

    /// Provider cluster identifier all topology queries are scoped to.
    pub cluster: String,

    /// Managed DNS suffix; also the managed zone name.
    pub dns_suffix: String,

    /// Network the managed private zone is attached to on creation.
    pub network_id: String,

    /// Numeric id of the manager-role service whose IPs the zone tracks.
    pub manager_service_id: i64,

    /// Host label of the manager record inside the managed zone.
    pub manager_dns_name: String,

    /// Fixed period between sync ticks.
    pub tick_period: Duration,

    /// Delay before the first tick.
    pub initial_delay: Duration,

    /// Memory reservation (MiB) applied to deployed application containers.
    pub memory_reservation: i64,

    /// Optional logging driver passed to deployed container definitions.
    pub log_driver: Option<LogDriver>,

    /// Static real-service-id → shadow-service mapping.
    pub shadow_services: ShadowMapping,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("FLEET_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = std::env::var("FLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let provider_url = std::env::var("FLEET_PROVIDER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9400".to_string());

        let dns_url =
            std::env::var("FLEET_DNS_URL").unwrap_or_else(|_| "http://127.0.0.1:9450".to_string());

        let cluster = std::env::var("FLEET_CLUSTER").unwrap_or_else(|_| "default".to_string());

        let dns_suffix =
            std::env::var("FLEET_DNS_SUFFIX").unwrap_or_else(|_| "fleet.local".to_string());

        let network_id = std::env::var("FLEET_NETWORK_ID").unwrap_or_default();

        let manager_service_id = std::env::var("FLEET_MANAGER_SERVICE_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let manager_dns_name =
            std::env::var("FLEET_MANAGER_DNS_NAME").unwrap_or_else(|_| "manager".to_string());

        let tick_period = std::env::var("FLEET_TICK_PERIOD_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let initial_delay = std::env::var("FLEET_TICK_INITIAL_DELAY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let memory_reservation = std::env::var("FLEET_MEMORY_RESERVATION_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(512);

        let log_driver = match std::env::var("FLEET_LOG_DRIVER") {
            Ok(driver) if !driver.is_empty() => {
                let options: BTreeMap<String, String> = match std::env::var("FLEET_LOG_OPTIONS") {
                    Ok(raw) => serde_json::from_str(&raw)
                        .context("FLEET_LOG_OPTIONS must be a JSON string map")?,
                    Err(_) => BTreeMap::new(),
                };
                Some(LogDriver { driver, options })
            }
            _ => None,
        };

        let shadow_services = match std::env::var("FLEET_SHADOW_SERVICES") {
            Ok(raw) => serde_json::from_str(&raw)
                .context("FLEET_SHADOW_SERVICES must be a JSON map of id -> {id, name}")?,
            Err(_) => ShadowMapping::default(),
        };

        Ok(Self {
            listen_addr,
            log_level,
            provider_url,
            dns_url,
            cluster,
            dns_suffix,
            network_id,
            manager_service_id,
            manager_dns_name,
            tick_period,
            initial_delay,
            memory_reservation,
            log_driver,
            shadow_services,
        })
    }

    /// Fully-qualified name of the manager record in the managed zone.
    pub fn manager_fqdn(&self) -> String {
        format!("{}.{}", self.manager_dns_name, self.dns_suffix)
    }
}
