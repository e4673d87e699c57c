//! Shared application state: the Telemetry Hub (C9).
//!
//! Owns the live-streamer snapshots, the one-per-streamer field
//! connections, the dashboard broadcast channel, and every collaborator
//! (port allocator, pipelines, health monitors, OBS actuator, store,
//! geocoder) that a connection handler needs.

use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};

use fieldmux_common::models::LiveSnapshot;
use fieldmux_common::protocol::DashboardEvent;

use crate::config::Config;
use crate::core::health::{HealthMonitor, HealthThresholds};
use crate::core::obs::{ObsActuator, ObsConfig};
use crate::core::pipeline::{PipelineConfig, StreamerPipeline};
use crate::core::port_allocator::{PortAllocator, PortAllocatorConfig};
use crate::geocode::GeoResolver;
use crate::store::SqliteStreamerStore;

/// A connected field agent's outbound channel, used to push the socket a
/// close frame from elsewhere in the hub if needed.
pub struct FieldConnection {
    pub close_tx: tokio::sync::mpsc::Sender<(u16, &'static str)>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    pub config: Config,
    pub store: SqliteStreamerStore,
    pub geocoder: GeoResolver,
    pub ports: PortAllocator,
    pub obs: ObsActuator,
    pub live_streamers: DashMap<String, LiveSnapshot>,
    pub field_connections: DashMap<String, FieldConnection>,
    pub pipelines: DashMap<String, Mutex<StreamerPipeline>>,
    pub health_monitors: DashMap<String, Mutex<HealthMonitor>>,
    pub dashboard_tx: broadcast::Sender<DashboardEvent>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let (dashboard_tx, _) = broadcast::channel(256);
        let ports = PortAllocator::new(PortAllocatorConfig {
            base_port: config.srt.base_port,
            ports_per_streamer: config.srt.max_links as u16,
        });
        let obs = ObsActuator::from_config(ObsConfig {
            scene_live: config.obs.scene_live.clone(),
            scene_brb: config.obs.scene_brb.clone(),
            fallback_delay: std::time::Duration::from_secs_f64(config.obs.fallback_delay_s),
            recovery_delay: std::time::Duration::from_secs_f64(config.obs.recovery_delay_s),
        });

        Self {
            inner: Arc::new(Inner {
                store: SqliteStreamerStore::new(pool),
                geocoder: GeoResolver::new(),
                ports,
                obs,
                live_streamers: DashMap::new(),
                field_connections: DashMap::new(),
                pipelines: DashMap::new(),
                health_monitors: DashMap::new(),
                dashboard_tx,
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &SqliteStreamerStore {
        &self.inner.store
    }

    pub fn geocoder(&self) -> &GeoResolver {
        &self.inner.geocoder
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.inner.ports
    }

    pub fn obs(&self) -> &ObsActuator {
        &self.inner.obs
    }

    pub fn live_streamers(&self) -> &DashMap<String, LiveSnapshot> {
        &self.inner.live_streamers
    }

    pub fn field_connections(&self) -> &DashMap<String, FieldConnection> {
        &self.inner.field_connections
    }

    pub fn pipelines(&self) -> &DashMap<String, Mutex<StreamerPipeline>> {
        &self.inner.pipelines
    }

    pub fn health_monitors(&self) -> &DashMap<String, Mutex<HealthMonitor>> {
        &self.inner.health_monitors
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            degraded: self.inner.config.health.threshold_degraded,
            critical: self.inner.config.health.threshold_critical,
            down: self.inner.config.health.threshold_down,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_links: self.inner.config.srt.max_links,
            latency_ms: self.inner.config.srt.latency_ms,
            passphrase: self.inner.config.srt.passphrase.clone(),
        }
    }

    /// Broadcast an event to all subscribed dashboard sockets. Best-effort:
    /// a send failure (no subscribers) is not an error (§4.9).
    pub fn broadcast_dashboard(&self, event: DashboardEvent) {
        let _ = self.inner.dashboard_tx.send(event);
    }

    pub fn subscribe_dashboard(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.dashboard_tx.subscribe()
    }
}
