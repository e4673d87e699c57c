//! OBS Actuator (C8).
//!
//! Debounces health transitions into OBS scene switches with two
//! cancellable timers, so a brief reversal inside the debounce window
//! produces no actuation (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use fieldmux_common::models::HealthState;

/// Connection to an OBS Studio instance. The production client dials
/// obs-websocket; a connectivity failure there is non-fatal (§4.8) so
/// this trait's default implementation simply never connects and the
/// actuator continues tracking logical state without emitting calls.
pub trait ObsClient: Send + Sync {
    fn switch_scene(&self, scene: &str);
    fn set_source_visible(&self, scene: &str, source: &str, visible: bool);
    fn is_connected(&self) -> bool;
}

/// No-op client used when no real OBS connection is configured or the
/// connection attempt failed.
pub struct DisconnectedObsClient;

impl ObsClient for DisconnectedObsClient {
    fn switch_scene(&self, scene: &str) {
        tracing::debug!(scene, "obs switch_scene called on disconnected client, ignoring");
    }

    fn set_source_visible(&self, scene: &str, source: &str, visible: bool) {
        tracing::debug!(scene, source, visible, "obs set_source_visible called on disconnected client, ignoring");
    }

    fn is_connected(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct ObsConfig {
    pub scene_live: String,
    pub scene_brb: String,
    pub fallback_delay: Duration,
    pub recovery_delay: Duration,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            scene_live: "LIVE".to_string(),
            scene_brb: "BRB".to_string(),
            fallback_delay: Duration::from_secs(3),
            recovery_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObsStatus {
    pub connected: bool,
    pub in_fallback: bool,
}

pub struct ObsActuator {
    config: ObsConfig,
    client: Arc<dyn ObsClient>,
    in_fallback: Arc<AtomicBool>,
    fallback_timer: Mutex<Option<JoinHandle<()>>>,
    recovery_timer: Mutex<Option<JoinHandle<()>>>,
}

impl ObsActuator {
    pub fn new(config: ObsConfig, client: Arc<dyn ObsClient>) -> Self {
        Self {
            config,
            client,
            in_fallback: Arc::new(AtomicBool::new(false)),
            fallback_timer: Mutex::new(None),
            recovery_timer: Mutex::new(None),
        }
    }

    pub fn from_config(config: ObsConfig) -> Self {
        Self::new(config, Arc::new(DisconnectedObsClient))
    }

    pub fn is_in_fallback(&self) -> bool {
        self.in_fallback.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ObsStatus {
        ObsStatus {
            connected: self.client.is_connected(),
            in_fallback: self.is_in_fallback(),
        }
    }

    /// React to a health-state transition reported by the health monitor.
    pub async fn on_transition(&self, streamer_id: &str, new_state: HealthState) {
        match new_state {
            HealthState::Critical | HealthState::Down => self.enter_fallback_path(streamer_id).await,
            HealthState::Healthy | HealthState::Degraded => self.enter_recovery_path(streamer_id).await,
        }
    }

    async fn enter_fallback_path(&self, streamer_id: &str) {
        let mut recovery = self.recovery_timer.lock().await;
        if let Some(handle) = recovery.take() {
            handle.abort();
        }
        drop(recovery);

        let mut fallback = self.fallback_timer.lock().await;
        if self.is_in_fallback() || fallback.is_some() {
            return;
        }

        let client = self.client.clone();
        let in_fallback = self.in_fallback.clone();
        let scene = self.config.scene_brb.clone();
        let delay = self.config.fallback_delay;
        let streamer_id = streamer_id.to_string();
        *fallback = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.switch_scene(&scene);
            in_fallback.store(true, Ordering::SeqCst);
            tracing::warn!(streamer_id, scene, "obs fallback engaged");
        }));
    }

    async fn enter_recovery_path(&self, streamer_id: &str) {
        let mut fallback = self.fallback_timer.lock().await;
        if let Some(handle) = fallback.take() {
            handle.abort();
        }
        drop(fallback);

        let mut recovery = self.recovery_timer.lock().await;
        if !self.is_in_fallback() || recovery.is_some() {
            return;
        }

        let client = self.client.clone();
        let in_fallback = self.in_fallback.clone();
        let scene = self.config.scene_live.clone();
        let delay = self.config.recovery_delay;
        let streamer_id = streamer_id.to_string();
        *recovery = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.switch_scene(&scene);
            in_fallback.store(false, Ordering::SeqCst);
            tracing::info!(streamer_id, scene, "obs recovery complete");
        }));
    }

    pub fn set_source_visible(&self, scene: &str, source: &str, visible: bool) {
        self.client.set_source_visible(scene, source, visible);
    }
}
