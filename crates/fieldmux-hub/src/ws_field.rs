//! WebSocket handler for field agent connections (§4.9 Telemetry Hub).
//!
//! Endpoint: `GET /ws/field/{streamer_id}?key={write_credential}`
//!
//! The handshake is ordered and every rejection still completes the
//! upgrade before closing, so the client sees a clean WebSocket close
//! frame rather than a bare HTTP error:
//! 1. no credential presented -> accept, close 4001
//! 2. credential doesn't resolve to a record -> accept, close 4001
//! 3. record id != path streamer_id -> accept, close 4001
//! 4. record not approved -> accept, close 4003
//! 5. otherwise accept and run the connection

use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::stream::StreamExt;
use futures::SinkExt;
use tokio::sync::mpsc;

use fieldmux_common::models::{HealthState, HealthStatus, LiveSnapshot, StreamerRecord};
use fieldmux_common::protocol::{
    DashboardEvent, FieldEnvelope, MessageType, NetworkPayload, StreamerOfflineData,
    StreamerOnlineData, StreamerUpdateData,
};

use crate::core::health::{HealthInputs, HealthMonitor};
use crate::core::pipeline::StreamerPipeline;
use crate::state::{AppState, FieldConnection};
use crate::store::StreamerStore;

const CLOSE_KEY_REQUIRED: (u16, &str) = (4001, "key required");
const CLOSE_UNAPPROVED: (u16, &str) = (4003, "streamer not approved");

pub async fn handler(
    State(state): State<AppState>,
    Path(streamer_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let credential = params.get("key").cloned();
    ws.on_upgrade(move |socket| handle_socket(state, streamer_id, credential, socket))
}

async fn close_with(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(
    state: AppState,
    path_streamer_id: String,
    credential: Option<String>,
    mut socket: WebSocket,
) {
    let Some(credential) = credential else {
        close_with(&mut socket, CLOSE_KEY_REQUIRED.0, CLOSE_KEY_REQUIRED.1).await;
        return;
    };

    let record = match state.store().get_by_write_credential(&credential).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            close_with(&mut socket, CLOSE_KEY_REQUIRED.0, CLOSE_KEY_REQUIRED.1).await;
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "store lookup failed during field handshake");
            close_with(&mut socket, CLOSE_KEY_REQUIRED.0, CLOSE_KEY_REQUIRED.1).await;
            return;
        }
    };

    if record.id != path_streamer_id {
        close_with(&mut socket, CLOSE_KEY_REQUIRED.0, CLOSE_KEY_REQUIRED.1).await;
        return;
    }

    if !record.approved {
        close_with(&mut socket, CLOSE_UNAPPROVED.0, CLOSE_UNAPPROVED.1).await;
        return;
    }

    connect_field(state, socket, record).await;
}

async fn connect_field(state: AppState, socket: WebSocket, record: StreamerRecord) {
    let streamer_id = record.id.clone();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let snapshot = LiveSnapshot::from_record(&record);
    state.live_streamers().insert(streamer_id.clone(), snapshot.clone());

    let (close_tx, mut close_rx) = mpsc::channel::<(u16, &'static str)>(1);
    state
        .field_connections()
        .insert(streamer_id.clone(), FieldConnection { close_tx });

    state.broadcast_dashboard(DashboardEvent::StreamerOnline(StreamerOnlineData {
        streamer_id: streamer_id.clone(),
        streamer: snapshot,
    }));

    if !record.destinations.is_empty() && record.destinations.iter().any(|d| d.enabled) {
        let pipeline = StreamerPipeline::start(
            &streamer_id,
            &record.destinations,
            &state.pipeline_config(),
            state.ports(),
        );
        state
            .pipelines()
            .insert(streamer_id.clone(), tokio::sync::Mutex::new(pipeline));
        state
            .health_monitors()
            .insert(streamer_id.clone(), tokio::sync::Mutex::new(HealthMonitor::new(state.health_thresholds())));
        spawn_health_loop(state.clone(), streamer_id.clone());
    }

    tracing::info!(streamer_id, "field agent connected");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_field_message(&state, &streamer_id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            signal = close_rx.recv() => {
                if let Some((code, reason)) = signal {
                    let _ = ws_tx.send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    }))).await;
                }
                break;
            }
        }
    }

    disconnect_field(&state, &streamer_id).await;
}

async fn handle_field_message(state: &AppState, streamer_id: &str, raw: &str) {
    let envelope: FieldEnvelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(streamer_id, error = %e, "discarding unparsable field message");
            return;
        }
    };

    let mut mutated = true;
    let Some(mut snapshot) = state.live_streamers().get_mut(streamer_id).map(|r| r.clone()) else {
        return;
    };

    match envelope.msg_type {
        MessageType::Gps => match envelope.parse_data() {
            Ok(gps) => {
                snapshot.gps = gps;
                schedule_geocode(state.clone(), streamer_id.to_string(), snapshot.gps.lat, snapshot.gps.lng);
            }
            Err(e) => {
                tracing::warn!(streamer_id, error = %e, "invalid gps payload");
                mutated = false;
            }
        },
        MessageType::Hardware => match envelope.parse_data() {
            Ok(hardware) => snapshot.hardware = hardware,
            Err(e) => {
                tracing::warn!(streamer_id, error = %e, "invalid hardware payload");
                mutated = false;
            }
        },
        MessageType::Network => match envelope.parse_data::<NetworkPayload>() {
            Ok(payload) => snapshot.network_links = payload.links,
            Err(e) => {
                tracing::warn!(streamer_id, error = %e, "invalid network payload");
                mutated = false;
            }
        },
        MessageType::Starlink => match envelope.parse_data() {
            Ok(starlink) => snapshot.starlink = starlink,
            Err(e) => {
                tracing::warn!(streamer_id, error = %e, "invalid starlink payload");
                mutated = false;
            }
        },
        MessageType::Health => match envelope.parse_data::<HealthStatus>() {
            Ok(health) => snapshot.health = health,
            Err(e) => {
                tracing::warn!(streamer_id, error = %e, "invalid health payload");
                mutated = false;
            }
        },
        MessageType::StreamStatus | MessageType::Command | MessageType::Unknown => {
            mutated = false;
        }
    }

    if !mutated {
        return;
    }

    snapshot.updated_at = Utc::now();
    state
        .live_streamers()
        .insert(streamer_id.to_string(), snapshot.clone());

    state.broadcast_dashboard(DashboardEvent::StreamerUpdate(StreamerUpdateData {
        streamer_id: streamer_id.to_string(),
        streamer: snapshot,
    }));
}

/// Best-effort, non-blocking reverse-geocode lookup for a freshly
/// reported GPS fix. Updates the snapshot's `location_name` and
/// rebroadcasts once resolved; never blocks telemetry processing.
fn schedule_geocode(state: AppState, streamer_id: String, lat: f64, lng: f64) {
    tokio::spawn(async move {
        let Some(name) = state.geocoder().reverse_geocode(&streamer_id, lat, lng).await else {
            return;
        };

        if let Some(mut entry) = state.live_streamers().get_mut(&streamer_id) {
            entry.location_name = Some(name);
            let snapshot = entry.clone();
            drop(entry);
            state.broadcast_dashboard(DashboardEvent::StreamerUpdate(StreamerUpdateData {
                streamer_id: streamer_id.clone(),
                streamer: snapshot,
            }));
        }
    });
}

/// Field disconnect (§4.9): the maps are cleared before the offline
/// event is published, so a dashboard client racing the broadcast never
/// observes a `streamer_offline` for a snapshot it could still fetch.
async fn disconnect_field(state: &AppState, streamer_id: &str) {
    state.field_connections().remove(streamer_id);
    state.live_streamers().remove(streamer_id);
    state.health_monitors().remove(streamer_id);

    if let Some((_, pipeline)) = state.pipelines().remove(streamer_id) {
        pipeline.lock().await.stop(state.ports()).await;
    } else {
        state.ports().release(streamer_id);
    }

    state.broadcast_dashboard(DashboardEvent::StreamerOffline(StreamerOfflineData {
        streamer_id: streamer_id.to_string(),
    }));

    tracing::info!(streamer_id, "field agent disconnected");
}

/// Overlay source name toggled opportunistically on entry to DEGRADED
/// (§4.8) — a "low bandwidth" banner independent of scene switching.
const LOW_BANDWIDTH_SOURCE: &str = "low_bandwidth_banner";

/// Runs while a pipeline exists for `streamer_id`: every check interval,
/// recomputes health from ingest statistics and invokes the OBS actuator
/// on a state transition. Exits once the pipeline is gone.
fn spawn_health_loop(state: AppState, streamer_id: String) {
    tokio::spawn(async move {
        let interval = std::time::Duration::from_secs_f64(state.config().health.check_interval_s);
        loop {
            tokio::time::sleep(interval).await;

            let Some(pipeline_entry) = state.pipelines().get(&streamer_id) else {
                return;
            };
            let Some(snapshot) = state.live_streamers().get(&streamer_id).map(|r| r.clone()) else {
                return;
            };
            let pipeline_guard = pipeline_entry.lock().await;
            let inputs = health_inputs_from_pipeline(&pipeline_guard, &snapshot);
            drop(pipeline_guard);
            drop(pipeline_entry);

            let Some(monitor_entry) = state.health_monitors().get(&streamer_id) else {
                return;
            };
            let transition = monitor_entry.lock().await.evaluate(&inputs);
            drop(monitor_entry);

            if let Some(transition) = transition {
                tracing::info!(
                    streamer_id,
                    old = %transition.old,
                    new = %transition.new,
                    score = transition.score,
                    "health transition"
                );
                state.obs().on_transition(&streamer_id, transition.new).await;

                let scene_live = &state.config().obs.scene_live;
                if transition.new == HealthState::Degraded {
                    state.obs().set_source_visible(scene_live, LOW_BANDWIDTH_SOURCE, true);
                } else if transition.old == HealthState::Degraded {
                    state.obs().set_source_visible(scene_live, LOW_BANDWIDTH_SOURCE, false);
                }
            }
        }
    });
}

/// Derive health inputs from a streamer's pipeline ingest status, for
/// the periodic health evaluation loop.
pub fn health_inputs_from_pipeline(
    pipeline: &StreamerPipeline,
    snapshot: &LiveSnapshot,
) -> HealthInputs {
    let status = pipeline.status();
    let links = &status.ingest.links;
    let active: Vec<_> = links.iter().filter(|l| l.active).collect();

    let rtt_avg = if active.is_empty() {
        0.0
    } else {
        active.iter().map(|l| l.rtt_ms).sum::<f64>() / active.len() as f64
    };
    let loss_avg = if active.is_empty() {
        0.0
    } else {
        active.iter().map(|l| l.loss_pct).sum::<f64>() / active.len() as f64
    };
    let bitrate_kbps = active.iter().map(|l| l.bitrate_kbps).sum();
    let max_link_score = links.iter().map(|l| l.score).max().unwrap_or(0);
    let staleness = (Utc::now() - snapshot.updated_at)
        .to_std()
        .unwrap_or_default();

    HealthInputs {
        active_links: status.ingest.active_links,
        total_links: status.ingest.total_links,
        bitrate_kbps,
        rtt_avg,
        loss_avg,
        max_link_score,
        staleness,
    }
}
