//! WebSocket handler for dashboard live updates.
//!
//! Endpoint: `GET /ws/dashboard`
//!
//! Browser clients connect here to receive a `full_sync` of every live
//! streamer, then real-time `streamer_online` / `streamer_update` /
//! `streamer_offline` events as they happen (§4.9).

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::StreamExt;
use futures::SinkExt;

use fieldmux_common::protocol::{DashboardEvent, FullSyncData};

use crate::state::AppState;

pub async fn handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Dashboard WebSocket handler: no identity, best-effort broadcast.
/// A send failure drops this subscriber without affecting any other.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut dashboard_rx = state.subscribe_dashboard();

    let full_sync = DashboardEvent::FullSync(FullSyncData {
        streamers: state
            .live_streamers()
            .iter()
            .map(|entry| entry.value().clone())
            .collect(),
    });
    let Ok(json) = serde_json::to_string(&full_sync) else {
        return;
    };
    if ws_tx.send(Message::Text(json.into())).await.is_err() {
        return;
    }

    tracing::debug!("dashboard client connected");

    loop {
        tokio::select! {
            event = dashboard_rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(_) => continue,
                        };
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("dashboard client lagged, dropped {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            // Inbound frames are keepalive only; ignored except Close.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("dashboard client disconnected");
}
