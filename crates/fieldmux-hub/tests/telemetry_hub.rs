//! End-to-end tests against a real TCP listener: field-agent handshake,
//! dashboard fan-out, and disconnect bookkeeping.
//!
//! Each test boots its own in-memory SQLite-backed hub on an ephemeral
//! port and drives it with real WebSocket clients.

use std::str::FromStr;
use std::time::Duration;

use axum::Router;
use futures::{SinkExt, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use fieldmux_common::models::StreamerRecord;
use fieldmux_hub::config::Config;
use fieldmux_hub::state::AppState;
use fieldmux_hub::store::StreamerStore;
use fieldmux_hub::{api, ws_dashboard, ws_field};

async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// Boot a hub on an ephemeral loopback port and return its base `ws://` URL
/// plus the state handle (for direct assertions and broadcasting).
async fn spawn_hub() -> (String, AppState) {
    let pool = memory_pool().await;
    let state = AppState::new(pool, Config::default());

    let app = Router::new()
        .merge(api::router())
        .route("/ws/field/{streamer_id}", axum::routing::get(ws_field::handler))
        .route("/ws/dashboard", axum::routing::get(ws_dashboard::handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}"), state)
}

async fn create_streamer(state: &AppState, approved: bool, enabled_destination: bool) -> StreamerRecord {
    let record = state.store().create("Test Streamer", approved).await.unwrap();
    if enabled_destination {
        state
            .store()
            .set_destinations(
                &record.id,
                &[fieldmux_common::models::StreamDestination {
                    platform: "custom".to_string(),
                    rtmp_url: "rtmp://example.com/app/key1234".to_string(),
                    enabled: true,
                }],
            )
            .await
            .unwrap();
    }
    state.store().get_by_id(&record.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn happy_path_ingest_then_broadcast_then_offline() {
    let (base, state) = spawn_hub().await;
    let record = create_streamer(&state, true, true).await;

    let (mut dashboard, _) = connect_async(format!("{base}/ws/dashboard")).await.unwrap();

    // full_sync arrives immediately, listing nothing yet.
    let full_sync = dashboard.next().await.unwrap().unwrap();
    let full_sync: serde_json::Value = serde_json::from_str(full_sync.to_text().unwrap()).unwrap();
    assert_eq!(full_sync["type"], "full_sync");
    assert!(full_sync["data"]["streamers"].as_array().unwrap().is_empty());

    let (mut field, _) = connect_async(format!(
        "{base}/ws/field/{}?key={}",
        record.id, record.write_credential
    ))
    .await
    .unwrap();

    let online = dashboard.next().await.unwrap().unwrap();
    let online: serde_json::Value = serde_json::from_str(online.to_text().unwrap()).unwrap();
    assert_eq!(online["type"], "streamer_online");
    assert_eq!(online["data"]["streamer_id"], record.id);

    // A port was allocated for the enabled destination's ingest pipeline.
    assert!(state.ports().get(&record.id).is_some());

    field.close(None).await.unwrap();
    drop(field);

    let offline = tokio::time::timeout(Duration::from_secs(5), dashboard.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let offline: serde_json::Value = serde_json::from_str(offline.to_text().unwrap()).unwrap();
    assert_eq!(offline["type"], "streamer_offline");
    assert_eq!(offline["data"]["streamer_id"], record.id);

    // Give the disconnect handler a moment to finish tearing the pipeline down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.ports().get(&record.id).is_none());
    assert!(state.live_streamers().get(&record.id).is_none());
}

#[tokio::test]
async fn wrong_credential_is_rejected_with_4001() {
    let (base, state) = spawn_hub().await;
    let record = create_streamer(&state, true, false).await;

    let (mut field, _) = connect_async(format!("{base}/ws/field/{}?key=WRONG", record.id))
        .await
        .unwrap();

    let close = field.next().await.unwrap().unwrap();
    match close {
        WsMessage::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4001),
        other => panic!("expected close frame, got {other:?}"),
    }

    assert!(state.live_streamers().get(&record.id).is_none());
    assert!(state.ports().get(&record.id).is_none());
}

#[tokio::test]
async fn unapproved_streamer_is_rejected_with_4003() {
    let (base, state) = spawn_hub().await;
    let record = create_streamer(&state, false, false).await;

    let (mut field, _) = connect_async(format!(
        "{base}/ws/field/{}?key={}",
        record.id, record.write_credential
    ))
    .await
    .unwrap();

    let close = field.next().await.unwrap().unwrap();
    match close {
        WsMessage::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4003),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn dashboard_fanout_survives_a_slow_subscriber() {
    let (base, state) = spawn_hub().await;
    let record = create_streamer(&state, true, false).await;

    let (mut fast, _) = connect_async(format!("{base}/ws/dashboard")).await.unwrap();
    let (_slow, _) = connect_async(format!("{base}/ws/dashboard")).await.unwrap();

    // Both receive their full_sync; the slow client then never reads again,
    // but stays connected (kept alive by the `_slow` binding) for the rest
    // of the test so its write buffer has a chance to back up.
    let _ = fast.next().await.unwrap().unwrap();

    for _ in 0..20 {
        let snapshot = fieldmux_common::models::LiveSnapshot::from_record(&record);
        state.broadcast_dashboard(fieldmux_common::protocol::DashboardEvent::StreamerUpdate(
            fieldmux_common::protocol::StreamerUpdateData {
                streamer_id: record.id.clone(),
                streamer: snapshot,
            },
        ));
    }

    let last = tokio::time::timeout(Duration::from_secs(5), async {
        let mut last = None;
        for _ in 0..20 {
            last = Some(fast.next().await.unwrap().unwrap());
        }
        last
    })
    .await
    .expect("fast subscriber should keep receiving despite the slow one");

    let last: serde_json::Value = serde_json::from_str(last.unwrap().to_text().unwrap()).unwrap();
    assert_eq!(last["type"], "streamer_update");
}
