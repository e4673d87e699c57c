//! fieldmux control plane
//!
//! Single binary that runs:
//! - bonded SRT ingest, RTMP relay supervision, and health/OBS actuation
//!   for every connected field agent
//! - a WebSocket endpoint for field agents (`/ws/field/{streamer_id}`)
//! - a WebSocket endpoint for dashboard subscribers (`/ws/dashboard`)
//! - a liveness check (`/healthz`)

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fieldmux_hub::config::Config;
use fieldmux_hub::state::AppState;
use fieldmux_hub::{api, db, ws_dashboard, ws_field};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────
    let config = Config::load()?;

    // ── Database ────────────────────────────────────────────────
    let pool = db::connect(&config.database.path).await?;
    db::migrate(&pool).await?;

    // ── Shared state ────────────────────────────────────────────
    let addr = format!("{}:{}", config.dashboard.host, config.dashboard.port);
    let state = AppState::new(pool, config);

    // ── Router ──────────────────────────────────────────────────
    let app = Router::new()
        .merge(api::router())
        .route("/ws/field/{streamer_id}", axum::routing::get(ws_field::handler))
        .route("/ws/dashboard", axum::routing::get(ws_dashboard::handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // ── Listen ──────────────────────────────────────────────────
    tracing::info!(addr, "fieldmux-hub listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
