//! HTTP route tree.
//!
//! REST CRUD for streamer accounts is a collaborator concern, not part of
//! the core (§1); the only HTTP surface the hub itself serves is a
//! liveness check for process supervisors and load balancers.

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> &'static str {
    "ok"
}
