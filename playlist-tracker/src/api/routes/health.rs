//! Health check route.

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Liveness only; the tracker has no dependencies worth probing per request.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
