//! Snapshot series as JSON.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::database::models::SnapshotDbModel;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_snapshots))
}

/// All snapshots, oldest first.
async fn list_snapshots(State(state): State<AppState>) -> ApiResult<Json<Vec<SnapshotDbModel>>> {
    Ok(Json(state.repository.list_all().await?))
}
