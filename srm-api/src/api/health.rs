//! Health check endpoint

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    /// Records currently stored; absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<i64>,
}

/// GET /health
///
/// Public. Reports 503 when the database cannot be queried.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let students = match state.store.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Health check: database unavailable: {}", e);
            None
        }
    };

    let (status, code) = match students {
        Some(_) => ("ok", StatusCode::OK),
        None => ("degraded", StatusCode::SERVICE_UNAVAILABLE),
    };

    (
        code,
        Json(HealthResponse {
            status,
            module: "srm-api",
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            students,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
