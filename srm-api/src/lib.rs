//! srm-api library - Student Records Manager service
//!
//! Record store with sequential display identifiers, XML import (full
//! replace with renumbering) and export, behind bearer-token authentication.

use std::sync::Arc;

use axum::Router;
use srm_common::api::CredentialVerifier;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod codec;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;

use db::StudentStore;

/// Default request body limit for uploads (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: StudentStore,
    /// Credential scheme for protected routes
    pub verifier: Arc<dyn CredentialVerifier>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: StudentStore, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            store,
            verifier,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
///
/// `/health` and `/login` are public; everything else requires a bearer
/// token, checked before the request body is read.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/upload-xml", post(api::upload_xml))
        .route("/export-xml", get(api::export_xml))
        .route("/students", get(api::list_students).post(api::create_student))
        .route(
            "/students/:id",
            put(api::update_student).delete(api::delete_student),
        )
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/login", post(api::login))
        .merge(api::health_routes());

    // Combine routers
    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
