//! Bearer token authentication
//!
//! `POST /login` issues a token; every protected route passes through
//! [`auth_middleware`] before any extractor or pipeline runs.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use serde::Serialize;
use srm_common::api::{parse_bearer, ApiAuthError};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Subject of every issued token
pub const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /login
///
/// Issues a time-limited bearer token for the fixed admin subject.
pub async fn login(State(state): State<AppState>) -> ApiResult<Json<LoginResponse>> {
    let token = state.verifier.issue(ADMIN_SUBJECT)?;
    info!(subject = ADMIN_SUBJECT, "Issued bearer token");
    Ok(Json(LoginResponse { token }))
}

/// Authentication middleware
///
/// Missing `Authorization` header is 403; a header that does not carry a
/// valid, unexpired token is 401. Verification is skipped when the verifier
/// is disabled (shared secret 0).
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.verifier.is_enabled() {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(ApiAuthError::MissingToken)?
        .to_str()
        .map_err(|_| ApiAuthError::Malformed("non-ASCII header".to_string()))?;

    let claims = parse_bearer(header)
        .and_then(|token| state.verifier.verify(token))
        .map_err(|e| {
            warn!(path = %request.uri().path(), "Rejected credential: {}", e);
            e
        })?;

    debug!(subject = %claims.sub, "Authenticated request");
    Ok(next.run(request).await)
}
