//! XML import/export endpoints

use axum::{
    extract::{rejection::QueryRejection, FromRequest, Multipart, Query, Request, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{export_document, import_document, ImportMode};
use crate::AppState;

/// Multipart field carrying the uploaded document
pub const UPLOAD_FIELD: &str = "file";

/// Download name of the exported document
pub const EXPORT_FILENAME: &str = "etudiants_export.xml";

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub mode: ImportMode,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub count: usize,
}

/// POST /upload-xml
///
/// Accepts either `multipart/form-data` with a `file` field or the raw
/// document as the request body. `?mode=atomic` selects the transactional
/// variant.
pub async fn upload_xml(
    State(state): State<AppState>,
    query: Result<Query<ImportQuery>, QueryRejection>,
    request: Request,
) -> ApiResult<Json<ImportResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let document = read_document(&state, request).await?;
    debug!(bytes = document.len(), mode = ?query.mode, "Received import document");

    let report = import_document(&state.store, &document, query.mode).await?;

    Ok(Json(ImportResponse {
        message: format!("Imported {} students", report.imported_count),
        count: report.imported_count,
    }))
}

async fn read_document(state: &AppState, request: Request) -> ApiResult<Vec<u8>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let bytes = axum::body::to_bytes(request.into_body(), state.max_upload_bytes)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("No file uploaded".to_string()));
        }
        return Ok(bytes.to_vec());
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// GET /export-xml
///
/// Returns the whole collection as an attachment.
pub async fn export_xml(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let document = export_document(&state.store).await?;
    info!(bytes = document.len(), "Serving export document");

    Ok((
        [
            (CONTENT_TYPE, "application/xml".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        document,
    ))
}
