//! Student record CRUD endpoints
//!
//! Thin pass-through to [`StudentStore`](crate::db::StudentStore). Records are
//! addressed by storage key (`_id`), never by display identifier.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{StudentFields, StudentPatch, StudentRecord};
use crate::AppState;

/// Unparsable keys cannot name a stored record, so they are reported as 404
fn parse_key(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Student not found: {}", raw)))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// GET /students
///
/// All records ordered by display identifier.
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentRecord>>> {
    Ok(Json(state.store.list_all().await?))
}

/// POST /students
pub async fn create_student(
    State(state): State<AppState>,
    body: Result<Json<StudentFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StudentRecord>)> {
    let fields = json_body(body)?;
    let record = state.store.insert(fields).await?;

    info!(
        storage_key = %record.storage_key,
        display_id = record.display_id,
        "Student created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /students/:id
///
/// Merges the provided members; absent members are left unchanged.
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StudentPatch>, JsonRejection>,
) -> ApiResult<Json<StudentRecord>> {
    let storage_key = parse_key(&id)?;
    let patch = json_body(body)?;
    let record = state.store.update(storage_key, &patch).await?;

    info!(%storage_key, empty_patch = patch.is_empty(), "Student updated");
    Ok(Json(record))
}

/// DELETE /students/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let storage_key = parse_key(&id)?;
    state.store.delete(storage_key).await?;

    info!(%storage_key, "Student deleted");
    Ok(StatusCode::NO_CONTENT)
}
