//! Student record handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::AppState;
use doublons_common::errors::{AppError, Result};
use doublons_common::models::Student;
use doublons_common::Store;

/// Fetch one active student record. Merged-away (deactivated) records
/// report RecordNotFound.
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>> {
    let student = state
        .store
        .find_student(id)
        .await?
        .ok_or_else(|| AppError::RecordNotFound {
            id: id.to_string(),
        })?;
    Ok(Json(student))
}
