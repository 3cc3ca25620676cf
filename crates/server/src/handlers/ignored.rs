//! False-positive registry handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::handlers::Ack;
use crate::AppState;
use doublons_common::errors::{AppError, Result};
use doublons_common::models::IgnoredSignature;
use doublons_common::Store;

/// All ignored signatures, independent of any live group
pub async fn list_ignored(
    State(state): State<AppState>,
) -> Result<Json<Vec<IgnoredSignature>>> {
    Ok(Json(state.store.list_ignored_signatures().await?))
}

/// Drop an ignore entry; the member set becomes detectable again on the
/// next scan pass
pub async fn delete_ignored(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ack>> {
    let removed = state.store.delete_ignored_signature(id).await?;
    if !removed {
        return Err(AppError::NotFound {
            resource_type: "ignored signature".to_string(),
            id: id.to_string(),
        });
    }
    Ok(Json(Ack::ok()))
}
