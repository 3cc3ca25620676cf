//! Merge handlers

use axum::{extract::State, Json};

use crate::merge::MergeOutcome;
use crate::AppState;
use doublons_common::errors::Result;
use doublons_common::models::MergeRequest;

/// Field-level merge with master/loser selection and per-field
/// overrides, as reviewed in the client workflow
pub async fn advanced_merge(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<MergeOutcome>> {
    let outcome = state.merges.execute(request).await?;
    Ok(Json(outcome))
}
