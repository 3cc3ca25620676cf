//! Duplicate group registry handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::Ack;
use crate::AppState;
use doublons_common::errors::{AppError, Result};
use doublons_common::models::{
    signature, DuplicateGroup, GroupAction, GroupStatus, Page,
};
use doublons_common::Store;
use tracing::info;

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

fn default_statut() -> GroupStatus {
    GroupStatus::Detecte
}

#[derive(Debug, Deserialize)]
pub struct ListGroupsParams {
    #[serde(default = "default_page")]
    pub page: u64,

    #[serde(default = "default_limit")]
    pub limit: u64,

    #[serde(default = "default_statut")]
    pub statut: GroupStatus,
}

/// List groups filtered by exact status; pagination is 1-indexed
pub async fn list_groups(
    State(state): State<AppState>,
    Query(params): Query<ListGroupsParams>,
) -> Result<Json<Page<DuplicateGroup>>> {
    if params.page == 0 {
        return Err(AppError::Validation {
            message: "page is 1-indexed".into(),
            field: Some("page".into()),
        });
    }
    let page = state
        .store
        .list_groups(params.statut, params.page, params.limit)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct GroupActionRequest {
    pub action: GroupAction,
}

/// Apply a review action to a group. `ignore` also records the group
/// signature in the false-positive registry; `restore` removes it.
pub async fn group_action(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(request): Json<GroupActionRequest>,
) -> Result<Json<DuplicateGroup>> {
    let group = state
        .store
        .find_group(group_id)
        .await?
        .ok_or_else(|| AppError::GroupNotFound {
            id: group_id.to_string(),
        })?;

    let next = group.statut.apply(request.action)?;
    let updated = state.store.set_group_status(group_id, next).await?;

    match request.action {
        GroupAction::Ignore => {
            state.store.add_ignored_signature(&group.signature).await?;
        }
        GroupAction::Restore => {
            state
                .store
                .delete_ignored_by_signature(&group.signature)
                .await?;
        }
        GroupAction::Surveiller => {}
    }

    info!(
        group_id = %group_id,
        action = ?request.action,
        statut = ?updated.statut,
        "Group status updated"
    );
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct BulkIgnoreRequest {
    pub student_ids: Vec<Uuid>,
}

/// Record a member set as a confirmed false positive by raw ids,
/// without requiring a live group. If a live group matches the
/// signature it is flipped to IGNORE as well.
pub async fn bulk_ignore(
    State(state): State<AppState>,
    Json(request): Json<BulkIgnoreRequest>,
) -> Result<Json<Ack>> {
    if request.student_ids.len() < 2 {
        return Err(AppError::Validation {
            message: "student_ids needs at least two ids".into(),
            field: Some("student_ids".into()),
        });
    }

    let sig = signature(&request.student_ids);
    state.store.add_ignored_signature(&sig).await?;

    if let Some(group) = state.store.find_group_by_signature(&sig).await? {
        if group.statut != GroupStatus::Ignore {
            state
                .store
                .set_group_status(group.id, GroupStatus::Ignore)
                .await?;
        }
    }

    info!(signature = %sig, "Signature ignored");
    Ok(Json(Ack::ok()))
}
