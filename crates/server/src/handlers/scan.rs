//! Scan job handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::Ack;
use crate::AppState;
use doublons_common::errors::Result;
use doublons_common::models::{ScanSnapshot, ScanStatus};

#[derive(Debug, Default, Deserialize)]
pub struct StartScanRequest {
    /// Continue a paused job instead of starting from index 0
    #[serde(default)]
    pub resume: bool,

    /// Required when `resume` is true
    #[serde(default)]
    pub job_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct StartScanResponse {
    pub job_id: Uuid,
    pub status: ScanStatus,
}

/// Start a fresh scan or resume a paused one. The scan runs in the
/// background; callers poll the status endpoint.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<StartScanResponse>)> {
    let job_id = state.scans.start(request.resume, request.job_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartScanResponse {
            job_id,
            status: ScanStatus::Processing,
        }),
    ))
}

/// Snapshot of a job. Unknown ids report `status: unknown` with a 200,
/// not a 404: the id may simply have expired, and clients are expected
/// to drop their reference rather than retry.
pub async fn scan_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ScanSnapshot>> {
    Ok(Json(state.scans.status(job_id).await?))
}

/// Request cooperative cancellation; the job pauses at the next
/// checkpoint. Poll the status endpoint to confirm the transition.
pub async fn stop_scan(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Ack>> {
    state.scans.stop(job_id).await?;
    Ok(Json(Ack::ok()))
}
