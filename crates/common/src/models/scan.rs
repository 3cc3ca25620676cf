//! Scan job status and snapshots

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DuplicateGroup;

/// Scan job status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Processing,
    Paused,
    Completed,
    Failed,
    Stopped,
    Unknown,
}

impl From<String> for ScanStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => ScanStatus::Processing,
            "paused" => ScanStatus::Paused,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            "stopped" => ScanStatus::Stopped,
            _ => ScanStatus::Unknown,
        }
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        match status {
            ScanStatus::Processing => "processing".to_string(),
            ScanStatus::Paused => "paused".to_string(),
            ScanStatus::Completed => "completed".to_string(),
            ScanStatus::Failed => "failed".to_string(),
            ScanStatus::Stopped => "stopped".to_string(),
            ScanStatus::Unknown => "unknown".to_string(),
        }
    }
}

impl ScanStatus {
    /// Terminal statuses stop the polling loop. `unknown` is terminal
    /// and non-retryable: the caller must drop its job reference.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Stopped | ScanStatus::Unknown
        )
    }
}

/// Point-in-time view of a scan job, as returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub job_id: Uuid,

    pub status: ScanStatus,

    /// Completion percentage (0-100), monotone while processing
    pub progress: f32,

    /// Index of the next record to process; resume picks up here
    pub current_index: u64,

    /// Total records in this pass
    pub total: u64,

    /// Number of groups found so far, monotone while processing
    pub found_count: u64,

    /// Groups found so far; append-only within one job
    pub result: Vec<DuplicateGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanSnapshot {
    /// Fresh snapshot for a job that has not processed anything yet
    pub fn starting(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: ScanStatus::Processing,
            progress: 0.0,
            current_index: 0,
            total: 0,
            found_count: 0,
            result: Vec::new(),
            error: None,
        }
    }

    /// Snapshot for an id the controller does not recognize
    pub fn unknown(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: ScanStatus::Unknown,
            progress: 0.0,
            current_index: 0,
            total: 0,
            found_count: 0,
            result: Vec::new(),
            error: None,
        }
    }

    /// Merge a newly received snapshot into the last observed one,
    /// never regressing progress or found_count. Polling clients use
    /// this to tolerate out-of-order status responses.
    pub fn observe(&mut self, incoming: ScanSnapshot) {
        let progress = self.progress.max(incoming.progress);
        let found_count = self.found_count.max(incoming.found_count);
        let current_index = self.current_index.max(incoming.current_index);
        let result = if incoming.result.len() >= self.result.len() {
            incoming.result.clone()
        } else {
            std::mem::take(&mut self.result)
        };
        *self = ScanSnapshot {
            progress,
            found_count,
            current_index,
            result,
            ..incoming
        };
    }
}
