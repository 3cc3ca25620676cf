//! Scan job checkpoint entity

use crate::errors::Result as AppResult;
use crate::models::{DuplicateGroup, ScanSnapshot, ScanStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scan_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Float")]
    pub progress: f32,

    pub current_index: i64,

    pub total: i64,

    pub found_count: i64,

    /// Groups found so far, serialized as JSON
    pub result: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the checkpoint row into a snapshot
    pub fn into_snapshot(self) -> AppResult<ScanSnapshot> {
        let result: Vec<DuplicateGroup> = serde_json::from_value(self.result)?;
        Ok(ScanSnapshot {
            job_id: self.id,
            status: ScanStatus::from(self.status),
            progress: self.progress,
            current_index: self.current_index as u64,
            total: self.total as u64,
            found_count: self.found_count as u64,
            result,
            error: self.error,
        })
    }
}
