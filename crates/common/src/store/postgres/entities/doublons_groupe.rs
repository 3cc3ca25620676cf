//! Duplicate group entity

use crate::errors::{AppError, Result as AppResult};
use crate::models::{DuplicateGroup, GroupMember, GroupStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "doublons_groupes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub signature: String,

    /// Ordered member summaries, serialized as JSON
    pub students: Json,

    #[sea_orm(column_type = "Float")]
    pub score: f32,

    #[sea_orm(column_type = "Text")]
    pub statut: String,

    pub detected_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Decode the row into the domain group
    pub fn into_domain(self) -> AppResult<DuplicateGroup> {
        let students: Vec<GroupMember> = serde_json::from_value(self.students)?;
        let statut = GroupStatus::try_from(self.statut.as_str())?;
        Ok(DuplicateGroup {
            id: self.id,
            signature: self.signature,
            students,
            score: self.score,
            statut,
            detected_at: self.detected_at.with_timezone(&chrono::Utc),
        })
    }
}

impl TryFrom<&DuplicateGroup> for ActiveModel {
    type Error = AppError;

    fn try_from(g: &DuplicateGroup) -> AppResult<Self> {
        use sea_orm::Set;
        Ok(ActiveModel {
            id: Set(g.id),
            signature: Set(g.signature.clone()),
            students: Set(serde_json::to_value(&g.students)?),
            score: Set(g.score),
            statut: Set(String::from(g.statut)),
            detected_at: Set(g.detected_at.into()),
        })
    }
}
