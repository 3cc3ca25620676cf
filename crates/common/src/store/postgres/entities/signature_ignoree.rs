//! Ignored signature entity (false-positive registry)

use crate::models::IgnoredSignature;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "doublons_signatures_ignorees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub signature: String,

    pub date_ignore: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for IgnoredSignature {
    fn from(m: Model) -> Self {
        IgnoredSignature {
            id: m.id,
            signature: m.signature,
            date_ignore: m.date_ignore.with_timezone(&chrono::Utc),
        }
    }
}
