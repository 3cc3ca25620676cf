//! Student record entity

use crate::models::Student;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "etudiants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", nullable)]
    pub ine: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub nom: String,

    #[sea_orm(column_type = "Text")]
    pub prenom: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub telephone: Option<String>,

    pub date_naissance: Option<Date>,

    pub dossiers_count: i64,

    pub active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Student {
    fn from(m: Model) -> Self {
        Student {
            id: m.id,
            ine: m.ine,
            nom: m.nom,
            prenom: m.prenom,
            email: m.email,
            telephone: m.telephone,
            date_naissance: m.date_naissance,
            dossiers_count: m.dossiers_count,
            active: m.active,
            created_at: m.created_at.with_timezone(&chrono::Utc),
            updated_at: m.updated_at.with_timezone(&chrono::Utc),
        }
    }
}

impl From<&Student> for ActiveModel {
    fn from(s: &Student) -> Self {
        use sea_orm::Set;
        ActiveModel {
            id: Set(s.id),
            ine: Set(s.ine.clone()),
            nom: Set(s.nom.clone()),
            prenom: Set(s.prenom.clone()),
            email: Set(s.email.clone()),
            telephone: Set(s.telephone.clone()),
            date_naissance: Set(s.date_naissance),
            dossiers_count: Set(s.dossiers_count),
            active: Set(s.active),
            created_at: Set(s.created_at.into()),
            updated_at: Set(s.updated_at.into()),
        }
    }
}
