//! Duplicate groups, lifecycle status, and member-set signatures

use crate::errors::AppError;
use crate::SIGNATURE_SEPARATOR;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Student;

/// Lifecycle status of a detected group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupStatus {
    #[serde(rename = "DETECTE")]
    Detecte,
    #[serde(rename = "SURVEILLANCE")]
    Surveillance,
    #[serde(rename = "IGNORE")]
    Ignore,
}

impl From<GroupStatus> for String {
    fn from(statut: GroupStatus) -> Self {
        match statut {
            GroupStatus::Detecte => "DETECTE".to_string(),
            GroupStatus::Surveillance => "SURVEILLANCE".to_string(),
            GroupStatus::Ignore => "IGNORE".to_string(),
        }
    }
}

impl TryFrom<&str> for GroupStatus {
    type Error = AppError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "DETECTE" => Ok(GroupStatus::Detecte),
            "SURVEILLANCE" => Ok(GroupStatus::Surveillance),
            "IGNORE" => Ok(GroupStatus::Ignore),
            other => Err(AppError::Validation {
                message: format!("unknown group status: {}", other),
                field: Some("statut".into()),
            }),
        }
    }
}

/// Status-change action requested by the review workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupAction {
    Ignore,
    Surveiller,
    Restore,
}

impl GroupStatus {
    /// Apply a review action, enforcing the legal transition table:
    /// DETECTE <-> SURVEILLANCE, DETECTE/SURVEILLANCE -> IGNORE,
    /// IGNORE -> DETECTE (restore).
    pub fn apply(self, action: GroupAction) -> Result<GroupStatus, AppError> {
        match (self, action) {
            (GroupStatus::Detecte, GroupAction::Ignore)
            | (GroupStatus::Surveillance, GroupAction::Ignore) => Ok(GroupStatus::Ignore),
            (GroupStatus::Detecte, GroupAction::Surveiller) => Ok(GroupStatus::Surveillance),
            (GroupStatus::Surveillance, GroupAction::Restore) => Ok(GroupStatus::Detecte),
            (GroupStatus::Ignore, GroupAction::Restore) => Ok(GroupStatus::Detecte),
            (from, action) => Err(AppError::InvalidTransition {
                from: String::from(from),
                action: format!("{:?}", action).to_lowercase(),
            }),
        }
    }
}

/// Member summary carried inside a group, enough for review and
/// master pre-selection without another record fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: Uuid,
    pub nom: String,
    pub prenom: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub dossiers_count: i64,
}

impl From<&Student> for GroupMember {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            nom: student.nom.clone(),
            prenom: student.prenom.clone(),
            email: student.email.clone(),
            dossiers_count: student.dossiers_count,
        }
    }
}

/// A cluster of records suspected to represent the same student.
///
/// Invariant: `students.len() >= 2`. The store drops any group that
/// shrinks below two members after a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    #[serde(rename = "group_id")]
    pub id: Uuid,

    /// Canonical member-set signature, stable across scans
    pub signature: String,

    /// Ordered member list; first-listed order breaks master ties
    pub students: Vec<GroupMember>,

    /// Similarity confidence for the group as a whole (0-100)
    pub score: f32,

    pub statut: GroupStatus,

    pub detected_at: DateTime<Utc>,
}

impl DuplicateGroup {
    pub fn member_ids(&self) -> Vec<Uuid> {
        self.students.iter().map(|m| m.id).collect()
    }
}

/// Persisted false-positive marker; suppresses re-detection of the
/// same member set across scans. Outlives the group it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoredSignature {
    pub id: Uuid,
    pub signature: String,
    pub date_ignore: DateTime<Utc>,
}

/// Canonical signature of a member set: sorted ids joined by `|`.
/// Pure function of the id set, order-independent.
pub fn signature(ids: &[Uuid]) -> String {
    let mut sorted: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    sorted.sort();
    sorted.join(SIGNATURE_SEPARATOR)
}

/// Default master pick for the review UI: highest dossier count,
/// ties broken by first-listed order. A UX default, not an invariant.
pub fn default_master(group: &DuplicateGroup) -> Option<Uuid> {
    group
        .students
        .iter()
        .fold(None::<&GroupMember>, |best, m| match best {
            Some(b) if m.dossiers_count <= b.dossiers_count => Some(b),
            _ => Some(m),
        })
        .map(|m| m.id)
}
