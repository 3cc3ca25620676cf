//! Merge request payload and semantic validation

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;

use super::StudentPatch;

/// Request to collapse duplicate records into a master
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MergeRequest {
    /// The record that survives
    pub master_id: Uuid,

    /// Records collapsed into the master and deactivated
    #[validate(length(min = 1, message = "ids_to_merge must not be empty"))]
    pub ids_to_merge: Vec<Uuid>,

    /// Field-level winners chosen during review
    #[serde(default)]
    pub overrides: StudentPatch,

    /// Originating group to resolve once the merge succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
}

impl MergeRequest {
    /// Reject structurally valid requests that break merge invariants:
    /// the master must not be in the merge set, and a merge that
    /// touches no other record is a no-op.
    pub fn validate_semantics(&self) -> Result<(), AppError> {
        if self.ids_to_merge.is_empty() {
            return Err(AppError::InvalidMergeRequest {
                message: "ids_to_merge is empty".into(),
            });
        }
        if self.ids_to_merge.contains(&self.master_id) {
            return Err(AppError::InvalidMergeRequest {
                message: format!("master {} is included in ids_to_merge", self.master_id),
            });
        }
        let mut deduped = self.ids_to_merge.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != self.ids_to_merge.len() {
            return Err(AppError::InvalidMergeRequest {
                message: "ids_to_merge contains duplicates".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(master: Uuid, ids: Vec<Uuid>) -> MergeRequest {
        MergeRequest {
            master_id: master,
            ids_to_merge: ids,
            overrides: StudentPatch::default(),
            group_id: None,
        }
    }

    #[test]
    fn test_valid_request() {
        let req = request(Uuid::new_v4(), vec![Uuid::new_v4(), Uuid::new_v4()]);
        assert!(req.validate_semantics().is_ok());
    }

    #[test]
    fn test_empty_merge_set_rejected() {
        let req = request(Uuid::new_v4(), vec![]);
        assert!(matches!(
            req.validate_semantics(),
            Err(AppError::InvalidMergeRequest { .. })
        ));
    }

    #[test]
    fn test_master_in_merge_set_rejected() {
        let master = Uuid::new_v4();
        let req = request(master, vec![Uuid::new_v4(), master]);
        assert!(matches!(
            req.validate_semantics(),
            Err(AppError::InvalidMergeRequest { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dup = Uuid::new_v4();
        let req = request(Uuid::new_v4(), vec![dup, dup]);
        assert!(req.validate_semantics().is_err());
    }
}
