//! Merge resolver
//!
//! Applies a reviewed merge decision: validates the request, delegates
//! the transactional collapse to the store, and resolves the
//! originating group. The store guarantees at-most-once semantics, so a
//! retried merge whose losers are already gone fails cleanly instead of
//! double-applying.

use doublons_common::errors::Result;
use doublons_common::metrics::record_merge;
use doublons_common::models::{MergeRequest, Student};
use doublons_common::{SharedStore, Store};
use serde::Serialize;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Outcome of a successful merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub master: Student,
    pub merged_count: usize,
    pub group_resolved: bool,
}

#[derive(Clone)]
pub struct MergeResolver {
    store: SharedStore,
}

impl MergeResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(master_id = %request.master_id))]
    pub async fn execute(&self, request: MergeRequest) -> Result<MergeOutcome> {
        request.validate()?;
        request.validate_semantics()?;

        let merged_count = request.ids_to_merge.len();
        let master = match self
            .store
            .merge_students(request.master_id, &request.ids_to_merge, &request.overrides)
            .await
        {
            Ok(master) => master,
            Err(e) => {
                record_merge(0, false);
                return Err(e);
            }
        };

        // The group may already be gone (pruned by the merge itself, or
        // deleted by a concurrent reviewer); that is not an error.
        let group_resolved = match request.group_id {
            Some(group_id) => match self.store.delete_group(group_id).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(group_id = %group_id, error = %e, "Merge succeeded but group cleanup failed");
                    false
                }
            },
            None => false,
        };

        info!(
            master_id = %master.id,
            merged_count = merged_count,
            dossiers_count = master.dossiers_count,
            "Merge applied"
        );
        record_merge(merged_count, true);

        Ok(MergeOutcome {
            master,
            merged_count,
            group_resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use doublons_common::errors::AppError;
    use doublons_common::models::{signature, GroupMember, StudentPatch};
    use doublons_common::MemStore;
    use uuid::Uuid;

    async fn seeded() -> (MergeResolver, Arc<MemStore>, Vec<Student>) {
        let store = Arc::new(MemStore::new());
        let students = vec![
            Student::new("Rakoto", "Jean"),
            Student::new("Rakoto", "Jean"),
            Student::new("Rakoto", "J."),
        ];
        store.seed_students(students.clone()).await;
        (MergeResolver::new(store.clone()), store, students)
    }

    fn request(master: Uuid, ids: Vec<Uuid>) -> MergeRequest {
        MergeRequest {
            master_id: master,
            ids_to_merge: ids,
            overrides: StudentPatch::default(),
            group_id: None,
        }
    }

    #[tokio::test]
    async fn test_merge_collapses_and_resolves_group() {
        let (resolver, store, students) = seeded().await;
        let ids: Vec<Uuid> = students.iter().map(|s| s.id).collect();
        let members: Vec<GroupMember> = students.iter().map(GroupMember::from).collect();
        let sig = signature(&ids);
        let group = store.upsert_group(&sig, members, 88.0).await.unwrap();

        let mut req = request(ids[0], vec![ids[1], ids[2]]);
        req.group_id = Some(group.id);

        let outcome = resolver.execute(req).await.unwrap();
        assert_eq!(outcome.master.id, ids[0]);
        assert_eq!(outcome.merged_count, 2);
        assert!(outcome.group_resolved);
        assert!(store.find_group(group.id).await.unwrap().is_none());
        assert!(store.find_student(ids[1]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_applies_overrides() {
        let (resolver, _store, students) = seeded().await;
        let mut req = request(students[0].id, vec![students[1].id]);
        req.overrides = StudentPatch {
            email: Some("jean.rakoto@univ.example".into()),
            ..StudentPatch::default()
        };

        let outcome = resolver.execute(req).await.unwrap();
        assert_eq!(
            outcome.master.email.as_deref(),
            Some("jean.rakoto@univ.example")
        );
    }

    #[tokio::test]
    async fn test_master_in_merge_set_rejected() {
        let (resolver, _store, students) = seeded().await;
        let req = request(students[0].id, vec![students[0].id, students[1].id]);
        let err = resolver.execute(req).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidMergeRequest { .. }));
    }

    #[tokio::test]
    async fn test_replay_fails_without_touching_master() {
        let (resolver, store, students) = seeded().await;
        let req = request(students[0].id, vec![students[1].id]);

        resolver.execute(req.clone()).await.unwrap();
        let before = store.find_student(students[0].id).await.unwrap().unwrap();

        let err = resolver.execute(req).await.unwrap_err();
        assert!(matches!(err, AppError::RecordNotFound { .. }));

        let after = store.find_student(students[0].id).await.unwrap().unwrap();
        assert_eq!(before.dossiers_count, after.dossiers_count);
    }

    #[tokio::test]
    async fn test_missing_group_id_is_tolerated() {
        let (resolver, _store, students) = seeded().await;
        let mut req = request(students[0].id, vec![students[1].id]);
        req.group_id = Some(Uuid::new_v4());

        let outcome = resolver.execute(req).await.unwrap();
        assert!(!outcome.group_resolved);
    }
}
