//! In-memory store implementation
//!
//! Backs tests and the single-node `backend = "memory"` mode. All state
//! lives behind one RwLock; the merge path holds the write guard for the
//! whole collapse, which serializes overlapping merges the same way the
//! Postgres implementation does with row locks.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{
    DuplicateGroup, GroupMember, GroupStatus, IgnoredSignature, Page, ScanSnapshot, Student,
    StudentPatch,
};

use super::Store;

#[derive(Default)]
struct MemInner {
    /// BTreeMap keeps listing order stable across calls
    students: BTreeMap<Uuid, Student>,
    /// Groups in detection order
    groups: Vec<DuplicateGroup>,
    ignored: Vec<IgnoredSignature>,
    scan_jobs: HashMap<Uuid, ScanSnapshot>,
}

#[derive(Default)]
pub struct MemStore {
    inner: RwLock<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture population, replacing any existing records
    pub async fn seed_students(&self, students: Vec<Student>) {
        let mut inner = self.inner.write().await;
        inner.students = students.into_iter().map(|s| (s.id, s)).collect();
    }
}

/// Remove merged ids from every group and drop groups that no longer
/// hold at least two members. Returns ids of dropped groups.
fn prune_groups(groups: &mut Vec<DuplicateGroup>, merged: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut dropped = Vec::new();
    groups.retain_mut(|group| {
        group.students.retain(|m| !merged.contains(&m.id));
        if group.students.len() < 2 {
            dropped.push(group.id);
            false
        } else {
            true
        }
    });
    dropped
}

#[async_trait]
impl Store for MemStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn count_students(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner.students.values().filter(|s| s.active).count() as u64)
    }

    async fn list_students(&self, offset: u64, limit: u64) -> Result<Vec<Student>> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .values()
            .filter(|s| s.active)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>> {
        let inner = self.inner.read().await;
        Ok(inner.students.get(&id).filter(|s| s.active).cloned())
    }

    async fn insert_student(&self, student: Student) -> Result<Student> {
        let mut inner = self.inner.write().await;
        inner.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn merge_students(
        &self,
        master_id: Uuid,
        ids: &[Uuid],
        patch: &StudentPatch,
    ) -> Result<Student> {
        let mut inner = self.inner.write().await;

        // Validate the whole request before any mutation
        if !inner
            .students
            .get(&master_id)
            .map(|s| s.active)
            .unwrap_or(false)
        {
            return Err(AppError::RecordNotFound {
                id: master_id.to_string(),
            });
        }
        for id in ids {
            if !inner.students.get(id).map(|s| s.active).unwrap_or(false) {
                return Err(AppError::RecordNotFound { id: id.to_string() });
            }
        }

        // Reassign dossiers and deactivate the losers
        let mut reassigned: i64 = 0;
        for id in ids {
            if let Some(loser) = inner.students.get_mut(id) {
                reassigned += loser.dossiers_count;
                loser.dossiers_count = 0;
                loser.active = false;
                loser.updated_at = Utc::now();
            }
        }

        let master = inner
            .students
            .get_mut(&master_id)
            .ok_or_else(|| AppError::MergeFailed {
                message: format!("master {} vanished during merge", master_id),
            })?;
        master.dossiers_count += reassigned;
        patch.apply(master);
        let merged = master.clone();

        // A merged record must not linger in any group
        let merged_set: HashSet<Uuid> = ids.iter().copied().collect();
        let dropped = prune_groups(&mut inner.groups, &merged_set);
        for group_id in dropped {
            tracing::debug!(group_id = %group_id, "Group dropped after merge pruning");
        }

        Ok(merged)
    }

    async fn upsert_group(
        &self,
        signature: &str,
        members: Vec<GroupMember>,
        score: f32,
    ) -> Result<DuplicateGroup> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.groups.iter().find(|g| g.signature == signature) {
            return Ok(existing.clone());
        }
        let group = DuplicateGroup {
            id: Uuid::new_v4(),
            signature: signature.to_string(),
            students: members,
            score,
            statut: GroupStatus::Detecte,
            detected_at: Utc::now(),
        };
        inner.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<DuplicateGroup>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn find_group_by_signature(&self, signature: &str) -> Result<Option<DuplicateGroup>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.iter().find(|g| g.signature == signature).cloned())
    }

    async fn group_signatures(&self) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.iter().map(|g| g.signature.clone()).collect())
    }

    async fn list_groups(
        &self,
        statut: GroupStatus,
        page: u64,
        limit: u64,
    ) -> Result<Page<DuplicateGroup>> {
        let inner = self.inner.read().await;
        let matching: Vec<&DuplicateGroup> =
            inner.groups.iter().filter(|g| g.statut == statut).collect();
        let total = matching.len() as u64;
        let offset = page.saturating_sub(1) * limit;
        let data = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(data, total, limit))
    }

    async fn set_group_status(&self, id: Uuid, statut: GroupStatus) -> Result<DuplicateGroup> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| AppError::GroupNotFound { id: id.to_string() })?;
        group.statut = statut;
        Ok(group.clone())
    }

    async fn delete_group(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.groups.len();
        inner.groups.retain(|g| g.id != id);
        Ok(inner.groups.len() < before)
    }

    async fn add_ignored_signature(&self, signature: &str) -> Result<IgnoredSignature> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.ignored.iter().find(|i| i.signature == signature) {
            return Ok(existing.clone());
        }
        let entry = IgnoredSignature {
            id: Uuid::new_v4(),
            signature: signature.to_string(),
            date_ignore: Utc::now(),
        };
        inner.ignored.push(entry.clone());
        Ok(entry)
    }

    async fn list_ignored_signatures(&self) -> Result<Vec<IgnoredSignature>> {
        let inner = self.inner.read().await;
        Ok(inner.ignored.clone())
    }

    async fn ignored_signature_set(&self) -> Result<HashSet<String>> {
        let inner = self.inner.read().await;
        Ok(inner.ignored.iter().map(|i| i.signature.clone()).collect())
    }

    async fn delete_ignored_signature(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.ignored.len();
        inner.ignored.retain(|i| i.id != id);
        Ok(inner.ignored.len() < before)
    }

    async fn delete_ignored_by_signature(&self, signature: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.ignored.len();
        inner.ignored.retain(|i| i.signature != signature);
        Ok(inner.ignored.len() < before)
    }

    async fn save_scan_job(&self, snapshot: &ScanSnapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.scan_jobs.insert(snapshot.job_id, snapshot.clone());
        Ok(())
    }

    async fn load_scan_job(&self, job_id: Uuid) -> Result<Option<ScanSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.scan_jobs.get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signature;

    fn student(nom: &str, prenom: &str, dossiers: i64) -> Student {
        let mut s = Student::new(nom, prenom);
        s.dossiers_count = dossiers;
        s
    }

    async fn seeded_store(students: &[Student]) -> MemStore {
        let store = MemStore::new();
        store.seed_students(students.to_vec()).await;
        store
    }

    fn members_of(students: &[&Student]) -> Vec<GroupMember> {
        students.iter().map(|s| GroupMember::from(*s)).collect()
    }

    #[tokio::test]
    async fn test_merge_moves_dossiers_and_deactivates() {
        let master = student("Rakoto", "Jean", 3);
        let loser = student("Rakoto", "Jeannot", 2);
        let store = seeded_store(&[master.clone(), loser.clone()]).await;

        let patch = StudentPatch {
            email: Some("jean@univ.example".into()),
            ..Default::default()
        };
        let merged = store
            .merge_students(master.id, &[loser.id], &patch)
            .await
            .unwrap();

        assert_eq!(merged.dossiers_count, 5);
        assert_eq!(merged.email.as_deref(), Some("jean@univ.example"));
        assert!(store.find_student(loser.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remerge_fails_with_record_not_found() {
        let master = student("Rabe", "Noro", 1);
        let loser = student("Rabe", "Norosoa", 0);
        let store = seeded_store(&[master.clone(), loser.clone()]).await;

        store
            .merge_students(master.id, &[loser.id], &StudentPatch::default())
            .await
            .unwrap();

        // Second call reusing a collapsed id must fail cleanly
        let err = store
            .merge_students(master.id, &[loser.id], &StudentPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RecordNotFound { .. }));

        // Master unaffected by the failing call
        let survivor = store.find_student(master.id).await.unwrap().unwrap();
        assert_eq!(survivor.dossiers_count, 1);
    }

    #[tokio::test]
    async fn test_merge_validates_before_mutating() {
        let master = student("Andria", "Feno", 2);
        let loser = student("Andria", "Fenosoa", 1);
        let ghost = Uuid::new_v4();
        let store = seeded_store(&[master.clone(), loser.clone()]).await;

        let err = store
            .merge_students(master.id, &[loser.id, ghost], &StudentPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RecordNotFound { .. }));

        // Nothing changed: the valid loser is still active
        assert!(store.find_student(loser.id).await.unwrap().is_some());
        let untouched = store.find_student(master.id).await.unwrap().unwrap();
        assert_eq!(untouched.dossiers_count, 2);
    }

    #[tokio::test]
    async fn test_group_shrink_to_singleton_is_dropped() {
        let a = student("Razaf", "Hery", 2);
        let b = student("Razaf", "Hery", 1);
        let c = student("Razaf", "Herinirina", 0);
        let store = seeded_store(&[a.clone(), b.clone(), c.clone()]).await;

        let sig = signature(&[a.id, b.id, c.id]);
        store
            .upsert_group(&sig, members_of(&[&a, &b, &c]), 85.0)
            .await
            .unwrap();

        store
            .merge_students(a.id, &[b.id, c.id], &StudentPatch::default())
            .await
            .unwrap();

        // One surviving member is no longer a duplicate group
        let page = store.list_groups(GroupStatus::Detecte, 1, 10).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn test_group_with_enough_members_survives_pruning() {
        let a = student("Rasolo", "Mamy", 2);
        let b = student("Rasolo", "Mamy", 1);
        let c = student("Rasolo", "Mamisoa", 0);
        let d = student("Rasolo", "Mamy", 0);
        let store = seeded_store(&[a.clone(), b.clone(), c.clone(), d.clone()]).await;

        let sig = signature(&[a.id, b.id, c.id, d.id]);
        store
            .upsert_group(&sig, members_of(&[&a, &b, &c, &d]), 80.0)
            .await
            .unwrap();

        store
            .merge_students(a.id, &[b.id], &StudentPatch::default())
            .await
            .unwrap();

        let page = store.list_groups(GroupStatus::Detecte, 1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].students.len(), 3);
    }

    #[tokio::test]
    async fn test_pagination_consistency() {
        let store = MemStore::new();
        let mut students = Vec::new();
        for i in 0..25 {
            students.push(student("Nom", &format!("Prenom{}", i), 0));
        }
        store.seed_students(students.clone()).await;

        for chunk in students.chunks(2) {
            if let [a, b] = chunk {
                let sig = signature(&[a.id, b.id]);
                store
                    .upsert_group(&sig, members_of(&[a, b]), 75.0)
                    .await
                    .unwrap();
            }
        }

        let page1 = store.list_groups(GroupStatus::Detecte, 1, 10).await.unwrap();
        let page2 = store.list_groups(GroupStatus::Detecte, 2, 10).await.unwrap();
        assert_eq!(page1.total, 12);
        assert_eq!(page2.total, page1.total);
        assert_eq!(page1.pages, 2);
        assert_eq!(page1.data.len(), 10);
        assert_eq!(page2.data.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_group_is_idempotent_by_signature() {
        let a = student("Raj", "Ony", 0);
        let b = student("Raj", "Ony", 0);
        let store = seeded_store(&[a.clone(), b.clone()]).await;

        let sig = signature(&[a.id, b.id]);
        let first = store
            .upsert_group(&sig, members_of(&[&a, &b]), 90.0)
            .await
            .unwrap();
        let second = store
            .upsert_group(&sig, members_of(&[&a, &b]), 95.0)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.score, 90.0);
    }

    #[tokio::test]
    async fn test_ignored_signature_idempotent_and_deletable() {
        let store = MemStore::new();
        let sig = signature(&[Uuid::new_v4(), Uuid::new_v4()]);

        let first = store.add_ignored_signature(&sig).await.unwrap();
        let second = store.add_ignored_signature(&sig).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_ignored_signatures().await.unwrap().len(), 1);

        assert!(store.delete_ignored_by_signature(&sig).await.unwrap());
        assert!(store.ignored_signature_set().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_job_checkpoint_round_trip() {
        let store = MemStore::new();
        let job_id = Uuid::new_v4();
        let mut snapshot = ScanSnapshot::starting(job_id);
        snapshot.current_index = 40;
        snapshot.total = 100;
        snapshot.progress = 40.0;

        store.save_scan_job(&snapshot).await.unwrap();
        let loaded = store.load_scan_job(job_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_index, 40);
        assert!(store.load_scan_job(Uuid::new_v4()).await.unwrap().is_none());
    }
}
