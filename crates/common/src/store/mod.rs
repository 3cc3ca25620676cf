//! Persistence seam for the duplicate detection core
//!
//! The `Store` trait is the only path that mutates student records and
//! registry state. Two implementations:
//! - `MemStore`: in-process maps behind a RwLock, for tests and the
//!   `backend = "memory"` dev mode
//! - `PgStore`: SeaORM over Postgres, the production path

mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::{DbPool, PgStore};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{
    DuplicateGroup, GroupMember, GroupStatus, IgnoredSignature, Page, ScanSnapshot, Student,
    StudentPatch,
};

/// Shared handle to a store implementation
pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    // ========================================================================
    // Health
    // ========================================================================

    /// Ping the backing storage
    async fn ping(&self) -> Result<()>;

    // ========================================================================
    // Student records
    // ========================================================================

    /// Number of active student records
    async fn count_students(&self) -> Result<u64>;

    /// Active student records in stable id order
    async fn list_students(&self, offset: u64, limit: u64) -> Result<Vec<Student>>;

    /// Find an active student by id
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>>;

    /// Insert a new student record
    async fn insert_student(&self, student: Student) -> Result<Student>;

    /// Collapse `ids` into `master_id`: reassign dossiers to the master,
    /// apply the field overrides, deactivate the losers, and prune any
    /// registered group left with fewer than two members.
    ///
    /// Transactional: either everything succeeds or no record changes.
    /// Any missing or already-merged id fails the whole call with
    /// `RecordNotFound`.
    async fn merge_students(
        &self,
        master_id: Uuid,
        ids: &[Uuid],
        patch: &StudentPatch,
    ) -> Result<Student>;

    // ========================================================================
    // Duplicate group registry
    // ========================================================================

    /// Register a detected group, keyed by signature. Re-detection of an
    /// already-registered signature returns the existing group untouched.
    async fn upsert_group(
        &self,
        signature: &str,
        members: Vec<GroupMember>,
        score: f32,
    ) -> Result<DuplicateGroup>;

    async fn find_group(&self, id: Uuid) -> Result<Option<DuplicateGroup>>;

    async fn find_group_by_signature(&self, signature: &str) -> Result<Option<DuplicateGroup>>;

    /// Signatures of every registered group, regardless of status
    async fn group_signatures(&self) -> Result<HashSet<String>>;

    /// List groups with an exact status match; `page` is 1-indexed
    async fn list_groups(
        &self,
        statut: GroupStatus,
        page: u64,
        limit: u64,
    ) -> Result<Page<DuplicateGroup>>;

    async fn set_group_status(&self, id: Uuid, statut: GroupStatus) -> Result<DuplicateGroup>;

    async fn delete_group(&self, id: Uuid) -> Result<bool>;

    // ========================================================================
    // Ignored signatures (false-positive registry)
    // ========================================================================

    /// Record a signature as a confirmed false positive. Idempotent:
    /// re-ignoring an identical member set returns the existing entry.
    async fn add_ignored_signature(&self, signature: &str) -> Result<IgnoredSignature>;

    async fn list_ignored_signatures(&self) -> Result<Vec<IgnoredSignature>>;

    async fn ignored_signature_set(&self) -> Result<HashSet<String>>;

    async fn delete_ignored_signature(&self, id: Uuid) -> Result<bool>;

    async fn delete_ignored_by_signature(&self, signature: &str) -> Result<bool>;

    // ========================================================================
    // Scan job checkpoints
    // ========================================================================

    /// Persist a job snapshot keyed by job id (checkpoint or terminal state)
    async fn save_scan_job(&self, snapshot: &ScanSnapshot) -> Result<()>;

    /// Load the last persisted snapshot for a job id
    async fn load_scan_job(&self, job_id: Uuid) -> Result<Option<ScanSnapshot>>;
}
