//! Client workflow controller
//!
//! Drives the review session: resume-or-start a scan, poll it to a
//! terminal state with monotonic display updates, and keep the local
//! "to review" view reconciled against the server-authoritative group
//! list.

use std::collections::HashSet;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use doublons_common::models::{
    default_master, DuplicateGroup, GroupAction, GroupStatus, MergeRequest, ScanSnapshot,
    ScanStatus, StudentPatch,
};

use crate::api::{ApiClient, MergeOutcome};
use crate::cache::LocalCache;
use crate::errors::Result;

pub struct WorkflowController {
    api: ApiClient,
    cache: LocalCache,
    poll_interval: Duration,
}

impl WorkflowController {
    pub fn new(api: ApiClient, cache: LocalCache) -> Self {
        Self {
            api,
            cache,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Resume the cached job if the server still knows it, otherwise
    /// start fresh. A stale cached id is dropped, never an error.
    #[instrument(skip(self))]
    pub async fn start_or_resume(&mut self) -> Result<Uuid> {
        if let Some(cached) = self.cache.active_job() {
            match self.api.start_scan(true, Some(cached)).await {
                Ok(response) => {
                    self.cache.set_active_job(Some(response.job_id))?;
                    info!(job_id = %response.job_id, "Resumed paused scan");
                    return Ok(response.job_id);
                }
                Err(e) if e.is_job_not_found() => {
                    info!(job_id = %cached, "Cached job no longer known, starting fresh");
                    self.cache.set_active_job(None)?;
                }
                Err(e) => return Err(e),
            }
        }

        let response = self.api.start_scan(false, None).await?;
        self.cache.set_active_job(Some(response.job_id))?;
        info!(job_id = %response.job_id, "Started fresh scan");
        Ok(response.job_id)
    }

    /// Poll a job until it leaves `processing`. The observed snapshot
    /// never regresses even if responses arrive out of order, and
    /// `on_new_groups` fires whenever `found_count` grows so the caller
    /// can refresh its listing incrementally. Cancellable by dropping
    /// the future.
    pub async fn poll_until_terminal<F>(
        &mut self,
        job_id: Uuid,
        mut on_new_groups: F,
    ) -> Result<ScanSnapshot>
    where
        F: FnMut(&ScanSnapshot),
    {
        let mut view = ScanSnapshot::starting(job_id);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let incoming = self.fetch_status(job_id).await?;
            let seen = view.found_count;
            view.observe(incoming);
            if view.found_count > seen {
                on_new_groups(&view);
            }

            if view.status != ScanStatus::Processing {
                break;
            }
        }

        match view.status {
            // A finished or vanished job must not be resumed later
            ScanStatus::Completed | ScanStatus::Unknown | ScanStatus::Failed => {
                self.cache.set_active_job(None)?;
            }
            // Paused jobs keep their reference so the next visit resumes
            ScanStatus::Paused | ScanStatus::Stopped => {}
            ScanStatus::Processing => unreachable!("loop exits only on non-processing status"),
        }

        info!(job_id = %job_id, status = ?view.status, found_count = view.found_count, "Polling finished");
        Ok(view)
    }

    /// One status fetch with backoff over transient transport failures;
    /// a single failed tick never kills the polling loop
    async fn fetch_status(&self, job_id: Uuid) -> Result<ScanSnapshot> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(Duration::from_secs(15)))
            .build();

        backoff::future::retry(policy, || async {
            self.api.scan_status(job_id).await.map_err(|e| {
                if e.is_transient() {
                    warn!(job_id = %job_id, error = %e, "Status poll failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    /// Request cooperative cancellation and poll once more to confirm
    /// the job actually parked before reporting the snapshot
    pub async fn stop(&mut self, job_id: Uuid) -> Result<ScanSnapshot> {
        self.api.stop_scan(job_id).await?;
        self.poll_until_terminal(job_id, |_| {}).await
    }

    /// The "to treat" view: server-side DETECTE groups minus the
    /// signatures already handled this session. The server list is
    /// authoritative; the local set only hides optimistically-handled
    /// entries until the server catches up.
    pub async fn to_review(&self, page: u64, limit: u64) -> Result<Vec<DuplicateGroup>> {
        let listing = self.api.list_groups(GroupStatus::Detecte, page, limit).await?;
        let handled = self.cache.handled_signatures();
        Ok(listing
            .data
            .into_iter()
            .filter(|group| !handled.contains(&group.signature))
            .collect())
    }

    /// Full refresh reconciliation: recompute the displayed set from
    /// server state and drop local history entries for groups the
    /// server no longer lists (they were resolved for real)
    pub async fn reconcile(&mut self, limit: u64) -> Result<Vec<DuplicateGroup>> {
        let listing = self.api.list_groups(GroupStatus::Detecte, 1, limit).await?;
        let live: HashSet<String> = listing
            .data
            .iter()
            .map(|group| group.signature.clone())
            .collect();
        self.cache.retain_handled(&live)?;

        let handled = self.cache.handled_signatures();
        Ok(listing
            .data
            .into_iter()
            .filter(|group| !handled.contains(&group.signature))
            .collect())
    }

    /// Merge a reviewed group and record it as handled so it leaves the
    /// "to treat" view immediately, before the next refresh
    pub async fn merge_group(
        &mut self,
        group: &DuplicateGroup,
        request: MergeRequest,
    ) -> Result<MergeOutcome> {
        let outcome = self.api.merge(&request).await?;
        self.cache.remember_handled(&group.signature)?;
        Ok(outcome)
    }

    /// Dismiss a group as a false positive
    pub async fn dismiss_group(&mut self, group: &DuplicateGroup) -> Result<DuplicateGroup> {
        let updated = self.api.group_action(group.id, GroupAction::Ignore).await?;
        self.cache.remember_handled(&group.signature)?;
        Ok(updated)
    }
}

/// Pre-filled merge request for a group: master defaults to the member
/// with the most dossiers (ties break on listing order), everyone else
/// is merged away. Returns None for groups too small to merge.
pub fn default_merge_request(group: &DuplicateGroup) -> Option<MergeRequest> {
    let master_id = default_master(group)?;
    let ids_to_merge: Vec<Uuid> = group
        .students
        .iter()
        .map(|m| m.id)
        .filter(|id| *id != master_id)
        .collect();
    if ids_to_merge.is_empty() {
        return None;
    }
    Some(MergeRequest {
        master_id,
        ids_to_merge,
        overrides: StudentPatch::default(),
        group_id: Some(group.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doublons_common::models::{GroupMember, Student};

    fn member(dossiers: i64) -> GroupMember {
        GroupMember::from(&Student::new("Rakoto", "Jean")).with_dossiers(dossiers)
    }

    trait WithDossiers {
        fn with_dossiers(self, dossiers: i64) -> Self;
    }

    impl WithDossiers for GroupMember {
        fn with_dossiers(mut self, dossiers: i64) -> Self {
            self.dossiers_count = dossiers;
            self
        }
    }

    #[test]
    fn test_default_merge_request_picks_heaviest_master() {
        let a = member(1);
        let b = member(5);
        let group = DuplicateGroup {
            id: Uuid::new_v4(),
            signature: "a|b".to_string(),
            students: vec![a.clone(), b.clone()],
            score: 90.0,
            statut: GroupStatus::Detecte,
            detected_at: Utc::now(),
        };

        let request = default_merge_request(&group).unwrap();
        assert_eq!(request.master_id, b.id);
        assert_eq!(request.ids_to_merge, vec![a.id]);
        assert_eq!(request.group_id, Some(group.id));
    }

    #[test]
    fn test_default_merge_request_rejects_singleton() {
        let group = DuplicateGroup {
            id: Uuid::new_v4(),
            signature: "a".to_string(),
            students: vec![member(1)],
            score: 90.0,
            statut: GroupStatus::Detecte,
            detected_at: Utc::now(),
        };
        assert!(default_merge_request(&group).is_none());
    }
}
