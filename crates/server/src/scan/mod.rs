//! Scan Job Controller
//!
//! Runs duplicate detection over the full student population as a
//! background task: cancellable (cooperative, pauses at the next block
//! boundary), resumable from the last checkpoint, progress-reporting.
//! Job snapshots are persisted through the store keyed by job id, so a
//! paused job survives a restart of the server.

pub mod engine;

pub use engine::{CandidateGroup, NameSimilarity, SimilarityEngine};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use doublons_common::config::ScanConfig;
use doublons_common::errors::{AppError, Result};
use doublons_common::metrics::record_scan;
use doublons_common::models::{signature, DuplicateGroup, GroupMember, ScanSnapshot, ScanStatus};
use doublons_common::{SharedStore, Store};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// One live scan job
pub struct ScanRun {
    pub job_id: Uuid,
    pause_requested: AtomicBool,
    snapshot: Mutex<ScanSnapshot>,
}

impl ScanRun {
    fn new(initial: ScanSnapshot) -> Self {
        Self {
            job_id: initial.job_id,
            pause_requested: AtomicBool::new(false),
            snapshot: Mutex::new(initial),
        }
    }

    fn with_snapshot<R>(&self, f: impl FnOnce(&mut ScanSnapshot) -> R) -> R {
        // A panicked writer leaves a consistent snapshot behind, so
        // poisoning is recoverable
        let mut guard = match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Point-in-time copy of the job state
    pub fn snapshot(&self) -> ScanSnapshot {
        self.with_snapshot(|s| s.clone())
    }

    fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    fn set_total(&self, total: u64) {
        self.with_snapshot(|s| s.total = total);
    }

    /// Record block completion; progress never regresses
    fn advance(&self, processed: u64) {
        self.with_snapshot(|s| {
            s.current_index = s.current_index.max(processed);
            let progress = if s.total == 0 {
                100.0
            } else {
                (s.current_index as f32 / s.total as f32) * 100.0
            };
            s.progress = s.progress.max(progress);
        });
    }

    /// Append a newly found group; the result list is append-only
    fn push_group(&self, group: DuplicateGroup) {
        self.with_snapshot(|s| {
            s.result.push(group);
            s.found_count += 1;
        });
    }

    fn has_found(&self, sig: &str) -> bool {
        self.with_snapshot(|s| s.result.iter().any(|g| g.signature == sig))
    }

    fn mark_paused(&self) {
        self.with_snapshot(|s| s.status = ScanStatus::Paused);
    }

    fn complete(&self) {
        self.with_snapshot(|s| {
            s.status = ScanStatus::Completed;
            s.current_index = s.total;
            s.progress = 100.0;
        });
    }

    fn fail(&self, message: String) {
        self.with_snapshot(|s| {
            s.status = ScanStatus::Failed;
            s.error = Some(message);
        });
    }
}

struct ScanInner {
    store: SharedStore,
    engine: Arc<dyn SimilarityEngine>,
    config: ScanConfig,
    runs: RwLock<HashMap<Uuid, Arc<ScanRun>>>,
}

/// Command dispatcher + read model for scan jobs
#[derive(Clone)]
pub struct ScanManager {
    inner: Arc<ScanInner>,
}

impl ScanManager {
    pub fn new(store: SharedStore, engine: Arc<dyn SimilarityEngine>, config: ScanConfig) -> Self {
        Self {
            inner: Arc::new(ScanInner {
                store,
                engine,
                config,
                runs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Start a fresh scan, or resume a paused one from its checkpoint.
    /// Only one job may be processing at a time.
    #[instrument(skip(self))]
    pub async fn start(&self, resume: bool, job_id: Option<Uuid>) -> Result<Uuid> {
        let mut runs = self.inner.runs.write().await;

        if let Some(active) = runs
            .values()
            .find(|r| r.snapshot().status == ScanStatus::Processing)
        {
            return Err(AppError::ScanAlreadyRunning {
                job_id: active.job_id.to_string(),
            });
        }

        let initial = if resume {
            let job_id = job_id.ok_or_else(|| AppError::Validation {
                message: "job_id is required to resume".into(),
                field: Some("job_id".into()),
            })?;
            let prior = self.lookup(&runs, job_id).await?;
            if prior.status != ScanStatus::Paused {
                return Err(AppError::JobNotFound {
                    id: job_id.to_string(),
                });
            }
            info!(job_id = %job_id, current_index = prior.current_index, "Resuming paused scan");
            ScanSnapshot {
                status: ScanStatus::Processing,
                ..prior
            }
        } else {
            let snapshot = ScanSnapshot::starting(Uuid::new_v4());
            info!(job_id = %snapshot.job_id, "Starting fresh scan");
            snapshot
        };

        let run = Arc::new(ScanRun::new(initial));
        let started = run.job_id;
        runs.insert(started, run.clone());
        drop(runs);

        let inner = self.inner.clone();
        tokio::spawn(async move {
            drive(inner, run).await;
        });

        Ok(started)
    }

    /// Current snapshot for a job id; `unknown` when the id is not
    /// recognized. A processing checkpoint with no live run means the
    /// server restarted mid-scan: reported as `paused` so it can resume.
    pub async fn status(&self, job_id: Uuid) -> Result<ScanSnapshot> {
        let runs = self.inner.runs.read().await;
        self.lookup(&runs, job_id).await
    }

    async fn lookup(
        &self,
        runs: &HashMap<Uuid, Arc<ScanRun>>,
        job_id: Uuid,
    ) -> Result<ScanSnapshot> {
        if let Some(run) = runs.get(&job_id) {
            return Ok(run.snapshot());
        }
        if let Some(mut snapshot) = self.inner.store.load_scan_job(job_id).await? {
            if snapshot.status == ScanStatus::Processing {
                snapshot.status = ScanStatus::Paused;
            }
            return Ok(snapshot);
        }
        Ok(ScanSnapshot::unknown(job_id))
    }

    /// Request cooperative cancellation. The job pauses at the next
    /// block boundary, not immediately; callers confirm via `status`.
    pub async fn stop(&self, job_id: Uuid) -> Result<()> {
        let runs = self.inner.runs.read().await;
        if let Some(run) = runs.get(&job_id) {
            run.request_pause();
            return Ok(());
        }
        if self.inner.store.load_scan_job(job_id).await?.is_some() {
            // Already checkpointed and not running; nothing to cancel
            return Ok(());
        }
        Err(AppError::JobNotFound {
            id: job_id.to_string(),
        })
    }
}

/// Run one job to a terminal-ish state and record metrics
async fn drive(inner: Arc<ScanInner>, run: Arc<ScanRun>) {
    let started = Instant::now();
    match run_scan(&inner, &run).await {
        Ok(()) => {
            let snapshot = run.snapshot();
            let outcome = match snapshot.status {
                ScanStatus::Paused => "paused",
                _ => "completed",
            };
            info!(
                job_id = %run.job_id,
                found_count = snapshot.found_count,
                outcome = outcome,
                "Scan finished"
            );
            record_scan(started.elapsed().as_secs_f64(), snapshot.found_count, outcome);
        }
        Err(e) => {
            error!(job_id = %run.job_id, error = %e, "Scan failed");
            run.fail(e.to_string());
            let snapshot = run.snapshot();
            if let Err(save_err) = inner.store.save_scan_job(&snapshot).await {
                warn!(job_id = %run.job_id, error = %save_err, "Failed to persist failed scan state");
            }
            record_scan(started.elapsed().as_secs_f64(), snapshot.found_count, "failed");
        }
    }
}

async fn run_scan(inner: &ScanInner, run: &ScanRun) -> Result<()> {
    let students = inner.store.list_students(0, i64::MAX as u64).await?;
    let ignored = inner.store.ignored_signature_set().await?;
    let mut known = inner.store.group_signatures().await?;

    run.set_total(students.len() as u64);
    inner.store.save_scan_job(&run.snapshot()).await?;

    let start_index = run.snapshot().current_index;
    let blocks = inner.engine.blocks(&students);
    let mut processed: u64 = 0;

    for block in blocks {
        let block_len = block.len() as u64;

        // Skip blocks fully covered by the checkpoint being resumed
        if processed + block_len <= start_index {
            processed += block_len;
            continue;
        }

        for candidate in inner.engine.scan_block(&block) {
            let sig = signature(&candidate.member_ids);
            if ignored.contains(&sig) || known.contains(&sig) || run.has_found(&sig) {
                continue;
            }
            let members: Vec<GroupMember> = candidate
                .member_ids
                .iter()
                .filter_map(|id| block.iter().find(|s| s.id == *id))
                .map(GroupMember::from)
                .collect();
            let group = inner
                .store
                .upsert_group(&sig, members, candidate.score)
                .await?;
            known.insert(sig);
            run.push_group(group);
        }

        processed += block_len;
        run.advance(processed);
        inner.store.save_scan_job(&run.snapshot()).await?;

        if run.pause_requested() {
            run.mark_paused();
            inner.store.save_scan_job(&run.snapshot()).await?;
            return Ok(());
        }

        if inner.config.block_throttle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(inner.config.block_throttle_ms)).await;
        }
    }

    run.complete();
    inner.store.save_scan_job(&run.snapshot()).await?;
    Ok(())
}
