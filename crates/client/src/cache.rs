//! Versioned local cache
//!
//! Persists the two client-side hints that survive a reload: the job id
//! of an in-flight scan, and the signatures already handled this
//! session. Both are caches, never sources of truth; server state wins
//! on any conflict. A version bump invalidates the whole file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::Result;

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheState {
    version: u32,
    active_job: Option<Uuid>,
    handled_signatures: Vec<String>,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            active_job: None,
            handled_signatures: Vec::new(),
        }
    }
}

pub struct LocalCache {
    path: PathBuf,
    state: CacheState,
}

impl LocalCache {
    /// Load the cache from disk. A missing file, unreadable content, or
    /// a version mismatch all start from a clean state rather than
    /// failing the workflow.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CacheState>(&raw) {
                Ok(state) if state.version == CACHE_VERSION => state,
                Ok(state) => {
                    debug!(
                        found = state.version,
                        expected = CACHE_VERSION,
                        "Cache version mismatch, starting clean"
                    );
                    CacheState::default()
                }
                Err(e) => {
                    warn!(error = %e, "Unreadable cache file, starting clean");
                    CacheState::default()
                }
            },
            Err(_) => CacheState::default(),
        };
        Self { path, state }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.state)?)?;
        Ok(())
    }

    pub fn active_job(&self) -> Option<Uuid> {
        self.state.active_job
    }

    pub fn set_active_job(&mut self, job_id: Option<Uuid>) -> Result<()> {
        self.state.active_job = job_id;
        self.persist()
    }

    /// Record a signature as handled this session (merged or dismissed
    /// locally). Idempotent.
    pub fn remember_handled(&mut self, signature: &str) -> Result<()> {
        if !self
            .state
            .handled_signatures
            .iter()
            .any(|s| s == signature)
        {
            self.state.handled_signatures.push(signature.to_string());
        }
        self.persist()
    }

    pub fn handled_signatures(&self) -> HashSet<String> {
        self.state.handled_signatures.iter().cloned().collect()
    }

    /// Drop the session history, typically after a full refresh proved
    /// the server no longer lists any of it
    pub fn clear_handled(&mut self) -> Result<()> {
        self.state.handled_signatures.clear();
        self.persist()
    }

    /// Keep only the handled signatures still present in `keep`
    pub fn retain_handled(&mut self, keep: &HashSet<String>) -> Result<()> {
        self.state.handled_signatures.retain(|s| keep.contains(s));
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doublons-cache.json");

        let job = Uuid::new_v4();
        {
            let mut cache = LocalCache::load(&path);
            assert_eq!(cache.active_job(), None);
            cache.set_active_job(Some(job)).unwrap();
            cache.remember_handled("a|b").unwrap();
            cache.remember_handled("a|b").unwrap();
        }

        let cache = LocalCache::load(&path);
        assert_eq!(cache.active_job(), Some(job));
        assert_eq!(cache.handled_signatures().len(), 1);
        assert!(cache.handled_signatures().contains("a|b"));
    }

    #[test]
    fn test_version_mismatch_starts_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doublons-cache.json");
        fs::write(
            &path,
            r#"{"version": 0, "active_job": null, "handled_signatures": ["x|y"]}"#,
        )
        .unwrap();

        let cache = LocalCache::load(&path);
        assert!(cache.handled_signatures().is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doublons-cache.json");
        fs::write(&path, "not json at all").unwrap();

        let cache = LocalCache::load(&path);
        assert_eq!(cache.active_job(), None);
    }
}
