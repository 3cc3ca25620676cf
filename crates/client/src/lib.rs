//! Doublons review client
//!
//! Client-side orchestration of the duplicate review workflow:
//! - `ApiClient`: typed REST client for the Doublons server
//! - `LocalCache`: versioned on-disk cache of the in-flight job id and
//!   the session's already-handled signatures
//! - `WorkflowController`: polling loop and reconciliation between
//!   server-authoritative groups and local optimistic state

pub mod api;
pub mod cache;
pub mod errors;
pub mod workflow;

pub use api::{ApiClient, MergeOutcome};
pub use cache::LocalCache;
pub use errors::{ClientError, Result};
pub use workflow::{default_merge_request, WorkflowController};
