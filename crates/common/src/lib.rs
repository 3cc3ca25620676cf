//! Doublons Common Library
//!
//! Shared code for the duplicate-student services including:
//! - Domain models (groups, scans, merges, signatures)
//! - Store trait with in-memory and Postgres implementations
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use store::{MemStore, SharedStore, Store};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Separator between sorted member ids in a group signature
pub const SIGNATURE_SEPARATOR: &str = "|";
