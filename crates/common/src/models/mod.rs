//! Domain models
//!
//! Wire-level and in-memory types for the duplicate detection core

mod group;
mod merge;
mod page;
mod scan;
mod student;

pub use group::{
    default_master, signature, DuplicateGroup, GroupAction, GroupMember, GroupStatus,
    IgnoredSignature,
};
pub use merge::MergeRequest;
pub use page::Page;
pub use scan::{ScanSnapshot, ScanStatus};
pub use student::{Student, StudentPatch};
