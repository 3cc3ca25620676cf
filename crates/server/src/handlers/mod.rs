//! API handlers module

pub mod groups;
pub mod health;
pub mod ignored;
pub mod merge;
pub mod scan;
pub mod students;

use serde::Serialize;

/// Plain acknowledgement body for mutating endpoints without a richer
/// response
#[derive(Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
