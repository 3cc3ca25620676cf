//! Pagination envelope

use serde::{Deserialize, Serialize};

/// One page of a listing; pagination is 1-indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, limit: u64) -> Self {
        Self {
            data,
            total,
            pages: pages_for(total, limit),
        }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            pages: 0,
        }
    }
}

/// `ceil(total / limit)`, with a zero limit treated as one page
pub fn pages_for(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return if total > 0 { 1 } else { 0 };
    }
    total.div_ceil(limit)
}
