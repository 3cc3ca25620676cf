//! Client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or protocol failure before a server verdict was received
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Structured error returned by the server
    #[error("API error {status} [{code}]: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Server no longer knows the job we tried to resume; the local
    /// reference should be dropped and a fresh scan started
    pub fn is_job_not_found(&self) -> bool {
        matches!(self, ClientError::Api { code, .. } if code == "JOB_NOT_FOUND")
    }

    /// Transient failures worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}
