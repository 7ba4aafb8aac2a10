// src/error.rs
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UniqueJobsError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fingerprint hashing failed: {0}")]
    Hash(#[source] std::io::Error),

    #[error("Job {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    #[error("Job payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Job execution failed: {0}")]
    JobExecution(#[from] anyhow::Error),
}

impl UniqueJobsError {
    /// True for the run-deadline error, so retry policies can treat it apart
    /// from ordinary job failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, UniqueJobsError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, UniqueJobsError>;
