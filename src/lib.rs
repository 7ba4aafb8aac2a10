// src/lib.rs
//! unique-jobs: enqueue and run locks for Redis-backed job queues.
//!
//! Each job is fingerprinted from its class and (optionally reduced)
//! arguments. An enqueue lock keeps a second copy out of the queue while
//! one is waiting; a run lock keeps a second copy from starting while one
//! is executing, optionally killing runs that outlive the lock. Both are
//! plain `SET NX PX` keys, so any process sharing the store sees them.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod job;
pub mod lifecycle;
pub mod lock;
pub mod middleware;
pub mod processor;
pub mod registry;
pub mod store;

pub use client::{Client, Dispatch};
pub use config::{UniqueFor, UniqueOn, UniqueOptions};
pub use context::{AppContext, JobContext};
pub use error::{Result, UniqueJobsError};
pub use fingerprint::{ensure_unique_key, fingerprint};
pub use job::{Job, JobId, JobPayload};
pub use lifecycle::Lifecycle;
pub use lock::{LockKind, Locks};
pub use middleware::{EnqueueInterceptor, ExecutionInterceptor, UniqueJobs};
pub use processor::{Outcome, Processor};
pub use registry::JobRegistry;
pub use store::{LockStore, MemoryStore, RedisStore};

// Re-export commonly used types
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
