// src/middleware.rs
use crate::{JobPayload, Lifecycle, LockStore, Locks, RedisStore, Result, UniqueJobsError, UniqueOptions};
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// Wires both interceptors to one lock store.
#[derive(Clone)]
pub struct UniqueJobs {
    lifecycle: Lifecycle,
}

impl UniqueJobs {
    pub fn new(store: Arc<dyn LockStore>, options: &UniqueOptions) -> Self {
        Self {
            lifecycle: Lifecycle::new(Locks::new(store, options.key_prefix.clone())),
        }
    }

    /// Connect to the Redis store named in `options`.
    pub async fn connect(options: &UniqueOptions) -> Result<Self> {
        let store = RedisStore::new(options).await?;
        Ok(Self::new(Arc::new(store), options))
    }

    pub fn enqueue_interceptor(&self) -> EnqueueInterceptor {
        EnqueueInterceptor {
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn execution_interceptor(&self) -> ExecutionInterceptor {
        ExecutionInterceptor {
            lifecycle: self.lifecycle.clone(),
        }
    }
}

/// Producer-side hook, run once per submission before the job reaches the
/// transport.
#[derive(Clone)]
pub struct EnqueueInterceptor {
    lifecycle: Lifecycle,
}

impl EnqueueInterceptor {
    /// Hand `payload` to `next` unless it is a duplicate of a queued job.
    /// `Ok(None)` means the job was dropped and `next` never ran.
    pub async fn call<F, Fut, T>(&self, payload: JobPayload, queue: &str, next: F) -> Result<Option<T>>
    where
        F: FnOnce(JobPayload) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match payload.unique_for.clone() {
            Some(cfg) if !cfg.is_inert() => self.lifecycle.if_enqueueable(payload, &cfg, next).await,
            _ => {
                trace!(class = %payload.class, queue, "no uniqueness declared, passing through");
                next(payload).await.map(Some)
            }
        }
    }
}

/// Worker-side hook, run once per dequeue before the job body.
#[derive(Clone)]
pub struct ExecutionInterceptor {
    lifecycle: Lifecycle,
}

impl ExecutionInterceptor {
    /// Run `next` unless an equivalent job is already running.
    /// `Ok(None)` means the job was skipped and should count as handled.
    pub async fn call<F, Fut, T>(&self, payload: &JobPayload, queue: &str, next: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cfg = match &payload.unique_for {
            Some(cfg) if !cfg.is_inert() => cfg,
            _ => {
                trace!(class = %payload.class, queue, "no uniqueness declared, passing through");
                return next().await.map(Some);
            }
        };
        let key = payload
            .unique_key
            .as_deref()
            .ok_or(UniqueJobsError::MissingField("unique_key"))?;

        self.lifecycle.release_enqueue(key).await?;
        self.lifecycle.if_runnable(key, cfg, next).await
    }
}
