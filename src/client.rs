// src/client.rs
use crate::{EnqueueInterceptor, Job, JobId, JobPayload, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::info;

/// The host's transport: whatever actually puts a payload on a queue or
/// into its delayed set.
#[async_trait::async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, payload: JobPayload) -> Result<()>;
}

/// Producer-side entry point: every submission goes through the enqueue
/// interceptor before reaching the transport.
pub struct Client<D: Dispatch> {
    dispatch: D,
    interceptor: EnqueueInterceptor,
}

impl<D: Dispatch> Client<D> {
    pub fn new(dispatch: D, interceptor: EnqueueInterceptor) -> Self {
        Self {
            dispatch,
            interceptor,
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatch
    }

    /// Enqueue a job for immediate execution. `None` if it was dropped as a
    /// duplicate.
    pub async fn enqueue<T: Job>(&self, job: &T) -> Result<Option<JobId>> {
        self.push(JobPayload::from_job(job)?).await
    }

    /// Schedule a job for delivery after `delay`.
    pub async fn enqueue_in<T: Job>(&self, job: &T, delay: Duration) -> Result<Option<JobId>> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| crate::UniqueJobsError::Config(format!("delay out of range: {e}")))?;
        self.push(JobPayload::from_job(job)?.scheduled_at(Utc::now() + delay))
            .await
    }

    /// Enqueue several jobs of one type, each checked on its own.
    pub async fn enqueue_bulk<T: Job>(&self, jobs: &[T]) -> Result<Vec<Option<JobId>>> {
        let mut ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            ids.push(self.enqueue(job).await?);
        }
        Ok(ids)
    }

    /// Submit a prepared payload. Hosts also use this to re-submit scheduled
    /// jobs when they come due and to re-enqueue retries.
    pub async fn push(&self, payload: JobPayload) -> Result<Option<JobId>> {
        let queue = payload.queue.clone();
        let class = payload.class.clone();
        let pushed = self
            .interceptor
            .call(payload, &queue, |payload| async move {
                let jid = payload.jid.clone();
                self.dispatch.dispatch(payload).await?;
                Ok(jid)
            })
            .await?;

        if let Some(jid) = &pushed {
            info!(%jid, %class, %queue, "job enqueued");
        }
        Ok(pushed)
    }
}
