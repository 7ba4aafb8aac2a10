// src/lifecycle.rs
//! Enqueue-lock and run-lock handling around a job's lifecycle.
//!
//! ```text
//! submit ──► [queued > 0?] ──► acquire q ──► dispatch
//!                                  └─ held ──► drop (silent)
//! dequeue ─► release q ─► [running > 0?] ─► acquire r ─► body (deadline?) ─► release r
//!                                               └─ held ─► skip (handled)
//! ```

use crate::fingerprint::ensure_unique_key;
use crate::{JobPayload, LockKind, Locks, Result, UniqueFor, UniqueJobsError};
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Lock lifecycle engine. Stateless apart from the lock store handle, so it
/// is shared freely between the enqueue and execution interceptors.
#[derive(Clone)]
pub struct Lifecycle {
    locks: Locks,
}

impl Lifecycle {
    pub fn new(locks: Locks) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &Locks {
        &self.locks
    }

    /// Pre-enqueue step. Derives the fingerprint, applies the
    /// scheduled-job exception and, when an enqueue lock is configured,
    /// only calls `dispatch` if that lock could be taken.
    ///
    /// Returns `Ok(None)` when the job was dropped as a duplicate.
    #[instrument(skip_all, fields(class = %payload.class, jid = %payload.jid))]
    pub async fn if_enqueueable<F, Fut, T>(
        &self,
        mut payload: JobPayload,
        cfg: &UniqueFor,
        dispatch: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(JobPayload) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = ensure_unique_key(&mut payload)?.to_string();

        let use_lock = if payload.is_scheduled() {
            // Being scheduled now; the host will re-submit it when due.
            payload.unique_scheduled = Some(true);
            true
        } else if payload.unique_scheduled == Some(true) {
            // The scheduled job coming due: its enqueue lock is already ours.
            payload.unique_scheduled = Some(false);
            debug!(unique_key = %key, "scheduled job due, skipping enqueue lock");
            false
        } else {
            true
        };

        if use_lock
            && !cfg.queued.is_zero()
            && !self
                .locks
                .try_acquire(LockKind::Enqueue, &key, cfg.queued)
                .await?
        {
            info!(unique_key = %key, "duplicate job already queued, dropping");
            return Ok(None);
        }

        dispatch(payload).await.map(Some)
    }

    /// Pre-execution step: the job has left the queue, so its enqueue lock
    /// is given up whatever happens next.
    pub(crate) async fn release_enqueue(&self, key: &str) -> Result<()> {
        self.locks.release(LockKind::Enqueue, key).await
    }

    /// Run `body` under the run lock, if one is configured.
    ///
    /// Returns `Ok(None)` when an equivalent instance holds the run lock.
    /// With `timeout` set the body is cancelled after `running` and
    /// [`UniqueJobsError::Timeout`] is returned. The run lock is released on
    /// every exit path, including panics and cancellation of this future.
    #[instrument(skip_all, fields(unique_key = %key))]
    pub async fn if_runnable<F, Fut, T>(&self, key: &str, cfg: &UniqueFor, body: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cfg.running.is_zero() {
            return body().await.map(Some);
        }

        if !self.locks.try_acquire(LockKind::Run, key, cfg.running).await? {
            info!("duplicate job already running, skipping");
            return Ok(None);
        }

        let guard = RunLockGuard {
            locks: Some(self.locks.clone()),
            key: key.to_string(),
        };

        let outcome = match cfg.deadline() {
            Some(after) => match tokio::time::timeout(after, body()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?after, "job exceeded its run lock, aborted");
                    Err(UniqueJobsError::Timeout {
                        key: key.to_string(),
                        after,
                    })
                }
            },
            None => body().await,
        };

        let released = guard.release().await;
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(Some(value)),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(error = %release_err, "run lock release failed after job error");
                Err(e)
            }
        }
    }
}

/// Releases the run lock if the holding future unwinds or is dropped before
/// reaching the explicit release.
struct RunLockGuard {
    locks: Option<Locks>,
    key: String,
}

impl RunLockGuard {
    async fn release(mut self) -> Result<()> {
        let result = match &self.locks {
            Some(locks) => locks.release(LockKind::Run, &self.key).await,
            None => Ok(()),
        };
        self.locks = None;
        result
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        let Some(locks) = self.locks.take() else {
            return;
        };
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = locks.release(LockKind::Run, &key).await {
                        warn!(unique_key = %key, error = %e, "deferred run lock release failed");
                    }
                });
            }
            Err(_) => warn!(unique_key = %key, "no runtime to release run lock, leaving it to expire"),
        }
    }
}
