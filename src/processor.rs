// src/processor.rs
use crate::{AppContext, ExecutionInterceptor, JobContext, JobPayload, JobRegistry, Result};
use std::sync::Arc;
use tracing::{Instrument, error, info};

/// What happened to a dequeued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// An equivalent job held the run lock; treat as handled.
    Skipped,
}

/// Worker-side entry point: runs a dequeued payload through the execution
/// interceptor and then the registered job body.
pub struct Processor {
    registry: Arc<JobRegistry>,
    interceptor: ExecutionInterceptor,
    app_context: Arc<dyn AppContext>,
}

impl Processor {
    pub fn new(
        registry: Arc<JobRegistry>,
        interceptor: ExecutionInterceptor,
        app_context: Arc<dyn AppContext>,
    ) -> Self {
        Self {
            registry,
            interceptor,
            app_context,
        }
    }

    /// Errors (job failures, timeouts, store failures) are returned to the
    /// host for its retry handling.
    pub async fn process(&self, payload: JobPayload) -> Result<Outcome> {
        let ctx = JobContext::new(payload, self.app_context.clone_context());
        let span = ctx.span.clone();
        let start_time = std::time::Instant::now();

        let result = self
            .interceptor
            .call(&ctx.payload, &ctx.payload.queue, || self.registry.execute_job(&ctx))
            .instrument(span)
            .await;

        match result {
            Ok(Some(())) => {
                info!(jid = %ctx.job_id, elapsed = ?start_time.elapsed(), "job completed");
                Ok(Outcome::Completed)
            }
            Ok(None) => Ok(Outcome::Skipped),
            Err(e) => {
                error!(jid = %ctx.job_id, error = %e, "job failed");
                Err(e)
            }
        }
    }
}
