// src/context.rs
use crate::{JobId, JobPayload};
use std::sync::Arc;
use tracing::Span;

/// Application context containing shared resources
pub trait AppContext: AsAny + Send + Sync + 'static {
    /// Clone the context for use in another task
    fn clone_context(&self) -> Arc<dyn AppContext>;
}

/// Context provided to job execution
pub struct JobContext {
    pub job_id: JobId,
    pub payload: JobPayload,
    pub app_context: Arc<dyn AppContext>,
    pub span: Span,
}

impl JobContext {
    pub fn new(payload: JobPayload, app_context: Arc<dyn AppContext>) -> Self {
        let span = tracing::info_span!(
            "job_execution",
            jid = %payload.jid,
            class = %payload.class,
            queue = %payload.queue,
            unique_key = payload.unique_key.as_deref().unwrap_or(""),
        );

        Self {
            job_id: payload.jid.clone(),
            payload,
            app_context,
            span,
        }
    }

    /// Get typed app context
    pub fn app<T: AppContext>(&self) -> Option<&T> {
        self.app_context.as_ref().as_any().downcast_ref::<T>()
    }
}

// Helper trait for downcasting
pub trait AsAny {
    fn as_any(&self) -> &dyn std::any::Any;
}

impl<T: AppContext> AsAny for T {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
