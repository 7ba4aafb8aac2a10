// src/registry.rs
use crate::{Job, JobContext, JobPayload, Result, UniqueFor, UniqueJobsError};
use serde_json::Value;
use std::collections::HashMap;

/// Registry for job types: how to run each class and what uniqueness it
/// declares.
#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Registration>,
}

struct Registration {
    queue: &'static str,
    unique_for: Option<UniqueFor>,
    executor: Box<dyn JobExecutor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job type
    pub fn register<T: Job>(&mut self) -> &mut Self {
        self.jobs.insert(
            T::name().to_string(),
            Registration {
                queue: T::queue_name(),
                unique_for: T::unique_for(),
                executor: Box::new(TypedJobExecutor::<T>::new()),
            },
        );
        self
    }

    /// Declared uniqueness for a registered class
    pub fn unique_for(&self, name: &str) -> Option<&UniqueFor> {
        self.jobs.get(name).and_then(|r| r.unique_for.as_ref())
    }

    /// Build a payload for a registered class from raw arguments, carrying
    /// the class's queue and uniqueness declaration.
    pub fn payload(&self, name: &str, args: Vec<Value>) -> Result<JobPayload> {
        let registration = self.lookup(name)?;
        let mut payload = JobPayload::new(name, args).on_queue(registration.queue);
        payload.unique_for = registration.unique_for.clone();
        Ok(payload)
    }

    /// Execute a job body from its payload
    pub async fn execute_job(&self, ctx: &JobContext) -> Result<()> {
        self.lookup(&ctx.payload.class)?.executor.execute(ctx).await
    }

    fn lookup(&self, name: &str) -> Result<&Registration> {
        self.jobs
            .get(name)
            .ok_or_else(|| UniqueJobsError::Registry(format!("Job type '{}' not registered", name)))
    }
}

#[async_trait::async_trait]
trait JobExecutor: Send + Sync {
    async fn execute(&self, ctx: &JobContext) -> Result<()>;
}

struct TypedJobExecutor<T: Job> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Job> TypedJobExecutor<T> {
    fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T: Job> JobExecutor for TypedJobExecutor<T> {
    async fn execute(&self, ctx: &JobContext) -> Result<()> {
        let job: T = ctx.payload.decode()?;
        job.perform(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppContext;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct Echo(String);

    #[async_trait::async_trait]
    impl Job for Echo {
        async fn perform(&self, ctx: &JobContext) -> Result<()> {
            let seen = ctx.app::<Seen>().expect("app context");
            seen.0.lock().unwrap().push(self.0.clone());
            Ok(())
        }
        fn name() -> &'static str {
            "Echo"
        }
        fn queue_name() -> &'static str {
            "echo"
        }
        fn unique_for() -> Option<UniqueFor> {
            UniqueFor::running(5.0).ok()
        }
    }

    #[derive(Clone, Default)]
    struct Seen(Arc<std::sync::Mutex<Vec<String>>>);

    impl AppContext for Seen {
        fn clone_context(&self) -> Arc<dyn AppContext> {
            Arc::new(self.clone())
        }
    }

    #[tokio::test]
    async fn payload_for_registered_class_carries_declaration() {
        let mut registry = JobRegistry::new();
        registry.register::<Echo>();

        let payload = registry.payload("Echo", vec![json!("hi")]).unwrap();
        assert_eq!(payload.queue, "echo");
        assert_eq!(payload.unique_for.as_ref(), registry.unique_for("Echo"));
        assert!(registry.payload("Nope", vec![]).is_err());
    }

    #[tokio::test]
    async fn executes_by_class_name() {
        let mut registry = JobRegistry::new();
        registry.register::<Echo>();
        let seen = Seen::default();

        let payload = registry.payload("Echo", vec![json!("hi")]).unwrap();
        let ctx = JobContext::new(payload, Arc::new(seen.clone()));
        registry.execute_job(&ctx).await.unwrap();
        assert_eq!(*seen.0.lock().unwrap(), vec!["hi".to_string()]);

        let unknown = JobContext::new(JobPayload::new("Nope", vec![]), Arc::new(seen));
        assert!(matches!(
            registry.execute_job(&unknown).await,
            Err(UniqueJobsError::Registry(_))
        ));
    }
}
