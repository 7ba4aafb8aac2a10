use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use unique_jobs::{
    AppContext, Client, Dispatch, Job, JobContext, JobPayload, JobRegistry, Processor, Result,
    UniqueFor, UniqueJobs, UniqueOptions, async_trait,
};

#[derive(serde::Serialize, serde::Deserialize)]
struct ReindexJob {
    account_id: String,
}

#[async_trait]
impl Job for ReindexJob {
    async fn perform(&self, _ctx: &JobContext) -> Result<()> {
        println!("[ReindexJob] reindexing account_id={}", self.account_id);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }
    fn name() -> &'static str {
        "ReindexJob"
    }
    fn unique_for() -> Option<UniqueFor> {
        UniqueFor::queued(10.0)
            .and_then(|cfg| cfg.with_running(5.0))
            .map(UniqueFor::with_timeout)
            .ok()
    }
}

#[derive(Clone, Default)]
struct AppState;
impl AppContext for AppState {
    fn clone_context(&self) -> Arc<dyn AppContext> {
        Arc::new(self.clone())
    }
}

/// Channel standing in for the real queue transport.
struct ChannelDispatch(mpsc::UnboundedSender<JobPayload>);

#[async_trait]
impl Dispatch for ChannelDispatch {
    async fn dispatch(&self, payload: JobPayload) -> Result<()> {
        self.0
            .send(payload)
            .map_err(|e| unique_jobs::UniqueJobsError::JobExecution(anyhow::anyhow!("queue closed: {e}")))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let options = UniqueOptions::from_env()?;
    let unique = UniqueJobs::connect(&options).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = Client::new(ChannelDispatch(tx), unique.enqueue_interceptor());

    let mut registry = JobRegistry::new();
    registry.register::<ReindexJob>();
    let processor = Processor::new(
        Arc::new(registry),
        unique.execution_interceptor(),
        Arc::new(AppState),
    );

    for account_id in ["acc-1", "acc-1", "acc-2"] {
        let job = ReindexJob {
            account_id: account_id.into(),
        };
        match client.enqueue(&job).await? {
            Some(id) => println!("[enqueue] {account_id} enqueued id={id}"),
            None => println!("[enqueue] {account_id} already queued, dropped"),
        }
    }
    drop(client);

    while let Some(payload) = rx.recv().await {
        let outcome = processor.process(payload).await?;
        println!("[worker] outcome={outcome:?}");
    }
    Ok(())
}
