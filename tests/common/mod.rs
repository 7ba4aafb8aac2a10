//! In-process host for driving the interceptors end to end.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unique_jobs::{
    AppContext, Client, Dispatch, JobPayload, JobRegistry, LockStore, MemoryStore, Outcome,
    Processor, Result, UniqueJobs, UniqueOptions,
};

/// Records what job bodies ran to completion, in order.
#[derive(Clone, Default)]
pub struct Performed(pub Arc<Mutex<Vec<String>>>);

impl Performed {
    pub fn push(&self, arg: &str) {
        self.0.lock().unwrap().push(arg.to_string());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl AppContext for Performed {
    fn clone_context(&self) -> Arc<dyn AppContext> {
        Arc::new(self.clone())
    }
}

/// Ready queue plus delayed set.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    ready: Arc<Mutex<VecDeque<JobPayload>>>,
    scheduled: Arc<Mutex<Vec<JobPayload>>>,
}

#[unique_jobs::async_trait]
impl Dispatch for MemoryQueue {
    async fn dispatch(&self, payload: JobPayload) -> Result<()> {
        if payload.is_scheduled() {
            self.scheduled.lock().unwrap().push(payload);
        } else {
            self.ready.lock().unwrap().push_back(payload);
        }
        Ok(())
    }
}

impl MemoryQueue {
    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub fn scheduled_len(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub fn pop(&self) -> Option<JobPayload> {
        self.ready.lock().unwrap().pop_front()
    }

    fn take_scheduled(&self) -> Vec<JobPayload> {
        std::mem::take(&mut *self.scheduled.lock().unwrap())
    }
}

/// Passes through to a [`MemoryStore`], tallying deletes by lock kind
/// (the `q` or `r` segment of `unique:<kind>:<key>`).
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: Arc<MemoryStore>,
    dels: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingStore {
    pub fn dels(&self, kind: &str) -> usize {
        self.dels.lock().unwrap().get(kind).copied().unwrap_or(0)
    }
}

#[unique_jobs::async_trait]
impl LockStore for CountingStore {
    async fn set_nx_px(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.set_nx_px(key, ttl).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let kind = key.split(':').nth(1).unwrap_or_default().to_string();
        *self.dels.lock().unwrap().entry(kind).or_default() += 1;
        self.inner.del(key).await
    }
}

pub struct Host {
    pub store: Arc<MemoryStore>,
    pub counts: CountingStore,
    pub client: Client<MemoryQueue>,
    pub processor: Processor,
    pub performed: Performed,
}

impl Host {
    pub fn new(register: impl FnOnce(&mut JobRegistry)) -> Self {
        let counts = CountingStore::default();
        let store = counts.inner.clone();
        let unique = UniqueJobs::new(Arc::new(counts.clone()), &UniqueOptions::default());
        let mut registry = JobRegistry::new();
        register(&mut registry);
        let performed = Performed::default();

        Self {
            client: Client::new(MemoryQueue::default(), unique.enqueue_interceptor()),
            processor: Processor::new(
                Arc::new(registry),
                unique.execution_interceptor(),
                Arc::new(performed.clone()),
            ),
            store,
            counts,
            performed,
        }
    }

    pub fn queue(&self) -> &MemoryQueue {
        self.client.dispatcher()
    }

    /// Process everything currently ready, one job at a time.
    pub async fn drain(&self) -> Vec<Result<Outcome>> {
        let mut outcomes = Vec::new();
        while let Some(payload) = self.queue().pop() {
            outcomes.push(self.processor.process(payload).await);
        }
        outcomes
    }

    /// The delayed set comes due: re-submit every scheduled job.
    pub async fn promote_scheduled(&self) -> Result<usize> {
        let mut pushed = 0;
        for mut payload in self.queue().take_scheduled() {
            payload.promote_scheduled();
            if self.client.push(payload).await?.is_some() {
                pushed += 1;
            }
        }
        Ok(pushed)
    }
}

/// Job types differing only in their uniqueness declaration.
macro_rules! test_job {
    ($name:ident, $unique_for:expr) => {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            pub arg: String,
            #[serde(default)]
            pub sleep_ms: u64,
            #[serde(default)]
            pub fail: bool,
        }

        impl $name {
            pub fn new(arg: &str) -> Self {
                Self {
                    arg: arg.to_string(),
                    sleep_ms: 0,
                    fail: false,
                }
            }
        }

        #[unique_jobs::async_trait]
        impl unique_jobs::Job for $name {
            async fn perform(&self, ctx: &unique_jobs::JobContext) -> unique_jobs::Result<()> {
                if self.sleep_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(self.sleep_ms)).await;
                }
                if self.fail {
                    return Err(anyhow::anyhow!("{} failed on purpose", self.arg).into());
                }
                ctx.app::<$crate::common::Performed>()
                    .expect("performed recorder")
                    .push(&self.arg);
                Ok(())
            }

            fn name() -> &'static str {
                stringify!($name)
            }

            fn queue_name() -> &'static str {
                "test"
            }

            fn unique_for() -> Option<unique_jobs::UniqueFor> {
                Some($unique_for)
            }
        }
    };
}
