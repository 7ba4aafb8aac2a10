// src/job.rs
use crate::{JobContext, Result, UniqueFor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a job instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job description as it travels between producer and worker.
///
/// `unique_key` and `unique_scheduled` are scratch fields owned by the
/// uniqueness middleware; hosts must carry them through scheduling,
/// retries and re-enqueues untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub jid: JobId,
    pub class: String,
    pub queue: String,
    pub args: Vec<Value>,
    /// Scheduled delivery time; present only while the job is delayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_for: Option<UniqueFor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_scheduled: Option<bool>,
}

impl JobPayload {
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            jid: JobId::new(),
            class: class.into(),
            queue: "default".to_string(),
            args,
            at: None,
            retry_count: 0,
            unique_for: None,
            unique_key: None,
            unique_scheduled: None,
        }
    }

    /// Build the payload for a typed job, carrying its declared uniqueness.
    ///
    /// Sequences become the positional argument list; anything else is a
    /// single argument.
    pub fn from_job<T: Job>(job: &T) -> Result<Self> {
        let args = match serde_json::to_value(job)? {
            Value::Array(args) => args,
            other => vec![other],
        };
        let mut payload = Self::new(T::name(), args).on_queue(T::queue_name());
        payload.unique_for = T::unique_for();
        Ok(payload)
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_unique_for(mut self, unique_for: UniqueFor) -> Self {
        self.unique_for = Some(unique_for);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    /// The job is due: the host is about to re-submit it internally.
    pub fn promote_scheduled(&mut self) {
        self.at = None;
    }

    /// The host re-enqueues the job after a failure.
    pub fn mark_retry(&mut self) {
        self.retry_count += 1;
        self.at = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.at.is_some()
    }

    /// Rebuild the typed job from the argument list, the inverse of
    /// [`JobPayload::from_job`].
    pub fn decode<T: Job>(&self) -> Result<T> {
        if let [single] = self.args.as_slice() {
            if let Ok(job) = serde_json::from_value(single.clone()) {
                return Ok(job);
            }
        }
        Ok(serde_json::from_value(Value::Array(self.args.clone()))?)
    }
}

/// Core trait that all jobs must implement
#[async_trait::async_trait]
pub trait Job: Send + Sync + 'static + serde::de::DeserializeOwned + serde::Serialize {
    /// Execute the job with the provided context
    async fn perform(&self, ctx: &JobContext) -> Result<()>;

    /// Job type name used as the fingerprint prefix and for registry lookup
    fn name() -> &'static str
    where
        Self: Sized;

    /// Queue name for this job type
    fn queue_name() -> &'static str
    where
        Self: Sized,
    {
        "default"
    }

    /// Uniqueness declaration for this job type; `None` opts out entirely
    fn unique_for() -> Option<UniqueFor>
    where
        Self: Sized,
    {
        None
    }
}
