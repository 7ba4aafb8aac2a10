// src/config.rs
use crate::{Result, UniqueJobsError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Per job type uniqueness declaration.
///
/// Durations are written in (possibly fractional) seconds when serialized,
/// so a payload carries e.g. `{"queued": 10, "running": 0.5}`. A zero
/// duration disables the corresponding lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueFor {
    #[serde(default, with = "secs_f64")]
    pub queued: Duration,
    #[serde(default, with = "secs_f64")]
    pub running: Duration,
    /// Abort the job body once it has run for `running`.
    #[serde(default)]
    pub timeout: bool,
    #[serde(default)]
    pub unique_on: UniqueOn,
}

impl UniqueFor {
    /// Enqueue lock only.
    pub fn queued(secs: f64) -> Result<Self> {
        Ok(Self {
            queued: duration_from_secs(secs)?,
            ..Default::default()
        })
    }

    /// Run lock only.
    pub fn running(secs: f64) -> Result<Self> {
        Ok(Self {
            running: duration_from_secs(secs)?,
            ..Default::default()
        })
    }

    pub fn with_queued(mut self, secs: f64) -> Result<Self> {
        self.queued = duration_from_secs(secs)?;
        Ok(self)
    }

    pub fn with_running(mut self, secs: f64) -> Result<Self> {
        self.running = duration_from_secs(secs)?;
        Ok(self)
    }

    pub fn with_timeout(mut self) -> Self {
        self.timeout = true;
        self
    }

    pub fn with_unique_on(mut self, unique_on: UniqueOn) -> Self {
        self.unique_on = unique_on;
        self
    }

    /// Neither lock configured: the whole mechanism is a pass-through.
    pub fn is_inert(&self) -> bool {
        self.queued.is_zero() && self.running.is_zero()
    }

    /// Execution deadline, present only when a timeout is requested alongside
    /// a run lock.
    pub fn deadline(&self) -> Option<Duration> {
        (self.timeout && !self.running.is_zero()).then_some(self.running)
    }
}

/// Which view of the argument list feeds the fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "with", rename_all = "snake_case")]
pub enum UniqueOn {
    /// The full argument list.
    #[default]
    AllArgs,
    /// Only the listed positional arguments, in the listed order. Positions
    /// past the end of the argument list are skipped.
    Positions(Vec<usize>),
    /// For every object argument keep only the named keys; other arguments
    /// are kept whole.
    Fields(Vec<String>),
}

/// Runtime settings for the lock store.
#[derive(Debug, Clone)]
pub struct UniqueOptions {
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for UniqueOptions {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "unique".to_string(),
        }
    }
}

impl UniqueOptions {
    /// Read `UNIQUE_JOBS_REDIS_URL` and `UNIQUE_JOBS_KEY_PREFIX`, falling back
    /// to the defaults for anything unset.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let key_prefix = optional_var("UNIQUE_JOBS_KEY_PREFIX").unwrap_or(defaults.key_prefix);
        if key_prefix.is_empty() || key_prefix.contains(':') {
            return Err(UniqueJobsError::Config(format!(
                "UNIQUE_JOBS_KEY_PREFIX must be non-empty and contain no ':' (got {key_prefix:?})"
            )));
        }

        Ok(Self {
            redis_url: optional_var("UNIQUE_JOBS_REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn duration_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| UniqueJobsError::Config(format!("invalid duration {secs}s: {e}")))
}

mod secs_f64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        duration_from_secs(secs).map_err(serde::de::Error::custom)
    }
}
