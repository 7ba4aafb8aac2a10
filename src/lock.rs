// src/lock.rs
use crate::{LockStore, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The two lock kinds kept per fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Held while an instance waits in the queue.
    Enqueue,
    /// Held while an instance executes.
    Run,
}

impl LockKind {
    pub fn code(self) -> &'static str {
        match self {
            LockKind::Enqueue => "q",
            LockKind::Run => "r",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Presence-based locks over a [`LockStore`].
///
/// Locks carry no owner token: whoever knows the fingerprint can release
/// them, so `release` stays crate-private and is only reached from the two
/// lifecycle points that own it.
#[derive(Clone)]
pub struct Locks {
    store: Arc<dyn LockStore>,
    key_prefix: String,
}

impl Locks {
    pub fn new(store: Arc<dyn LockStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// `<prefix>:<kind>:<fingerprint>`
    pub fn key_for(&self, kind: LockKind, fingerprint: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, kind.code(), fingerprint)
    }

    pub async fn try_acquire(&self, kind: LockKind, fingerprint: &str, ttl: Duration) -> Result<bool> {
        let key = self.key_for(kind, fingerprint);
        let acquired = self.store.set_nx_px(&key, ttl).await?;
        debug!(%key, ?ttl, acquired, "lock acquire");
        Ok(acquired)
    }

    pub(crate) async fn release(&self, kind: LockKind, fingerprint: &str) -> Result<()> {
        let key = self.key_for(kind, fingerprint);
        self.store.del(&key).await?;
        debug!(%key, "lock released");
        Ok(())
    }
}
