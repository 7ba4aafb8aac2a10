// src/store.rs
use crate::{Result, UniqueOptions};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// The two atomic primitives the locks need from a shared key-value store.
#[async_trait::async_trait]
pub trait LockStore: Send + Sync + 'static {
    /// Create `key` with the given expiry only if it does not exist.
    /// Returns whether the key was created.
    async fn set_nx_px(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key` if present.
    async fn del(&self, key: &str) -> Result<()>;
}

/// Millisecond expiry for `SET .. PX`; sub-millisecond TTLs round up so a
/// lock never gets a zero or negative expiry.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

/// Redis-protocol store over one multiplexed connection, opened up front and
/// cloned for each round-trip.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn new(options: &UniqueOptions) -> Result<Self> {
        let client = RedisClient::open(options.redis_url.as_str())?;
        Self::from_client(&client).await
    }

    pub async fn from_client(client: &RedisClient) -> Result<Self> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl LockStore for RedisStore {
    async fn set_nx_px(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut con = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("x")
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut con)
            .await?;
        Ok(result.is_some())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut con = self.conn.clone();
        let _: i64 = con.del(key).await?;
        Ok(())
    }
}

/// In-process store with the same semantics as the Redis one. Expiry runs
/// on the tokio clock, so paused test runtimes control TTLs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys starting with `prefix`, sorted.
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .lock_entries()
            .iter()
            .filter(|(k, expires)| k.starts_with(prefix) && **expires > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock_entries().get(key).is_some_and(|expires| *expires > now)
    }

    /// Drop every key starting with `prefix`; returns how many were removed.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }

    /// Stored entries, expired ones included until the next sweep.
    pub(crate) fn stored_len(&self) -> usize {
        self.lock_entries().len()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl LockStore for MemoryStore {
    async fn set_nx_px(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.lock_entries();
        if entries.get(key).is_some_and(|expires| *expires > now) {
            return Ok(false);
        }
        // Sweep abandoned locks; nothing else ever reads them again.
        entries.retain(|_, expires| *expires > now);
        entries.insert(
            key.to_string(),
            now + Duration::from_millis(ttl_millis(ttl)),
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.lock_entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_rounds_up_to_whole_millis() {
        assert_eq!(ttl_millis(Duration::from_millis(500)), 500);
        assert_eq!(ttl_millis(Duration::from_micros(1500)), 2);
        assert_eq!(ttl_millis(Duration::from_nanos(1)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(10)), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_store_set_is_conditional_and_expires() {
        let store = MemoryStore::new();
        assert!(store.set_nx_px("k", Duration::from_secs(1)).await.unwrap());
        assert!(!store.set_nx_px("k", Duration::from_secs(1)).await.unwrap());

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(!store.contains("k"));
        assert!(store.set_nx_px("k", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_locks_are_swept_on_acquire() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.set_nx_px(&format!("unique:r:abandoned-{i}"), Duration::from_millis(100)).await.unwrap();
        }
        store.set_nx_px("unique:q:live", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.stored_len(), 11);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(store.set_nx_px("unique:q:other", Duration::from_secs(60)).await.unwrap());

        assert_eq!(store.stored_len(), 2);
        assert_eq!(store.keys("unique:"), vec!["unique:q:live", "unique:q:other"]);
    }

    #[tokio::test]
    async fn memory_store_del_and_prefix_helpers() {
        let store = MemoryStore::new();
        store.set_nx_px("unique:q:a", Duration::from_secs(5)).await.unwrap();
        store.set_nx_px("unique:q:b", Duration::from_secs(5)).await.unwrap();
        store.set_nx_px("unique:r:a", Duration::from_secs(5)).await.unwrap();

        assert_eq!(store.keys("unique:q:"), vec!["unique:q:a", "unique:q:b"]);
        store.del("unique:q:a").await.unwrap();
        assert!(!store.contains("unique:q:a"));
        assert_eq!(store.delete_prefix("unique:q:"), 1);
        assert_eq!(store.keys("unique:"), vec!["unique:r:a"]);
    }

    #[tokio::test]
    async fn concurrent_acquires_have_one_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.set_nx_px("race", Duration::from_secs(5)).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
