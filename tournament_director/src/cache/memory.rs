//! In-process [`SharedCache`] used when no external cache is configured and
//! by tests.

use super::{CacheError, CacheResult, LockToken, SharedCache};
use async_trait::async_trait;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::RwLock, time::Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Entry>,
    sets: HashMap<String, BTreeSet<String>>,
    locks: HashMap<String, (LockToken, Instant)>,
}

/// Shared cache held in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<Inner>>,
    available: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// `CacheError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop everything, as if the cache node restarted empty
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
    }

    fn check(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory cache marked unavailable".to_string()))
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        let inner = self.inner.read().await;
        let now = Instant::now();
        Ok(inner
            .values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        self.check()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.inner
            .write()
            .await
            .values
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.inner.write().await.values.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()> {
        self.check()?;
        self.inner
            .write()
            .await
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<()> {
        self.check()?;
        let mut inner = self.inner.write().await;
        if let Some(set) = inner.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                inner.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn try_lock(&self, key: &str, lease: Duration) -> CacheResult<Option<LockToken>> {
        self.check()?;
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = inner.locks.get(key)
            && *expires_at > now
        {
            return Ok(None);
        }

        let token = Uuid::new_v4();
        inner.locks.insert(key.to_string(), (token, now + lease));
        Ok(Some(token))
    }

    async fn unlock(&self, key: &str, token: LockToken) -> CacheResult<bool> {
        self.check()?;
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        match inner.locks.get(key) {
            Some((held, expires_at)) if *held == token && *expires_at > now => {
                inner.locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
