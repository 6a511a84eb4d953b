//! Leased advisory locks over [`SharedCache`].

use super::{CacheError, CacheResult, LockToken, SharedCache};
use std::{future::Future, sync::Arc, time::Duration};

/// How to acquire a lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Lease length; the lock auto-releases after this
    pub lease: Duration,
    /// Extra attempts after the first one fails
    pub retry_count: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl LockOptions {
    /// Tick sweep: short lease, a busy timer is simply skipped this cycle
    pub fn tick() -> Self {
        Self {
            lease: Duration::from_millis(1000),
            retry_count: 0,
            retry_delay: Duration::ZERO,
        }
    }

    /// User operations and event handlers: slightly longer lease, short retries
    pub fn operation() -> Self {
        Self {
            lease: Duration::from_millis(2000),
            retry_count: 5,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::operation()
    }
}

/// An acquired lease. Call [`Lease::release`] when the critical section ends.
pub struct Lease {
    cache: Arc<dyn SharedCache>,
    key: String,
    token: LockToken,
}

impl Lease {
    /// Acquire a lease on `key`, retrying per `options`
    ///
    /// # Errors
    ///
    /// * `CacheError::LockUnavailable` - still held by someone else after all retries
    /// * `CacheError::Unavailable` - cache backend unreachable
    pub async fn acquire(
        cache: Arc<dyn SharedCache>,
        key: &str,
        options: LockOptions,
    ) -> CacheResult<Self> {
        let mut attempt = 0;
        loop {
            if let Some(token) = cache.try_lock(key, options.lease).await? {
                return Ok(Self {
                    cache,
                    key: key.to_string(),
                    token,
                });
            }

            if attempt >= options.retry_count {
                return Err(CacheError::LockUnavailable {
                    key: key.to_string(),
                });
            }
            attempt += 1;
            tokio::time::sleep(options.retry_delay).await;
        }
    }

    /// Key this lease protects
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lease. Failures are logged; the lease expires regardless.
    pub async fn release(self) {
        match self.cache.unlock(&self.key, self.token).await {
            Ok(true) => {}
            Ok(false) => log::warn!(
                "Lease on {} expired before release; critical section overran its lease",
                self.key
            ),
            Err(e) => log::warn!("Failed to release lease on {}: {}", self.key, e),
        }
    }
}

/// Run `f` while holding the lease on `key`; the lease is released on every
/// return path.
pub async fn with_lease<T, E, F, Fut>(
    cache: &Arc<dyn SharedCache>,
    key: &str,
    options: LockOptions,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<CacheError>,
{
    let lease = Lease::acquire(cache.clone(), key, options).await?;
    let result = f().await;
    lease.release().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn fast_retry(retry_count: u32) -> LockOptions {
        LockOptions {
            lease: Duration::from_millis(500),
            retry_count,
            retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_until_released() {
        let cache: Arc<dyn SharedCache> = Arc::new(MemoryCache::new());

        let first = Lease::acquire(cache.clone(), "k", fast_retry(0))
            .await
            .expect("first lease");
        let second = Lease::acquire(cache.clone(), "k", fast_retry(0)).await;
        assert!(matches!(second, Err(CacheError::LockUnavailable { .. })));

        first.release().await;
        assert!(Lease::acquire(cache, "k", fast_retry(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_with_lease_releases_on_error() {
        let cache: Arc<dyn SharedCache> = Arc::new(MemoryCache::new());

        let result: Result<(), CacheError> = with_lease(&cache, "k", fast_retry(0), || async {
            Err(CacheError::Unavailable("boom".to_string()))
        })
        .await;
        assert!(result.is_err());

        // The failed section must not leave the key locked
        assert!(Lease::acquire(cache, "k", fast_retry(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_retry_waits_for_expiry() {
        let cache: Arc<dyn SharedCache> = Arc::new(MemoryCache::new());
        let short = LockOptions {
            lease: Duration::from_millis(20),
            retry_count: 0,
            retry_delay: Duration::ZERO,
        };
        let _abandoned = Lease::acquire(cache.clone(), "k", short).await.unwrap();

        let patient = LockOptions {
            lease: Duration::from_millis(500),
            retry_count: 20,
            retry_delay: Duration::from_millis(5),
        };
        assert!(Lease::acquire(cache, "k", patient).await.is_ok());
    }
}
