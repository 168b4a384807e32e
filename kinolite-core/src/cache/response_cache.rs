//! Keyed response cache with per-entry TTL and single-flight fill
//!
//! Memoizes expensive upstream calls. A miss runs the supplied producer at
//! most once per key no matter how many callers are waiting; the fill runs
//! on its own task, so a caller giving up does not cancel it for anyone
//! else. Failures are shared with the waiters of that fill and are
//! never stored.

use std::future::Future;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use tracing::debug;

use super::singleflight::Flights;

/// Error returned by [`ResponseCache::get_or_compute`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError<E> {
    /// The producer ran and failed
    #[error("{0}")]
    Producer(E),
    /// The fill task panicked before finishing
    #[error("cache producer aborted")]
    Aborted,
}

/// A stored value and its absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub ttl: Duration,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Each entry lives exactly as long as the TTL it was stored with.
struct EntryExpiry;

impl<V> Expiry<String, CacheEntry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Generic async memoization keyed by caller-built strings.
///
/// Cloning is cheap; clones share the same store and in-flight table.
#[derive(Clone)]
pub struct ResponseCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    store: Cache<String, CacheEntry<V>>,
    flights: Flights<V, E>,
}

impl<V, E> ResponseCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_capacity` entries
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let store = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self {
            store,
            flights: Flights::new(),
        }
    }

    /// Return the cached value for `key`, or run `producer` to fill it.
    ///
    /// Concurrent callers for the same key share one producer run. On
    /// success the value is stored for `ttl`; on failure nothing is stored
    /// and the next call starts a fresh attempt.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.get(key).await {
            debug!(key = %key, "Response cache hit");
            return Ok(value);
        }

        let store = self.store.clone();
        let owned_key = key.to_string();

        let fill = async move {
            // A fill that completed between our miss and joining the flight
            // has already stored the value.
            if let Some(entry) = store.get(&owned_key).await.filter(CacheEntry::is_fresh) {
                return Ok(entry.value);
            }

            debug!(key = %owned_key, ttl_secs = ttl.as_secs_f64(), "Response cache miss, filling");

            let value = producer().await.map_err(CacheError::Producer)?;
            store
                .insert(owned_key, CacheEntry::new(value.clone(), ttl))
                .await;
            Ok::<V, CacheError<E>>(value)
        };

        self.flights.run(key.to_string(), fill).await
    }

    /// Fresh value for `key`, if any. Expired entries count as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.store
            .get(key)
            .await
            .filter(CacheEntry::is_fresh)
            .map(|entry| entry.value)
    }

    /// Store `value` for `ttl`, replacing any previous entry atomically.
    pub async fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.store.insert(key.into(), CacheEntry::new(value, ttl)).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.store.invalidate(key).await;
    }

    /// Approximate number of stored entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }
}

impl<V, E> std::fmt::Debug for ResponseCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.store.entry_count())
            .finish()
    }
}
