//! In-flight table for cache fills
//!
//! Every caller's flight runs on its own detached task, so dropping a caller
//! never drops the leader of a fill. Waiters joining a key that is already
//! being filled get the leader's outcome, success or failure alike.

use std::future::Future;
use std::sync::Arc;

use async_singleflight::UnaryGroup;
use tracing::warn;

use super::response_cache::CacheError;

type Outcome<V, E> = Result<V, CacheError<E>>;

/// Per-key deduplication of cache fills
pub struct Flights<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    group: Arc<UnaryGroup<String, Outcome<V, E>>>,
}

impl<V, E> Flights<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            group: Arc::new(UnaryGroup::new()),
        }
    }

    /// Run `fill` for `key` unless a fill for it is already in flight, in
    /// which case wait for that one instead.
    pub async fn run<Fut>(&self, key: String, fill: Fut) -> Outcome<V, E>
    where
        Fut: Future<Output = Outcome<V, E>> + Send + 'static,
    {
        let group = self.group.clone();
        let flight = tokio::spawn(async move { group.work(key.as_str(), fill).await });

        match flight.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                warn!(error = %join_err, "Cache fill task failed");
                Err(CacheError::Aborted)
            }
        }
    }
}

impl<V, E> Clone for Flights<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
        }
    }
}

impl<V, E> Default for Flights<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
