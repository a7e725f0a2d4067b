//! The fetcher boundary and the cache-aware resolve path.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use lazyload_cache::Cache;

use crate::task::CancelToken;

/// An error produced by a [`Fetcher`] or a paging fetch body.
///
/// Failures surface through the consumer's failure callback; they are never
/// retried automatically and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The resource does not exist at the source.
    #[error("not found")]
    NotFound,
    /// The fetch did not finish within the configured deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The fetch itself failed, e.g. connection loss or a consumer-raised
    /// error.
    ///
    /// The attached string carries the underlying error message.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The resource was fetched successfully, but is unusable.
    #[error("malformed: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Wraps an arbitrary error, logging it at the call site.
    #[track_caller]
    pub fn from_std_error<E: std::error::Error + 'static>(e: E) -> Self {
        let dynerr: &dyn std::error::Error = &e; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr);
        Self::Fetch(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::from_std_error(err)
    }
}

/// Produces the value for a request key.
///
/// This is the boundary behind which the actual network or computation work
/// lives. Fetchers are invoked off the control context, and only after a
/// cache miss. An implementation may impose its own deadline and surface
/// expiry as a [`FetchError`].
pub trait Fetcher: Send + Sync + 'static {
    /// The value a fetch produces.
    ///
    /// Cache hits are handed out by clone, so this should be cheap to clone.
    type Value: Clone + Send + Sync + 'static;

    /// Fetches the value for `key`.
    fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Self::Value, FetchError>>;
}

/// Resolves `key` against the cache and the fetcher.
///
/// - An empty `key` yields `Ok(None)` without touching the cache or the
///   fetcher.
/// - A cache hit is returned immediately, without invoking the fetcher.
/// - On a miss the fetcher runs; its failures propagate and are not cached.
/// - A fetched value is written back to the cache. A write refused with a
///   capacity error is recovered conservatively: the put is dropped, the
///   whole cache is cleared, and the fetch still counts as a success.
///
/// Safe to call from any number of slots concurrently; misses on the same
/// key racing each other will each invoke the fetcher.
pub async fn resolve<F>(
    fetcher: &F,
    cache: Option<&dyn Cache<F::Value>>,
    key: &str,
    token: &CancelToken,
) -> Result<Option<F::Value>, FetchError>
where
    F: Fetcher,
{
    if key.is_empty() {
        return Ok(None);
    }

    if let Some(value) = cache.and_then(|cache| cache.get(key)) {
        tracing::trace!(key, "cache hit");
        return Ok(Some(value));
    }

    tracing::trace!(key, "cache miss, fetching");
    let value = fetcher.fetch(key).await?;

    if let Some(cache) = cache {
        // A superseded fetch must not touch shared state anymore.
        if !token.is_cancelled() {
            if let Err(error) = cache.put(key, value.clone()) {
                tracing::warn!(key, %error, "cache write refused, clearing cache");
                cache.clear();
            }
        }
    }

    Ok(Some(value))
}
