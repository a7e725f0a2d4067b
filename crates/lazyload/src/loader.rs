//! Keyed resource loading with last-writer-wins semantics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lazyload_cache::Cache;

use crate::fetch::{FetchError, Fetcher, resolve};
use crate::slot::{Completion, TaskSlot};

/// Receives the terminal result of a resource load.
///
/// At most one of the two callbacks fires per accepted request, on the
/// control context. A handler can be replaced at any time; delivery targets
/// whatever handler is registered at delivery time.
pub trait DownloadHandler<V>: Send + Sync {
    /// Called with the loaded value, or `None` when the requested key was
    /// absent.
    fn on_downloaded(&self, value: Option<V>);

    /// Called when the fetch failed.
    fn on_error(&self, error: &FetchError);
}

/// Asynchronously loads keyed resources, caching them and superseding stale
/// requests.
///
/// Every [`set_source`](Self::set_source) call cancels whatever fetch is
/// still in flight: only the most recently requested key is ever delivered.
/// Results are picked up on the control context via
/// [`deliver_next`](Self::deliver_next) or [`try_deliver`](Self::try_deliver)
/// and dispatched to the registered [`DownloadHandler`].
///
/// The cache is optional and shared by injection; several loaders may hold
/// the same `Arc` to avoid refetching resources another loader already
/// resolved.
pub struct ResourceLoader<F: Fetcher> {
    fetcher: Arc<F>,
    cache: Option<Arc<dyn Cache<F::Value>>>,
    handler: Option<Arc<dyn DownloadHandler<F::Value>>>,
    fetch_timeout: Option<Duration>,
    slot: TaskSlot<Option<F::Value>>,
}

impl<F: Fetcher> fmt::Debug for ResourceLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("slot", &self.slot)
            .field("has_cache", &self.cache.is_some())
            .field("has_handler", &self.handler.is_some())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl<F: Fetcher> ResourceLoader<F> {
    /// Creates a loader without cache or handler.
    pub fn new(runtime: tokio::runtime::Handle, fetcher: Arc<F>) -> Self {
        ResourceLoader {
            fetcher,
            cache: None,
            handler: None,
            fetch_timeout: None,
            slot: TaskSlot::new(runtime),
        }
    }

    /// Creates a loader and immediately starts loading `key`.
    pub fn with_source(
        runtime: tokio::runtime::Handle,
        fetcher: Arc<F>,
        key: impl Into<String>,
    ) -> Self {
        let loader = Self::new(runtime, fetcher);
        loader.set_source(key);
        loader
    }

    /// Injects the cache consulted before each fetch.
    ///
    /// Without a cache every request goes to the fetcher.
    pub fn set_cache(&mut self, cache: Arc<dyn Cache<F::Value>>) {
        self.cache = Some(cache);
    }

    /// Registers the handler receiving terminal results.
    ///
    /// Replacing the handler does not affect already-queued results; they are
    /// delivered to the new handler.
    pub fn set_handler(&mut self, handler: Arc<dyn DownloadHandler<F::Value>>) {
        self.handler = Some(handler);
    }

    /// Applies a deadline around the whole resolve path of each request.
    ///
    /// Expiry is delivered as [`FetchError::Timeout`].
    pub fn set_fetch_timeout(&mut self, timeout: Duration) {
        self.fetch_timeout = Some(timeout);
    }

    /// Requests the resource identified by `key`.
    ///
    /// Cancels any fetch still in flight; its result will not be delivered.
    /// An empty `key` short-circuits to a successful `None` without touching
    /// the cache or the fetcher.
    pub fn set_source(&self, key: impl Into<String>) {
        let key = key.into();
        let fetcher = Arc::clone(&self.fetcher);
        let cache = self.cache.clone();
        let fetch_timeout = self.fetch_timeout;

        self.slot.submit(|| {}, move |token| async move {
            let fut = resolve(&*fetcher, cache.as_deref(), &key, &token);
            match fetch_timeout {
                Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchError::Timeout(deadline)),
                },
                None => fut.await,
            }
        });
    }

    /// True while a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        !self.slot.is_idle()
    }

    /// Awaits the next terminal result and dispatches it to the registered
    /// handler.
    ///
    /// Must be driven from the control context.
    pub async fn deliver_next(&mut self) {
        let completion = self.slot.next_completed().await;
        self.dispatch(completion);
    }

    /// Dispatches all already-queued results without waiting.
    ///
    /// Returns the number of callbacks fired.
    pub fn try_deliver(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(completion) = self.slot.try_completed() {
            if self.dispatch(completion) {
                delivered += 1;
            }
        }
        delivered
    }

    fn dispatch(&self, completion: Completion<Option<F::Value>>) -> bool {
        // No handler registered: the result is dropped silently.
        let Some(handler) = self.handler.as_ref() else {
            return false;
        };
        match completion.outcome {
            Ok(value) => handler.on_downloaded(value),
            Err(error) => handler.on_error(&error),
        }
        true
    }
}
