//! Helpers for testing loaders and caches.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all
//!    console output is captured by the test runner.
//!
//!  - Loader tests should run on a current-thread tokio runtime
//!    (`#[tokio::test]`); workers then only make progress while the test
//!    awaits, which keeps in-flight supersession scenarios deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

use lazyload_cache::{Cache, CacheError, CacheWeight, MemoryCache};

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `lazyload`
///    crates and mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("lazyload=trace,lazyload_cache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A cache that can be switched into reporting capacity exhaustion on every
/// write.
///
/// Backed by a real [`MemoryCache`], so reads and clears behave normally;
/// only `put` is intercepted while exhausted. Use this to exercise the
/// clear-and-drop recovery of the resolve path.
#[derive(Debug)]
pub struct ExhaustibleCache<V> {
    inner: MemoryCache<V>,
    exhausted: AtomicBool,
    rejected_puts: AtomicUsize,
}

impl<V> ExhaustibleCache<V>
where
    V: CacheWeight + Clone + Send + Sync + 'static,
{
    /// Creates a healthy cache with the given capacity.
    pub fn new(capacity: u64) -> Self {
        ExhaustibleCache {
            inner: MemoryCache::new(capacity),
            exhausted: AtomicBool::new(false),
            rejected_puts: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent `put` report [`CacheError::CapacityExhausted`].
    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::Relaxed);
    }

    /// The number of writes rejected so far.
    pub fn rejected_puts(&self) -> usize {
        self.rejected_puts.load(Ordering::Relaxed)
    }

    /// The number of entries currently resident.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl<V> Cache<V> for ExhaustibleCache<V>
where
    V: CacheWeight + Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        if self.exhausted.load(Ordering::Relaxed) {
            self.rejected_puts.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::CapacityExhausted);
        }
        self.inner.put(key, value)
    }

    fn clear(&self) {
        self.inner.clear();
    }
}
