use std::fmt;

use crate::{Cache, CacheError, CacheWeight};

/// A bounded in-memory [`Cache`] backed by `moka`.
///
/// Entries are weighed via [`CacheWeight`] against a total capacity; once the
/// budget is exceeded, the least recently used entries are evicted. A single
/// entry heavier than the whole budget is refused with
/// [`CacheError::CapacityExhausted`] instead of being admitted and
/// immediately evicted again.
pub struct MemoryCache<V> {
    entries: moka::sync::Cache<String, V>,
    capacity: u64,
}

impl<V> MemoryCache<V>
where
    V: CacheWeight + Clone + Send + Sync + 'static,
{
    /// Creates a new cache with the given total weight capacity.
    pub fn new(capacity: u64) -> Self {
        let entries = moka::sync::Cache::builder()
            .max_capacity(capacity)
            // NOTE: a zero-weight entry would be unbounded in number, so
            // everything weighs at least one unit.
            .weigher(|_k: &String, v: &V| v.weight().max(1))
            .build();

        MemoryCache { entries, capacity }
    }

    /// The configured total weight capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The number of entries currently resident.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: CacheWeight + Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key)
    }

    fn put(&self, key: &str, value: V) -> Result<(), CacheError> {
        if u64::from(value.weight().max(1)) > self.capacity {
            return Err(CacheError::CapacityExhausted);
        }
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    fn clear(&self) {
        self.entries.invalidate_all();
    }
}
