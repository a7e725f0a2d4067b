//! The pluggable caching layer for lazyload.
//!
//! Loaders consult a [`Cache`] before invoking their fetcher, and populate it
//! after a successful fetch. The cache is a *shared* structure: any number of
//! loaders may read and write it concurrently, so every implementation must
//! serialize its own mutations.
//!
//! The contract is deliberately small:
//!
//! - [`Cache::get`] is a pure lookup that never blocks on I/O.
//! - [`Cache::put`] may refuse a write with [`CacheError::CapacityExhausted`].
//!   Callers treat this as non-fatal: the single put is dropped, the cache is
//!   [`clear`](Cache::clear)ed entirely, and the fetch that produced the value
//!   still succeeds.
//! - [`Cache::clear`] drops all entries and is safe to call concurrently with
//!   in-flight reads and writes.
//!
//! Eviction policy is up to the implementation; [`MemoryCache`] is a bounded
//! in-memory implementation, but anything honoring the contract above plugs
//! in, and loaders work correctly with no cache at all.

#![warn(missing_docs)]

mod memory;

pub use memory::MemoryCache;

use std::sync::Arc;

use thiserror::Error;

/// An error signalled by a cache write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The entry cannot be admitted without exceeding the cache's capacity.
    #[error("cache capacity exhausted")]
    CapacityExhausted,
}

/// The relative cost of keeping a value in a bounded cache.
///
/// Not all entries are created equal; a bounded cache weighs its entries
/// against a total budget rather than counting them.
pub trait CacheWeight {
    /// The weight of this value, in arbitrary units.
    fn weight(&self) -> u32 {
        std::mem::size_of_val(self) as u32
    }
}

impl CacheWeight for Vec<u8> {
    fn weight(&self) -> u32 {
        self.len().try_into().unwrap_or(u32::MAX)
    }
}

impl CacheWeight for String {
    fn weight(&self) -> u32 {
        self.len().try_into().unwrap_or(u32::MAX)
    }
}

impl CacheWeight for bytes::Bytes {
    fn weight(&self) -> u32 {
        self.len().try_into().unwrap_or(u32::MAX)
    }
}

impl<T: CacheWeight> CacheWeight for Arc<T> {
    fn weight(&self) -> u32 {
        (**self).weight()
    }
}

/// A key → value store shared between loaders.
///
/// See the [crate docs](crate) for the full contract. Values are handed out
/// by clone, so `V` should be cheap to clone (bytes behind an [`Arc`], a
/// handle, ...).
pub trait Cache<V>: Send + Sync {
    /// Looks up the value cached for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Stores `value` under `key`.
    ///
    /// May fail with [`CacheError::CapacityExhausted`] when the entry cannot
    /// be admitted; see the [crate docs](crate) for the expected recovery.
    fn put(&self, key: &str, value: V) -> Result<(), CacheError>;

    /// Drops all entries.
    fn clear(&self);
}
