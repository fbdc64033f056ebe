//! The public cache façade (spec. §6).
//!
//! `Cache` is a thin wrapper the way the table crate's `PTab` is a thin
//! wrapper over `Table`: it owns the table (which in turn owns the sketch,
//! stats, and TTL machinery) plus the singleflight group, and exposes the
//! full operation surface.

use std::any::Any;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::singleflight::CancellationToken;
use crate::singleflight::SingleFlightGroup;
use crate::slot::Value;
use crate::stats::StatsSnapshot;
use crate::table::Table;

/// A lock-free, bounded-capacity key/value cache with W-TinyLFU admission,
/// TTL expiration, and singleflight load collapsing.
///
/// # Examples
///
/// ```
/// use tinylfu_cache::{Cache, CacheConfig};
///
/// let cache = Cache::new(CacheConfig::new(1024));
/// cache.store(b"hello", 42_i32).unwrap();
/// assert_eq!(cache.lookup(b"hello").unwrap().and_then(|v| v.downcast_ref::<i32>().copied()), Some(42));
/// ```
pub struct Cache {
  table: Table,
  singleflight: SingleFlightGroup,
}

impl Cache {
  /// Builds a new cache from `config`. The table is allocated up front and
  /// never resized; all growth beyond `capacity` is handled by eviction.
  #[must_use]
  pub fn new(config: CacheConfig) -> Self {
    Self {
      table: Table::new(&config),
      singleflight: SingleFlightGroup::new(),
    }
  }

  /// Stores `value` under `key`. Returns `false` only if the table was
  /// still full after one eviction attempt (spec. §6) — this is not an
  /// error.
  pub fn store<T>(&self, key: &[u8], value: T) -> Result<bool, CacheError>
  where
    T: Any + Send + Sync,
  {
    self.table.store(key, Arc::new(value) as Value)
  }

  /// As [`Self::store`], for callers that already hold a type-erased
  /// [`Value`] handle (e.g. one returned by [`Self::lookup`]).
  pub fn store_value(&self, key: &[u8], value: Value) -> Result<bool, CacheError> {
    self.table.store(key, value)
  }

  /// Looks up `key`. `None` on miss or expiry.
  pub fn lookup(&self, key: &[u8]) -> Result<Option<Value>, CacheError> {
    self.table.lookup(key)
  }

  /// Removes `key`. Returns whether an entry was present.
  pub fn remove(&self, key: &[u8]) -> Result<bool, CacheError> {
    self.table.remove(key)
  }

  /// Returns whether `key` is present and unexpired.
  pub fn contains(&self, key: &[u8]) -> Result<bool, CacheError> {
    self.table.contains(key)
  }

  /// Empties the cache: every slot, the sketch, and the stats counters.
  pub fn clear(&self) {
    self.table.clear();
  }

  /// Current logical number of entries.
  #[must_use]
  pub fn len(&self) -> usize {
    self.table.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  /// Configured maximum logical entries.
  #[must_use]
  pub fn capacity(&self) -> usize {
    self.table.capacity()
  }

  /// Sweeps every slot, tombstoning expired entries. Returns how many were
  /// expired. Always 0 when TTL is disabled.
  pub fn expire_now(&self) -> usize {
    self.table.expire_now()
  }

  /// A snapshot of the aggregate counters.
  #[must_use]
  pub fn stats(&self) -> StatsSnapshot {
    self.table.stats()
  }

  /// Loads `key` via `loader` if absent, collapsing concurrent misses on
  /// the same key into one loader execution (spec. §4.5).
  pub fn get_or_load<F, T, E>(&self, key: &[u8], loader: F) -> Result<Value, CacheError>
  where
    F: FnOnce() -> Result<T, E>,
    T: Any + Send + Sync,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
  {
    if let Some(value) = self.table.lookup(key)? {
      return Ok(value);
    }
    self.singleflight.get_or_load(
      key,
      move || loader().map(|value| Arc::new(value) as Value),
      |value| {
        let _ = self.table.store(key, Arc::clone(value));
      },
    )
  }

  /// As [`Self::get_or_load`], with a cancellation token the loader
  /// receives and every waiter races against the load's completion.
  pub fn get_or_load_with_context<F, T, E>(
    &self,
    cancel: CancellationToken,
    key: &[u8],
    loader: F,
  ) -> Result<Value, CacheError>
  where
    F: FnOnce(CancellationToken) -> Result<T, E>,
    T: Any + Send + Sync,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
  {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }
    if let Some(value) = self.table.lookup(key)? {
      return Ok(value);
    }
    self.singleflight.get_or_load_with_context(
      cancel,
      key,
      move |token| loader(token).map(|value| Arc::new(value) as Value),
      |value| {
        let _ = self.table.store(key, Arc::clone(value));
      },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_and_lookup_round_trip() {
    let cache = Cache::new(CacheConfig::new(16));
    assert!(cache.store(b"a", 1_i32).unwrap());
    let value = cache.lookup(b"a").unwrap().unwrap();
    assert_eq!(*value.downcast_ref::<i32>().unwrap(), 1);
  }

  #[test]
  fn get_or_load_stores_the_loaded_value() {
    let cache = Cache::new(CacheConfig::new(16));
    let value = cache
      .get_or_load(b"a", || Ok::<_, std::convert::Infallible>(7_i32))
      .unwrap();
    assert_eq!(*value.downcast_ref::<i32>().unwrap(), 7);
    let cached = cache.lookup(b"a").unwrap().unwrap();
    assert_eq!(*cached.downcast_ref::<i32>().unwrap(), 7);
  }

  #[test]
  fn capacity_eviction_scenario() {
    let cache = Cache::new(CacheConfig::new(3));
    for (key, value) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
      cache.store(key.as_bytes(), value).unwrap();
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.stats().evictions, 1);
  }

  #[test]
  fn ttl_scenario_with_mock_clock() {
    use crate::clock::MockClock;
    use std::sync::Arc as StdArc;

    let clock = StdArc::new(MockClock::new());
    let config = CacheConfig::new(100)
      .with_default_ttl_ns(100_000_000)
      .with_clock(clock.clone());
    let cache = Cache::new(config);

    cache.store(b"k", "v".to_string()).unwrap();
    clock.advance(50_000_000);
    assert!(cache.lookup(b"k").unwrap().is_some());

    clock.advance(100_000_000);
    assert!(!cache.contains(b"k").unwrap());
    assert!(cache.lookup(b"k").unwrap().is_none());
    assert!(cache.stats().expirations >= 1);
  }

  #[test]
  fn heterogeneous_payload_scenario() {
    let cache = Cache::new(CacheConfig::new(1000));
    cache.store(b"k", 1_i32).unwrap();
    cache.store(b"k", "s".to_string()).unwrap();
    cache.store(b"k", 3.0_f64).unwrap();
    let value = cache.lookup(b"k").unwrap().unwrap();
    assert_eq!(*value.downcast_ref::<f64>().unwrap(), 3.0);
  }
}
