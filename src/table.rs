//! The lock-free open-addressed table (spec. §3, §4.1).
//!
//! Sizing, probing, and the CAS-disciplined state machine follow the table
//! crate's `Volatile`/`ReadOnly` split: a handful of padded atomic counters
//! for bookkeeping, plus an array of slots read under an [`sdd::Guard`].
//! Unlike the table crate, capacity here is a runtime constructor argument
//! (spec. §6), so slots live in a `Vec` rather than a const-generic array.

use std::hash::BuildHasher;
use std::hash::Hasher;

use sdd::Guard;

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::padded::CachePadded;
use crate::policy;
use crate::sketch::Sketch;
use crate::slot::Slot;
use crate::slot::State;
use crate::slot::Value;
use crate::stats::Stats;
use crate::stats::StatsSnapshot;
use crate::sync::Ordering;
use crate::telemetry::Logger;
use crate::telemetry::Telemetry;
use std::sync::Arc;

/// The lock-free entry store. Owns the slots, the sizing, the frequency
/// sketch, the stats counters, the TTL default, and the clock — the full
/// set of attributes spec. §3 assigns to "Table".
pub struct Table {
  slots: Vec<CachePadded<Slot>>,
  mask: usize,
  capacity: usize,
  default_ttl_ns: i64,
  reject_empty_keys: bool,
  hash_builder: ahash::RandomState,
  sketch: Sketch,
  stats: Stats,
  clock: Arc<dyn Clock>,
  telemetry: Arc<dyn Telemetry>,
  logger: Arc<dyn Logger>,
}

/// `size` rounding: power of two, at least `2 * capacity`, minimum 16
/// (spec. §3).
fn table_size(capacity: usize) -> usize {
  (capacity.saturating_mul(2)).max(16).next_power_of_two()
}

impl Table {
  #[must_use]
  pub fn new(config: &CacheConfig) -> Self {
    let capacity = config.capacity.get();
    let size = table_size(capacity);
    let slots = (0..size).map(|_| CachePadded::new(Slot::new())).collect();
    Self {
      slots,
      mask: size - 1,
      capacity,
      default_ttl_ns: config.default_ttl_ns,
      reject_empty_keys: config.reject_empty_keys,
      hash_builder: ahash::RandomState::new(),
      sketch: Sketch::with_default_rows(capacity),
      stats: Stats::new(capacity),
      clock: Arc::clone(&config.clock),
      telemetry: Arc::clone(&config.telemetry),
      logger: Arc::clone(&config.logger),
    }
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.stats.size()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot(self.capacity)
  }

  #[inline]
  pub(crate) fn hash(&self, key: &[u8]) -> u64 {
    let mut hasher = self.hash_builder.build_hasher();
    hasher.write(key);
    hasher.finish()
  }

  fn check_key(&self, key: &[u8]) -> Result<(), CacheError> {
    if self.reject_empty_keys && key.is_empty() {
      return Err(CacheError::EmptyKey);
    }
    Ok(())
  }

  fn compute_expire_at(&self) -> i64 {
    if self.default_ttl_ns <= 0 {
      0
    } else {
      self.clock.now_nanos().saturating_add(self.default_ttl_ns)
    }
  }

  fn is_expired(&self, expire_at: i64, now: i64) -> bool {
    expire_at > 0 && now > expire_at
  }

  /// `store(key, value)` (spec. §4.1).
  pub fn store(&self, key: &[u8], value: Value) -> Result<bool, CacheError> {
    self.check_key(key)?;
    let hash = self.hash(key);
    self.sketch.increment(hash);
    let expire_at = self.compute_expire_at();
    let guard = Guard::new();

    let size = self.slots.len();
    let start = (hash as usize) & self.mask;

    for step in 0..size {
      let index = (start + step) & self.mask;
      let slot: &Slot = &self.slots[index];

      match slot.state(Ordering::Acquire) {
        State::Empty | State::Deleted => {
          let from = slot.state(Ordering::Acquire);
          if !slot.cas_state(from, State::Pending, Ordering::AcqRel) {
            continue;
          }
          slot.set_key_hash(hash, Ordering::Relaxed);
          slot.publish_key(key.to_vec().into_boxed_slice());
          slot.publish_value(value);
          slot.set_expire_at(expire_at, Ordering::Relaxed);
          slot.store_state(State::Valid, Ordering::Release);
          if from == State::Empty {
            self.stats.size_add(1);
          }
          self.stats.record_set();
          if self.stats.size() as usize > self.capacity {
            self.try_evict_once();
          }
          return Ok(true);
        }
        State::Valid if slot.key_hash(Ordering::Acquire) == hash => {
          if !slot.cas_state(State::Valid, State::Pending, Ordering::AcqRel) {
            continue;
          }
          let existing = slot.read_key(&guard);
          if existing == Some(key) {
            slot.publish_value(Arc::clone(&value));
            slot.set_expire_at(expire_at, Ordering::Relaxed);
            slot.store_state(State::Valid, Ordering::Release);
            self.stats.record_set();
            return Ok(true);
          }
          slot.store_state(State::Valid, Ordering::Release);
        }
        State::Pending | State::Valid => {}
      }
    }

    if self.try_evict_once() {
      self.logger.debug("store retried eviction after exhausting the table");
    }
    Ok(false)
  }

  /// `lookup(key)` (spec. §4.1).
  pub fn lookup(&self, key: &[u8]) -> Result<Option<Value>, CacheError> {
    self.check_key(key)?;
    let hash = self.hash(key);
    self.sketch.increment(hash);
    let guard = Guard::new();
    let start = (hash as usize) & self.mask;
    let size = self.slots.len();

    for step in 0..size {
      let index = (start + step) & self.mask;
      let slot: &Slot = &self.slots[index];

      match slot.state(Ordering::Acquire) {
        State::Empty => {
          self.stats.record_miss();
          return Ok(None);
        }
        State::Pending => continue,
        State::Valid if slot.key_hash(Ordering::Acquire) == hash => {
          if slot.state(Ordering::Acquire) != State::Valid {
            continue;
          }
          let Some(found_key) = slot.read_key(&guard) else {
            continue;
          };
          if found_key != key {
            continue;
          }
          let now = self.clock.now_nanos();
          let expire_at = slot.expire_at(Ordering::Relaxed);
          if self.is_expired(expire_at, now) {
            if slot.cas_state(State::Valid, State::Deleted, Ordering::AcqRel) {
              self.stats.size_sub(1);
              self.stats.record_expiration();
              self.telemetry.record_expiration();
            }
            self.stats.record_miss();
            return Ok(None);
          }
          let Some(value) = slot.read_value(&guard) else {
            continue;
          };
          if slot.state(Ordering::Acquire) != State::Valid {
            continue;
          }
          self.stats.record_hit();
          self.telemetry.record_hit();
          return Ok(Some(value));
        }
        State::Valid | State::Deleted => {}
      }
    }

    self.stats.record_miss();
    self.telemetry.record_miss();
    Ok(None)
  }

  /// `remove(key)` (spec. §4.1).
  pub fn remove(&self, key: &[u8]) -> Result<bool, CacheError> {
    self.check_key(key)?;
    let hash = self.hash(key);
    let guard = Guard::new();
    let start = (hash as usize) & self.mask;
    let size = self.slots.len();

    for step in 0..size {
      let index = (start + step) & self.mask;
      let slot: &Slot = &self.slots[index];

      match slot.state(Ordering::Acquire) {
        State::Empty => return Ok(false),
        State::Pending => continue,
        State::Valid if slot.key_hash(Ordering::Acquire) == hash => {
          let Some(found_key) = slot.read_key(&guard) else {
            continue;
          };
          if found_key != key {
            continue;
          }
          if slot.cas_state(State::Valid, State::Deleted, Ordering::AcqRel) {
            self.stats.size_sub(1);
            self.stats.record_delete();
            return Ok(true);
          }
        }
        State::Valid | State::Deleted => {}
      }
    }
    Ok(false)
  }

  /// `contains(key)` (spec. §4.1); must agree with `lookup` on expiry.
  pub fn contains(&self, key: &[u8]) -> Result<bool, CacheError> {
    Ok(self.lookup(key)?.is_some())
  }

  /// `clear()` (spec. §4.1).
  pub fn clear(&self) {
    for slot in &self.slots {
      slot.store_state(State::Empty, Ordering::Release);
    }
    self.sketch.reset();
    self.stats.reset();
  }

  /// Bulk sweep: tombstones every `Valid` slot whose deadline has passed.
  /// Returns the number of slots tombstoned (spec. §4.4).
  pub fn expire_now(&self) -> usize {
    if self.default_ttl_ns <= 0 {
      return 0;
    }
    let now = self.clock.now_nanos();
    let mut expired = 0_usize;
    for slot in &self.slots {
      if slot.state(Ordering::Acquire) != State::Valid {
        continue;
      }
      let expire_at = slot.expire_at(Ordering::Relaxed);
      if !self.is_expired(expire_at, now) {
        continue;
      }
      if slot.cas_state(State::Valid, State::Deleted, Ordering::AcqRel) {
        self.stats.size_sub(1);
        self.stats.record_expiration();
        self.telemetry.record_expiration();
        expired += 1;
      }
    }
    expired
  }

  fn try_evict_once(&self) -> bool {
    let evicted = policy::evict(&self.slots, self.mask, &self.sketch);
    if evicted {
      self.stats.size_sub(1);
      self.stats.record_eviction();
      self.telemetry.record_eviction();
    }
    evicted
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  fn table(capacity: usize) -> Table {
    Table::new(&CacheConfig::new(capacity))
  }

  #[test]
  fn store_then_lookup_round_trips() {
    let t = table(16);
    assert!(t.store(b"a", Arc::new(1_i32)).unwrap());
    let v = t.lookup(b"a").unwrap().unwrap();
    assert_eq!(*v.downcast_ref::<i32>().unwrap(), 1);
  }

  #[test]
  fn overwrite_updates_value() {
    let t = table(16);
    t.store(b"a", Arc::new(1_i32)).unwrap();
    t.store(b"a", Arc::new(2_i32)).unwrap();
    let v = t.lookup(b"a").unwrap().unwrap();
    assert_eq!(*v.downcast_ref::<i32>().unwrap(), 2);
  }

  #[test]
  fn remove_then_lookup_misses() {
    let t = table(16);
    t.store(b"a", Arc::new(1_i32)).unwrap();
    assert!(t.remove(b"a").unwrap());
    assert!(t.lookup(b"a").unwrap().is_none());
  }

  #[test]
  fn heterogeneous_value_types_across_stores() {
    let t = table(16);
    t.store(b"k", Arc::new(1_i32)).unwrap();
    t.store(b"k", Arc::new("hello".to_string())).unwrap();
    t.store(b"k", Arc::new(3.5_f64)).unwrap();
    let v = t.lookup(b"k").unwrap().unwrap();
    assert_eq!(*v.downcast_ref::<f64>().unwrap(), 3.5);
  }

  #[test]
  fn clear_empties_the_table() {
    let t = table(16);
    t.store(b"a", Arc::new(1_i32)).unwrap();
    t.clear();
    assert_eq!(t.len(), 0);
    assert!(t.lookup(b"a").unwrap().is_none());
  }

  #[test]
  fn capacity_overshoot_triggers_eviction() {
    let t = table(3);
    for (key, value) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
      t.store(key.as_bytes(), Arc::new(value)).unwrap();
    }
    assert_eq!(t.len(), 3);
    assert_eq!(t.stats().evictions, 1);
  }
}
