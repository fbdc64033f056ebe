//! Atomic aggregate counters (spec. §2, §4.1).
//!
//! Each counter is isolated on its own cache line (mirroring the table
//! crate's `Volatile` layout) since hits/misses/sets are incremented from
//! every thread on the hot path and would otherwise false-share.

use crate::padded::CachePadded;
use crate::sync::AtomicI64;
use crate::sync::AtomicU64;
use crate::sync::Ordering;

/// A point-in-time read of the stats counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub hits: u64,
  pub misses: u64,
  pub sets: u64,
  pub deletes: u64,
  pub evictions: u64,
  pub expirations: u64,
  pub size: u64,
  pub capacity: usize,
}

pub struct Stats {
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  sets: CachePadded<AtomicU64>,
  deletes: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
  expirations: CachePadded<AtomicU64>,
  // Signed and clamped at read time: concurrent evictions and deletes
  // must never be allowed to panic on underflow (spec. §4.1).
  size: CachePadded<AtomicI64>,
}

impl Stats {
  #[must_use]
  pub fn new(_capacity: usize) -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      sets: CachePadded::new(AtomicU64::new(0)),
      deletes: CachePadded::new(AtomicU64::new(0)),
      evictions: CachePadded::new(AtomicU64::new(0)),
      expirations: CachePadded::new(AtomicU64::new(0)),
      size: CachePadded::new(AtomicI64::new(0)),
    }
  }

  #[inline]
  pub fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_set(&self) {
    self.sets.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_delete(&self) {
    self.deletes.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_eviction(&self) {
    self.evictions.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_expiration(&self) {
    self.expirations.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn size_add(&self, delta: i64) {
    self.size.fetch_add(delta, Ordering::Relaxed);
  }

  #[inline]
  pub fn size_sub(&self, delta: i64) {
    self.size.fetch_sub(delta, Ordering::Relaxed);
  }

  #[inline]
  pub fn size(&self) -> i64 {
    self.size.load(Ordering::Relaxed).max(0)
  }

  pub fn reset(&self) {
    self.hits.store(0, Ordering::Relaxed);
    self.misses.store(0, Ordering::Relaxed);
    self.sets.store(0, Ordering::Relaxed);
    self.deletes.store(0, Ordering::Relaxed);
    self.evictions.store(0, Ordering::Relaxed);
    self.expirations.store(0, Ordering::Relaxed);
    self.size.store(0, Ordering::Relaxed);
  }

  pub fn snapshot(&self, capacity: usize) -> StatsSnapshot {
    StatsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      sets: self.sets.load(Ordering::Relaxed),
      deletes: self.deletes.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
      expirations: self.expirations.load(Ordering::Relaxed),
      size: self.size().max(0) as u64,
      capacity,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn size_never_reported_negative() {
    let stats = Stats::new(16);
    stats.size_sub(5);
    assert_eq!(stats.size(), 0);
  }

  #[test]
  fn reset_zeroes_every_counter() {
    let stats = Stats::new(16);
    stats.record_hit();
    stats.record_eviction();
    stats.size_add(3);
    stats.reset();
    let snapshot = stats.snapshot(16);
    assert_eq!(snapshot.hits, 0);
    assert_eq!(snapshot.evictions, 0);
    assert_eq!(snapshot.size, 0);
  }
}
