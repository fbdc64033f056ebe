//! W-TinyLFU sampled eviction (spec. §4.3).
//!
//! Sampling-then-CAS mirrors the retry-on-failure probing discipline used
//! throughout the table: a failed CAS just means another thread got there
//! first, and the caller falls back rather than spinning indefinitely.

use crate::padded::CachePadded;
use crate::sketch::Sketch;
use crate::slot::Slot;
use crate::slot::State;
use crate::sync::Ordering;

const SAMPLE_SIZE: usize = 5;

/// Samples `SAMPLE_SIZE` spread-out slots, evicts the one with the lowest
/// estimated frequency, and falls back to a linear scan if the sample
/// yields nothing evictable. Returns whether an eviction occurred.
pub(crate) fn evict(slots: &[CachePadded<Slot>], mask: usize, sketch: &Sketch) -> bool {
  if sample_evict(slots, mask, sketch) {
    return true;
  }
  linear_scan_evict(slots)
}

fn sample_evict(slots: &[CachePadded<Slot>], mask: usize, sketch: &Sketch) -> bool {
  let size = slots.len();
  let stride = (size / SAMPLE_SIZE).max(1);
  // A cheap, fixed spread across the table; not randomized since the
  // sketch itself already randomizes admission decisions via hashing.
  let seed = std::time::Instant::now().elapsed().subsec_nanos() as usize;

  let mut victim: Option<(usize, u8)> = None;
  for i in 0..SAMPLE_SIZE {
    let index = (seed.wrapping_add(i.wrapping_mul(stride))) & mask;
    let slot = &slots[index];
    if slot.state(Ordering::Acquire) != State::Valid {
      continue;
    }
    let hash = slot.key_hash(Ordering::Acquire);
    let frequency = sketch.estimate(hash);
    match victim {
      Some((_, best)) if best <= frequency => {}
      _ => victim = Some((index, frequency)),
    }
  }

  let Some((index, _)) = victim else {
    return false;
  };
  slots[index].cas_state(State::Valid, State::Deleted, Ordering::AcqRel)
}

fn linear_scan_evict(slots: &[CachePadded<Slot>]) -> bool {
  for slot in slots {
    if slot.state(Ordering::Acquire) == State::Valid
      && slot.cas_state(State::Valid, State::Deleted, Ordering::AcqRel)
    {
      return true;
    }
  }
  false
}
