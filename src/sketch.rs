//! Count-min frequency sketch with 4-bit saturating counters (spec. §4.2).
//!
//! Counters are packed 16 per 64-bit word. Increment is a CAS loop on the
//! containing word, the same retry-on-failure discipline the table uses
//! for its slot-state transitions.

use crate::sync::AtomicU64;
use crate::sync::Ordering;

const COUNTER_BITS: u32 = 4;
const COUNTERS_PER_WORD: usize = 64 / COUNTER_BITS as usize;
const COUNTER_MAX: u64 = (1 << COUNTER_BITS) - 1;
const DEFAULT_ROWS: usize = 4;

/// A fixed-size count-min sketch of saturating 4-bit counters.
pub struct Sketch {
  rows: usize,
  counters_per_row: usize,
  words_per_row: usize,
  words: Vec<AtomicU64>,
}

impl Sketch {
  /// Builds a sketch sized from the table's capacity, with `rows` hash
  /// rows (the specification suggests 4).
  #[must_use]
  pub fn new(capacity: usize, rows: usize) -> Self {
    let rows = rows.max(1);
    let counters_per_row = capacity.max(16).next_power_of_two();
    let words_per_row = counters_per_row.div_ceil(COUNTERS_PER_WORD).max(1);
    let words = (0..rows * words_per_row).map(|_| AtomicU64::new(0)).collect();
    Self {
      rows,
      counters_per_row,
      words_per_row,
      words,
    }
  }

  #[must_use]
  pub fn with_default_rows(capacity: usize) -> Self {
    Self::new(capacity, DEFAULT_ROWS)
  }

  fn column(&self, row: usize, hash: u64) -> usize {
    // Mix the row index into the hash so each row samples a distinct
    // projection of the key space.
    let mixed = hash ^ (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mixed = mixed ^ (mixed >> 33);
    let mixed = mixed.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    let mixed = mixed ^ (mixed >> 33);
    (mixed as usize) & (self.counters_per_row - 1)
  }

  /// Increments the counter for `hash` in every row, saturating at 15.
  pub fn increment(&self, hash: u64) {
    for row in 0..self.rows {
      let column = self.column(row, hash);
      let word_index = row * self.words_per_row + column / COUNTERS_PER_WORD;
      let shift = ((column % COUNTERS_PER_WORD) as u32) * COUNTER_BITS;
      let word = &self.words[word_index];
      let mut current = word.load(Ordering::Relaxed);
      loop {
        let counter = (current >> shift) & COUNTER_MAX;
        if counter >= COUNTER_MAX {
          break;
        }
        let updated = current + (1 << shift);
        match word.compare_exchange_weak(current, updated, Ordering::AcqRel, Ordering::Relaxed) {
          Ok(_) => break,
          Err(observed) => current = observed,
        }
      }
    }
  }

  /// Returns the minimum counter value across all rows for `hash`.
  #[must_use]
  pub fn estimate(&self, hash: u64) -> u8 {
    let mut min = u8::MAX;
    for row in 0..self.rows {
      let column = self.column(row, hash);
      let word_index = row * self.words_per_row + column / COUNTERS_PER_WORD;
      let shift = ((column % COUNTERS_PER_WORD) as u32) * COUNTER_BITS;
      let counter = ((self.words[word_index].load(Ordering::Relaxed) >> shift) & COUNTER_MAX) as u8;
      min = min.min(counter);
    }
    min
  }

  /// Zeroes every word.
  pub fn reset(&self) {
    for word in &self.words {
      word.store(0, Ordering::Relaxed);
    }
  }
}
