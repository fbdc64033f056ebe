//! Construction-time configuration (spec. §6).

use std::sync::Arc;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::telemetry::NoopTelemetry;
use crate::telemetry::Telemetry;
use crate::telemetry::TracingLogger;
use crate::telemetry::Logger;

/// The maximum logical number of entries the table will hold.
///
/// This is the value the embedder asked for, not an internal sizing detail:
/// a `Capacity::new(3)` cache holds exactly 3 entries before eviction kicks
/// in. The backing table itself is sized separately (see
/// `table::table_size`), rounded up to a power of two for probing — that
/// rounding must never leak back into the logical capacity. Non-positive
/// input (`0`) reverts to [`Capacity::DEFAULT`]; everything else is clamped
/// only to [`Capacity::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity(usize);

impl Capacity {
  /// The maximum table capacity.
  pub const MAX: usize = 1 << 27;

  /// The capacity used when none is supplied or the supplied value is
  /// invalid.
  pub const DEFAULT: usize = 1 << 10;

  /// Builds a capacity: `0` reverts to [`Self::DEFAULT`], everything else is
  /// kept exactly as requested (clamped only to [`Self::MAX`]).
  #[must_use]
  pub fn new(requested: usize) -> Self {
    let requested = if requested == 0 {
      Self::DEFAULT
    } else {
      requested
    };
    Self(requested.min(Self::MAX))
  }

  #[must_use]
  #[inline]
  pub const fn get(self) -> usize {
    self.0
  }
}

impl Default for Capacity {
  fn default() -> Self {
    Self::new(Self::DEFAULT)
  }
}

/// Policy tuning knobs plus the out-of-scope collaborator slots.
///
/// Invalid values for `window_ratio` and `counter_bits` silently revert to
/// their defaults rather than erroring (spec. §6); the embedder is warned
/// via the configured [`Logger`].
pub struct CacheConfig {
  /// Maximum logical number of entries (see [`Capacity`]).
  pub capacity: Capacity,

  /// Default entry TTL in nanoseconds. `0` disables TTL.
  pub default_ttl_ns: i64,

  /// Fraction of the sketch devoted to a recency window. Unused by the
  /// sampled-eviction policy implemented here (see `DESIGN.md`'s Open
  /// Question note on the window segment) but retained as a recognized,
  /// validated configuration knob per spec. §6.
  pub window_ratio: f64,

  /// Bits per frequency-sketch counter. Only `4` is supported; anything
  /// else reverts to the default.
  pub counter_bits: u8,

  /// Whether `store`/`lookup`/etc. reject empty keys with
  /// [`crate::error::CacheError::EmptyKey`].
  pub reject_empty_keys: bool,

  /// The monotonic clock collaborator.
  pub clock: Arc<dyn Clock>,

  /// The telemetry sink collaborator.
  pub telemetry: Arc<dyn Telemetry>,

  /// The structured logger collaborator.
  pub logger: Arc<dyn Logger>,
}

const DEFAULT_WINDOW_RATIO: f64 = 0.01;
const DEFAULT_COUNTER_BITS: u8 = 4;

impl CacheConfig {
  /// Starts from defaults with the given capacity; use the builder-style
  /// setters to customize further.
  #[must_use]
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: Capacity::new(capacity),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_default_ttl_ns(mut self, ttl_ns: i64) -> Self {
    self.default_ttl_ns = ttl_ns.max(0);
    self
  }

  #[must_use]
  pub fn with_window_ratio(mut self, ratio: f64) -> Self {
    self.window_ratio = if ratio.is_finite() && ratio > 0.0 && ratio < 1.0 {
      ratio
    } else {
      self.logger.warn("invalid window_ratio, reverting to default");
      DEFAULT_WINDOW_RATIO
    };
    self
  }

  #[must_use]
  pub fn with_counter_bits(mut self, bits: u8) -> Self {
    self.counter_bits = if bits == 4 {
      bits
    } else {
      self.logger.warn("unsupported counter_bits, reverting to default");
      DEFAULT_COUNTER_BITS
    };
    self
  }

  #[must_use]
  pub fn with_reject_empty_keys(mut self, reject: bool) -> Self {
    self.reject_empty_keys = reject;
    self
  }

  #[must_use]
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  #[must_use]
  pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
    self.telemetry = telemetry;
    self
  }

  #[must_use]
  pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
    self.logger = logger;
    self
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      capacity: Capacity::default(),
      default_ttl_ns: 0,
      window_ratio: DEFAULT_WINDOW_RATIO,
      counter_bits: DEFAULT_COUNTER_BITS,
      reject_empty_keys: false,
      clock: Arc::new(SystemClock::new()),
      telemetry: Arc::new(NoopTelemetry),
      logger: Arc::new(TracingLogger),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capacity_is_kept_exact() {
    assert_eq!(Capacity::new(3).get(), 3);
    assert_eq!(Capacity::new(17).get(), 17);
    assert_eq!(Capacity::new(32).get(), 32);
  }

  #[test]
  fn capacity_clamps_to_max() {
    assert_eq!(Capacity::new(1).get(), 1);
    assert_eq!(Capacity::new(usize::MAX).get(), Capacity::MAX);
  }

  #[test]
  fn capacity_zero_uses_default() {
    assert_eq!(Capacity::new(0).get(), Capacity::DEFAULT);
  }

  #[test]
  fn invalid_window_ratio_reverts_to_default() {
    let cfg = CacheConfig::new(64).with_window_ratio(2.0);
    assert!((cfg.window_ratio - DEFAULT_WINDOW_RATIO).abs() < f64::EPSILON);
  }
}
