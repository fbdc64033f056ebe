//! The telemetry and logging collaborators (spec. §6).
//!
//! Both interfaces are out of scope for deep implementation — only their
//! shape is required — so the defaults here are deliberately thin: a no-op
//! telemetry sink, and a logger that forwards to `tracing`, whose macros
//! already compile out to nothing without a subscriber installed.

/// Per-operation event sink.
///
/// Every method must be allocation-free and non-blocking in a production
/// implementation; the default [`NoopTelemetry`] satisfies this trivially.
pub trait Telemetry: Send + Sync {
  /// Records a cache hit.
  fn record_hit(&self) {}

  /// Records a cache miss.
  fn record_miss(&self) {}

  /// Records one eviction.
  fn record_eviction(&self) {}

  /// Records one lazily or bulk expired entry.
  fn record_expiration(&self) {}

  /// Records the latency of a named operation, in nanoseconds.
  fn record_latency(&self, _operation: &str, _nanos: u64) {}
}

/// The default no-op [`Telemetry`] sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Structured, leveled diagnostic logging.
pub trait Logger: Send + Sync {
  fn debug(&self, message: &str);
  fn info(&self, message: &str);
  fn warn(&self, message: &str);
  fn error(&self, message: &str);
}

/// The default [`Logger`]: delegates to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
  #[inline]
  fn debug(&self, message: &str) {
    tracing::debug!(target: "tinylfu_cache", "{message}");
  }

  #[inline]
  fn info(&self, message: &str) {
    tracing::info!(target: "tinylfu_cache", "{message}");
  }

  #[inline]
  fn warn(&self, message: &str) {
    tracing::warn!(target: "tinylfu_cache", "{message}");
  }

  #[inline]
  fn error(&self, message: &str) {
    tracing::error!(target: "tinylfu_cache", "{message}");
  }
}
