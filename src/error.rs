//! The error taxonomy the core surfaces.
//!
//! Only the shape described by the specification is implemented here: a
//! small, closed set of kinds with no embedder-specific extensions.

use std::error::Error as StdError;
use std::fmt;

/// Errors produced by the core's public operations.
///
/// `store` failure due to an exhausted table is intentionally *not* a
/// variant here: it is surfaced as `false` from [`crate::Cache::store`],
/// not as an error.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  /// An operation that rejects empty keys (opt-in) was called with one.
  #[error("empty key rejected")]
  EmptyKey,

  /// `get_or_load*` was called with no usable loader.
  #[error("invalid loader")]
  InvalidLoader,

  /// The loader panicked; the panic payload is carried for diagnostics.
  #[error("loader panicked: {0}")]
  PanicRecovered(String),

  /// The loader ran and returned an error.
  #[error("loader failed: {0}")]
  LoaderFailed(#[source] Box<dyn StdError + Send + Sync>),

  /// The cancellation signal fired before or during the wait.
  #[error("operation cancelled")]
  Cancelled,
}

impl CacheError {
  /// Builds a [`CacheError::PanicRecovered`] from a `catch_unwind` payload.
  pub(crate) fn from_panic_payload(payload: &(dyn std::any::Any + Send)) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_owned()
    };
    CacheError::PanicRecovered(message)
  }
}

/// Placeholder `Display`-only helper used by loaders that want to box an
/// arbitrary error without pulling in a dependency of their own.
#[derive(Debug)]
pub struct LoaderError(pub String);

impl fmt::Display for LoaderError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl StdError for LoaderError {}
