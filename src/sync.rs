//! Atomic type aliases, switched between `std`, `loom`, and `shuttle`.
//!
//! The table's state machine and counters are expressed once against this
//! module so the same code can run under a concurrency model checker.

#[cfg(all(loom, shuttle))]
compile_error!("cannot use loom and shuttle at once");

#[cfg(not(any(loom, shuttle)))]
mod exports {
  pub(crate) use ::core::sync::atomic::AtomicI64;
  pub(crate) use ::core::sync::atomic::AtomicU64;
  pub(crate) use ::core::sync::atomic::AtomicU8;
  pub(crate) use ::core::sync::atomic::AtomicUsize;
  pub(crate) use ::core::sync::atomic::Ordering;
}

#[cfg(loom)]
mod exports {
  pub(crate) use ::loom::sync::atomic::AtomicI64;
  pub(crate) use ::loom::sync::atomic::AtomicU64;
  pub(crate) use ::loom::sync::atomic::AtomicU8;
  pub(crate) use ::loom::sync::atomic::AtomicUsize;
  pub(crate) use ::loom::sync::atomic::Ordering;
}

#[cfg(shuttle)]
mod exports {
  pub(crate) use ::shuttle::sync::atomic::AtomicI64;
  pub(crate) use ::shuttle::sync::atomic::AtomicU64;
  pub(crate) use ::shuttle::sync::atomic::AtomicU8;
  pub(crate) use ::shuttle::sync::atomic::AtomicUsize;
  pub(crate) use ::shuttle::sync::atomic::Ordering;
}

pub(crate) use self::exports::*;
