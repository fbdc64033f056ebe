//! The per-slot atomic state machine and its key/value storage (spec. §3,
//! §4.1).
//!
//! Key and value handles are published through [`sdd::AtomicOwned`], the
//! same epoch-reclaimed publish-a-fresh-handle discipline the table crate
//! uses for its entries: a store never mutates a handle in place, it swaps
//! in a brand new one, so readers holding an older [`sdd::Guard`] keep
//! seeing a consistent value for as long as they hold it.

use std::any::Any;
use std::sync::Arc;

use sdd::AtomicOwned;
use sdd::Guard;
use sdd::Owned;
use sdd::Tag;

use crate::sync::AtomicI64;
use crate::sync::AtomicU64;
use crate::sync::AtomicU8;
use crate::sync::Ordering;

/// An opaque, heterogeneous cache payload.
///
/// Modeled as `Arc<dyn Any + Send + Sync>` rather than a generic `T` so
/// that successive stores to the same key may change the stored type
/// (spec. §3, §9, end-to-end scenario 6).
pub type Value = Arc<dyn Any + Send + Sync>;

/// The four legal slot states (spec. §3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
  Empty = 0,
  Pending = 1,
  Valid = 2,
  Deleted = 3,
}

impl State {
  #[inline]
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => State::Empty,
      1 => State::Pending,
      2 => State::Valid,
      3 => State::Deleted,
      _ => unreachable!("slot state is only ever written as one of the four enum values"),
    }
  }
}

/// One element of the open-addressed table.
///
/// Born [`State::Empty`]. All state mutation goes through CAS; `key_hash`,
/// `key`, `value`, and `expire_at` are only meaningful to a reader once it
/// has observed (and, after reading them, re-verified) `State::Valid`.
pub struct Slot {
  state: AtomicU8,
  key_hash: AtomicU64,
  key: AtomicOwned<Box<[u8]>>,
  value: AtomicOwned<Value>,
  expire_at: AtomicI64,
}

impl Slot {
  #[must_use]
  pub fn new() -> Self {
    Self {
      state: AtomicU8::new(State::Empty as u8),
      key_hash: AtomicU64::new(0),
      key: AtomicOwned::null(),
      value: AtomicOwned::null(),
      expire_at: AtomicI64::new(0),
    }
  }

  #[inline]
  pub fn state(&self, order: Ordering) -> State {
    State::from_u8(self.state.load(order))
  }

  /// Attempts `current -> new`. Returns whether the CAS succeeded.
  #[inline]
  pub fn cas_state(&self, current: State, new: State, success: Ordering) -> bool {
    self
      .state
      .compare_exchange(current as u8, new as u8, success, Ordering::Relaxed)
      .is_ok()
  }

  /// Writes a new state unconditionally. Only valid when the caller is the
  /// sole owner of the transition (e.g. publishing `Pending -> Valid`
  /// after winning the preceding CAS).
  #[inline]
  pub fn store_state(&self, new: State, order: Ordering) {
    self.state.store(new as u8, order);
  }

  #[inline]
  pub fn key_hash(&self, order: Ordering) -> u64 {
    self.key_hash.load(order)
  }

  #[inline]
  pub fn set_key_hash(&self, hash: u64, order: Ordering) {
    self.key_hash.store(hash, order);
  }

  #[inline]
  pub fn expire_at(&self, order: Ordering) -> i64 {
    self.expire_at.load(order)
  }

  #[inline]
  pub fn set_expire_at(&self, nanos: i64, order: Ordering) {
    self.expire_at.store(nanos, order);
  }

  /// Publishes a fresh key handle, replacing whatever was there before.
  pub fn publish_key(&self, key: Box<[u8]>) {
    self.key.swap((Some(Owned::new(key)), Tag::None), Ordering::Release);
  }

  /// Reads the key under `guard`, returning `None` if the slot has never
  /// held one.
  pub fn read_key<'g>(&self, guard: &'g Guard) -> Option<&'g [u8]> {
    self
      .key
      .load(Ordering::Acquire, guard)
      .as_ref()
      .map(std::convert::AsRef::as_ref)
  }

  /// Publishes a fresh value handle. The previous handle, if any, is
  /// reclaimed once no guard can still observe it.
  pub fn publish_value(&self, value: Value) {
    self.value.swap((Some(Owned::new(value)), Tag::None), Ordering::Release);
  }

  /// Clones the currently published value out from under `guard`.
  pub fn read_value(&self, guard: &Guard) -> Option<Value> {
    self.value.load(Ordering::Acquire, guard).as_ref().cloned()
  }
}

impl Default for Slot {
  fn default() -> Self {
    Self::new()
  }
}
