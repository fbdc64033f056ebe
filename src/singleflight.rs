//! The singleflight loader (spec. §4.5).
//!
//! The in-flight record map follows the same shape as a keyed idempotency
//! cache: a concurrent map from key to a shared in-flight record, with
//! leader/waiter election performed by an atomic insert-or-get rather than
//! a separate mutex. Completion is signalled by dropping a
//! `crossbeam_channel` sender — every clone of its receiver then observes
//! the channel disconnect, which doubles as a broadcast wake-up for an
//! arbitrary number of waiters.

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use crossbeam_channel::Receiver;
use crossbeam_channel::Select;
use crossbeam_channel::Sender;
use crossbeam_channel::bounded;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::CacheError;
use crate::error::LoaderError;
use crate::slot::Value;

type LoadResult = Result<Value, CacheError>;

struct InFlight {
  result: OnceLock<LoadResult>,
  // `None` once the leader has published, which is what actually signals
  // completion to every receiver clone waiting on `done_rx`.
  done_tx: Mutex<Option<Sender<()>>>,
  done_rx: Receiver<()>,
}

impl InFlight {
  fn new() -> Arc<Self> {
    let (done_tx, done_rx) = bounded(0);
    Arc::new(Self {
      result: OnceLock::new(),
      done_tx: Mutex::new(Some(done_tx)),
      done_rx,
    })
  }

  /// Publishes the result and broadcasts completion to every waiter by
  /// dropping the one remaining sender.
  fn finish(&self, result: LoadResult) {
    let _ = self.result.set(result);
    self.done_tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
  }
}

/// A cooperative cancellation signal, shared between a caller and the
/// waiters/loader it spawns on its behalf.
#[derive(Clone)]
pub struct CancellationToken {
  rx: Receiver<()>,
}

impl CancellationToken {
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    matches!(self.rx.try_recv(), Err(crossbeam_channel::TryRecvError::Disconnected))
  }

  /// A token that never fires, for loaders invoked through
  /// [`SingleFlightGroup::get_or_load`] (which has no cancellation
  /// concept of its own but still hands the leader a token, in case it
  /// wants to share loader code with the context-aware path).
  fn inert() -> Self {
    static CHANNEL: OnceLock<(Sender<()>, Receiver<()>)> = OnceLock::new();
    let (_tx, rx) = CHANNEL.get_or_init(|| bounded(0));
    Self { rx: rx.clone() }
  }
}

/// The caller-owned half of a [`CancellationToken`] pair.
pub struct CancellationHandle {
  tx: Option<Sender<()>>,
  token: CancellationToken,
}

impl CancellationHandle {
  #[must_use]
  pub fn new() -> Self {
    let (tx, rx) = bounded(0);
    Self {
      tx: Some(tx),
      token: CancellationToken { rx },
    }
  }

  #[must_use]
  pub fn token(&self) -> CancellationToken {
    self.token.clone()
  }

  /// Fires cancellation. Idempotent.
  pub fn cancel(&mut self) {
    self.tx.take();
  }
}

impl Default for CancellationHandle {
  fn default() -> Self {
    Self::new()
  }
}

/// The keyed in-flight load map (spec. §4.5).
pub struct SingleFlightGroup {
  inflight: DashMap<Box<[u8]>, Arc<InFlight>>,
}

impl SingleFlightGroup {
  #[must_use]
  pub fn new() -> Self {
    Self {
      inflight: DashMap::new(),
    }
  }

  /// Collapses concurrent calls for `key` into one `loader` execution. Only
  /// the elected leader runs `on_success`, which every waiter's return
  /// value still reflects — it exists so the caller (the table store) runs
  /// exactly once per load, not once per waiter.
  pub fn get_or_load<F, E, S>(&self, key: &[u8], loader: F, on_success: S) -> LoadResult
  where
    F: FnOnce() -> Result<Value, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    S: FnOnce(&Value),
  {
    self.run(key, None, move |_cancel| loader(), on_success)
  }

  /// As [`Self::get_or_load`], but the loader receives a cancellation
  /// token and every waiter races the load's completion against its own
  /// cancellation.
  pub fn get_or_load_with_context<F, E, S>(
    &self,
    cancel: CancellationToken,
    key: &[u8],
    loader: F,
    on_success: S,
  ) -> LoadResult
  where
    F: FnOnce(CancellationToken) -> Result<Value, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    S: FnOnce(&Value),
  {
    if cancel.is_cancelled() {
      return Err(CacheError::Cancelled);
    }
    self.run(key, Some(cancel), loader, on_success)
  }

  fn run<F, E, S>(
    &self,
    key: &[u8],
    cancel: Option<CancellationToken>,
    loader: F,
    on_success: S,
  ) -> LoadResult
  where
    F: FnOnce(CancellationToken) -> Result<Value, E>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    S: FnOnce(&Value),
  {
    let (record, is_leader) = match self.inflight.entry(key.to_vec().into_boxed_slice()) {
      Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
      Entry::Vacant(vacant) => {
        let record = InFlight::new();
        vacant.insert(Arc::clone(&record));
        (record, true)
      }
    };

    if !is_leader {
      return self.wait(&record, cancel.as_ref());
    }

    let loader_cancel = cancel.clone().unwrap_or_else(CancellationToken::inert);
    let outcome = catch_unwind(AssertUnwindSafe(|| loader(loader_cancel)));

    let result: LoadResult = match outcome {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(error)) => Err(CacheError::LoaderFailed(error.into())),
      Err(payload) => Err(CacheError::from_panic_payload(payload.as_ref())),
    };

    if let Some(cancel) = &cancel {
      if cancel.is_cancelled() && result.is_ok() {
        // A cancelled leader still publishes so any concurrent waiter
        // that raced the cancellation isn't left hanging, but its own
        // return value is the cancellation error (spec. §4.5). The load
        // still succeeded, so it's still the one store.
        let value = result.ok().expect("checked is_ok above");
        on_success(&value);
        record.finish(Ok(Arc::clone(&value)));
        self.inflight.remove(key);
        return Err(CacheError::Cancelled);
      }
    }

    if let Ok(value) = &result {
      on_success(value);
    }
    let outgoing = clone_result(&result);
    record.finish(result);
    self.inflight.remove(key);
    outgoing
  }

  fn wait(&self, record: &Arc<InFlight>, cancel: Option<&CancellationToken>) -> LoadResult {
    match cancel {
      None => {
        let _ = record.done_rx.recv();
      }
      Some(cancel) => {
        let mut select = Select::new();
        let done_index = select.recv(&record.done_rx);
        let cancel_index = select.recv(&cancel.rx);
        let chosen = select.ready();
        if chosen == cancel_index {
          let _ = cancel.rx.try_recv();
          return Err(CacheError::Cancelled);
        }
        debug_assert_eq!(chosen, done_index);
        let _ = record.done_rx.try_recv();
      }
    }
    record
      .result
      .get()
      .map_or(Err(CacheError::Cancelled), clone_result)
  }
}

impl Default for SingleFlightGroup {
  fn default() -> Self {
    Self::new()
  }
}

fn clone_result(result: &LoadResult) -> LoadResult {
  match result {
    Ok(value) => Ok(Arc::clone(value)),
    Err(CacheError::EmptyKey) => Err(CacheError::EmptyKey),
    Err(CacheError::InvalidLoader) => Err(CacheError::InvalidLoader),
    Err(CacheError::PanicRecovered(message)) => Err(CacheError::PanicRecovered(message.clone())),
    Err(CacheError::LoaderFailed(source)) => {
      Err(CacheError::LoaderFailed(Box::new(LoaderError(source.to_string()))))
    }
    Err(CacheError::Cancelled) => Err(CacheError::Cancelled),
  }
}
