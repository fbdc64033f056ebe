//! End-to-end scenarios, including the literal ones from the
//! specification (capacity eviction, TTL, singleflight fan-in, panic
//! recovery, cancellation, heterogeneous payloads).

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use tinylfu_cache::Cache;
use tinylfu_cache::CacheConfig;
use tinylfu_cache::CacheError;
use tinylfu_cache::CancellationHandle;
use tinylfu_cache::MockClock;

#[test]
fn scenario_capacity_three_evicts_exactly_one() {
  let cache = Cache::new(CacheConfig::new(3));
  for (key, value) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
    assert!(cache.store(key.as_bytes(), value).unwrap());
  }
  assert_eq!(cache.len(), 3);
  assert_eq!(cache.stats().evictions, 1);

  let present = ["a", "b", "c"].iter().filter(|k| cache.contains(k.as_bytes()).unwrap()).count();
  assert_eq!(present, 2, "exactly one of {{a,b,c}} should have been evicted");
}

#[test]
fn scenario_ttl_with_mock_clock() {
  let clock = Arc::new(MockClock::new());
  let config = CacheConfig::new(100)
    .with_default_ttl_ns(100_000_000)
    .with_clock(Arc::clone(&clock) as Arc<dyn tinylfu_cache::Clock>);
  let cache = Cache::new(config);

  cache.store(b"k", "v".to_string()).unwrap();

  clock.advance(50_000_000);
  let hit = cache.lookup(b"k").unwrap().unwrap();
  assert_eq!(*hit.downcast_ref::<String>().unwrap(), "v");

  clock.advance(100_000_000);
  assert!(!cache.contains(b"k").unwrap());
  assert!(cache.lookup(b"k").unwrap().is_none());
  assert!(cache.stats().expirations >= 1);
}

#[test]
fn scenario_thousand_waiters_collapse_to_one_loader_call() {
  let cache = Arc::new(Cache::new(CacheConfig::new(64)));
  let invocations = Arc::new(AtomicUsize::new(0));

  let handles: Vec<_> = (0..1000)
    .map(|_| {
      let cache = Arc::clone(&cache);
      let invocations = Arc::clone(&invocations);
      thread::spawn(move || {
        cache.get_or_load(b"x", move || {
          invocations.fetch_add(1, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(10));
          Ok::<_, std::convert::Infallible>(42_i32)
        })
      })
    })
    .collect();

  for handle in handles {
    let value = handle.join().unwrap().unwrap();
    assert_eq!(*value.downcast_ref::<i32>().unwrap(), 42);
  }
  assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn scenario_panicking_loader_then_successful_retry() {
  let cache = Arc::new(Cache::new(CacheConfig::new(64)));

  let handles: Vec<_> = (0..10)
    .map(|_| {
      let cache = Arc::clone(&cache);
      thread::spawn(move || cache.get_or_load(b"x", || -> Result<i32, std::convert::Infallible> { panic!("boom") }))
    })
    .collect();

  for handle in handles {
    match handle.join().unwrap() {
      Err(CacheError::PanicRecovered(message)) => assert!(message.contains("boom")),
      other => panic!("expected panic-recovered, got {other:?}"),
    }
  }

  let value = cache.get_or_load(b"x", || Ok::<_, std::convert::Infallible>(7_i32)).unwrap();
  assert_eq!(*value.downcast_ref::<i32>().unwrap(), 7);

  let cached = cache.lookup(b"x").unwrap().unwrap();
  assert_eq!(*cached.downcast_ref::<i32>().unwrap(), 7);
}

#[test]
fn scenario_cancellation_returns_promptly_without_waiting_for_leader() {
  let cache = Arc::new(Cache::new(CacheConfig::new(64)));
  let mut handle = CancellationHandle::new();
  let leader_token = handle.token();

  let leader = {
    let cache = Arc::clone(&cache);
    thread::spawn(move || {
      cache.get_or_load_with_context(leader_token, b"x", |_cancel| {
        thread::sleep(Duration::from_millis(500));
        Ok::<_, std::convert::Infallible>(1_i32)
      })
    })
  };

  // Give the leader a chance to claim the in-flight record before any
  // waiter cancellation fires.
  thread::sleep(Duration::from_millis(5));

  let waiters: Vec<_> = (0..50)
    .map(|_| {
      let cache = Arc::clone(&cache);
      let token = handle.token();
      thread::spawn(move || cache.get_or_load_with_context(token, b"x", |_cancel| {
        thread::sleep(Duration::from_millis(500));
        Ok::<_, std::convert::Infallible>(1_i32)
      }))
    })
    .collect();

  thread::sleep(Duration::from_millis(5));
  handle.cancel();

  for waiter in waiters {
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(CacheError::Cancelled)));
  }
  let _ = leader.join();
}

#[test]
fn scenario_heterogeneous_value_types_across_stores() {
  let cache = Cache::new(CacheConfig::new(1000).with_default_ttl_ns(3_600_000_000_000));
  cache.store(b"k", 1_i64).unwrap();
  cache.store(b"k", "a string".to_string()).unwrap();
  cache.store(b"k", vec![1_u8, 2, 3]).unwrap();
  cache.store(b"k", 2.5_f64).unwrap();

  let value = cache.lookup(b"k").unwrap().unwrap();
  assert_eq!(*value.downcast_ref::<f64>().unwrap(), 2.5);
}

#[test]
fn clear_empties_everything() {
  let cache = Cache::new(CacheConfig::new(16));
  cache.store(b"a", 1_i32).unwrap();
  cache.store(b"b", 2_i32).unwrap();
  cache.clear();
  assert_eq!(cache.len(), 0);
  assert!(cache.lookup(b"a").unwrap().is_none());
  assert!(cache.lookup(b"b").unwrap().is_none());
}

#[test]
fn remove_then_store_then_lookup_round_trips() {
  let cache = Cache::new(CacheConfig::new(16));
  cache.store(b"k", 1_i32).unwrap();
  assert!(cache.remove(b"k").unwrap());
  cache.store(b"k", 1_i32).unwrap();
  let value = cache.lookup(b"k").unwrap().unwrap();
  assert_eq!(*value.downcast_ref::<i32>().unwrap(), 1);
}

#[test]
fn empty_key_rejection_is_opt_in() {
  let cache = Cache::new(CacheConfig::new(16).with_reject_empty_keys(true));
  assert!(matches!(cache.store(b"", 1_i32), Err(CacheError::EmptyKey)));

  let cache = Cache::new(CacheConfig::new(16));
  assert!(cache.store(b"", 1_i32).unwrap());
}
