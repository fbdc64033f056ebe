//! A lock-free, high-concurrency in-memory cache with W-TinyLFU admission
//! and singleflight loading.
//!
//! `tinylfu-cache` stores entries in a fixed-capacity, never-resized,
//! open-addressed table. Every slot is governed by a small atomic state
//! machine, so lookups, stores, and removals never block and never take a
//! lock. Admission and eviction are approximated with a W-TinyLFU policy: a
//! compact count-min frequency sketch guides sampled eviction when the
//! table overflows its configured capacity.
//!
//! # Overview
//!
//! ```
//! use tinylfu_cache::{Cache, CacheConfig};
//!
//! let cache = Cache::new(CacheConfig::new(1024));
//!
//! cache.store(b"user:42", "alice".to_string()).unwrap();
//! let hit = cache.lookup(b"user:42").unwrap();
//! assert!(hit.is_some());
//! ```
//!
//! # TTL
//!
//! Entries may carry a default time-to-live. Expiration is checked lazily
//! on lookup, optionally during probing, and may be swept in bulk:
//!
//! ```
//! use tinylfu_cache::{Cache, CacheConfig};
//!
//! let cache = Cache::new(CacheConfig::new(64).with_default_ttl_ns(0));
//! assert_eq!(cache.expire_now(), 0); // TTL disabled, nothing to sweep
//! ```
//!
//! # Singleflight
//!
//! Concurrent misses on the same key collapse into one loader execution:
//!
//! ```
//! use tinylfu_cache::{Cache, CacheConfig};
//!
//! let cache = Cache::new(CacheConfig::new(64));
//! let value = cache.get_or_load(b"k", || Ok::<_, std::convert::Infallible>(42_i32)).unwrap();
//! assert_eq!(*value.downcast_ref::<i32>().unwrap(), 42);
//! ```
//!
//! # Concurrency
//!
//! All operations are thread-safe and safe to call from any number of
//! threads at any time. See the crate's `DESIGN.md` for the grounding of
//! each subsystem.
//!
//! # Scope
//!
//! This crate implements the core cache only: the open-addressed table,
//! the W-TinyLFU policy, TTL/expiration, and the singleflight loader. The
//! [`crate::clock::Clock`], [`crate::telemetry::Telemetry`], and
//! [`crate::telemetry::Logger`] collaborators are specified only at the
//! interface level, with the thinnest usable defaults.

mod cache;
mod clock;
mod config;
mod error;
mod padded;
mod policy;
mod singleflight;
mod sketch;
mod slot;
mod stats;
mod sync;
mod table;
mod telemetry;

pub use self::cache::Cache;
pub use self::clock::Clock;
pub use self::clock::MockClock;
pub use self::clock::SystemClock;
pub use self::config::CacheConfig;
pub use self::config::Capacity;
pub use self::error::CacheError;
pub use self::singleflight::CancellationHandle;
pub use self::singleflight::CancellationToken;
pub use self::slot::Value;
pub use self::stats::StatsSnapshot;
pub use self::telemetry::Logger;
pub use self::telemetry::NoopTelemetry;
pub use self::telemetry::Telemetry;
pub use self::telemetry::TracingLogger;
