//! # Recency Cache
//!
//! A thread-safe, in-memory key/value cache with:
//! - **Least-recently-used eviction** over an O(1) hash index + recency list
//! - **Three independent limits**: entry count, total cost, and entry age
//! - **Background trimming** on a per-cache worker thread
//! - **Deferred release** of evicted values, never under the cache lock
//! - **Lifecycle hooks** for memory pressure and backgrounding
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use recency_cache::CacheBuilder;
//!
//! #[derive(Debug, PartialEq)]
//! struct Thumbnail {
//!     pixels: Vec<u8>,
//! }
//!
//! let cache = CacheBuilder::new()
//!     .name("thumbnails")
//!     .count_limit(1_000)
//!     .cost_limit(16 * 1024 * 1024)
//!     .age_limit(Duration::from_secs(600))
//!     .build::<String, Thumbnail>()
//!     .unwrap();
//!
//! // Insert with an explicit cost, e.g. the decoded size in bytes
//! let thumb = Thumbnail { pixels: vec![0; 4096] };
//! cache.put_with_cost("cat.png".to_string(), thumb, 4096);
//!
//! // Lookups return an Arc and mark the entry most recently used
//! let hit: Option<Arc<Thumbnail>> = cache.get("cat.png");
//! assert_eq!(hit.map(|t| t.pixels.len()), Some(4096));
//! assert_eq!(cache.total_cost(), 4096);
//! ```
//!
//! ## Limits
//!
//! The count limit is enforced inline by `put`: inserting past it evicts the
//! least recently used entry before `put` returns. Exceeding the cost limit
//! queues a trim on the background worker instead, so the total cost may
//! briefly overshoot. The age limit is enforced by the periodic trim pass,
//! which also re-applies the count and cost limits. All three can be enforced
//! on demand with [`Cache::trim_to_count`], [`Cache::trim_to_cost`] and
//! [`Cache::trim_to_age`].
//!
//! ## Thread Safety
//!
//! The cache is `Send + Sync` and can be shared across threads via `Arc`:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use recency_cache::Cache;
//!
//! let cache: Arc<Cache<u64, u64>> = Arc::new(Cache::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let cache = cache.clone();
//!         thread::spawn(move || {
//!             cache.put(i, i * 10);
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.total_count(), 4);
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` for trims, reconfiguration and
//! lifecycle events, `warn` when the background worker cannot be started.

mod builder;
mod cache;
mod config;
mod error;
mod hooks;
mod index;
mod metrics;
mod release;
mod scheduler;
mod traits;
mod trim;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use config::{CacheConfig, DEFAULT_AUTO_TRIM_INTERVAL};
pub use deepsize::DeepSizeOf;
pub use error::ConfigError;
pub use hooks::{LifecycleCallback, LifecycleEvent};
pub use metrics::CacheMetrics;
pub use traits::{CacheKey, CacheValue};
