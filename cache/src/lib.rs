//! A sharded, highly concurrent LRU cache.
//!
//! # Features
//! - **Sharded Storage**: Keys are spread over independently locked shards so
//!   readers and writers of different keys rarely contend.
//! - **Single-Owner Recency**: One coordinator thread owns the LRU list and the
//!   running total weight; callers only ever enqueue notices for it.
//! - **Best-Effort Promotion**: A hot entry is moved to the front only every
//!   few reads, and promotions are dropped rather than blocking when the
//!   coordinator falls behind.
//! - **TTL and Weights**: Every entry carries a deadline and a weight; GC keeps
//!   the total weight under `max_size`.
//! - **Tracking**: [`Tracked`] handles pin entries so GC leaves them alone.
//! - **Counters**: [`Cache::increment`] adjusts [`Counter`] values in place.
//! - **Observability**: [`MetricsSnapshot`] and an optional [`EvictionListener`].
//!
//! ```
//! use fibre_lru::{Cache, Configuration};
//! use std::time::Duration;
//!
//! let cache: Cache<String, u32> = Cache::new(Configuration::default()).unwrap();
//! cache.set("answer".to_string(), 42, Duration::from_secs(60));
//!
//! let entry = cache.get("answer").unwrap();
//! assert_eq!(*entry.value(), 42);
//! assert!(!entry.is_expired());
//! ```

mod cache;
mod config;
mod counter;
mod entry;
mod error;
mod listener;
mod metrics;
mod recency;
mod store;
mod task;
mod time;
mod tracked;

pub use cache::{Cache, KeyPrefix};
pub use config::{Configuration, Weigher};
pub use counter::Counter;
pub use entry::Entry;
pub use error::BuildError;
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::MetricsSnapshot;
pub use tracked::Tracked;
