use crate::cache::Cache;
use crate::listener::EvictionReason;
use crate::metrics::Metrics;
use crate::time;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// A value type that can be adjusted in place by [`Cache::increment`].
///
/// Increments happen under the owning shard's write lock, but readers holding
/// the entry may observe the value concurrently, so implementations use
/// interior mutability.
pub trait Counter: Send + Sync {
  /// Creates a counter holding `initial`.
  fn with_value(initial: i64) -> Self;
  /// Adds `delta` and returns the new value.
  fn add(&self, delta: i64) -> i64;
  /// The current value.
  fn load(&self) -> i64;
}

impl Counter for AtomicI64 {
  fn with_value(initial: i64) -> Self {
    AtomicI64::new(initial)
  }

  fn add(&self, delta: i64) -> i64 {
    self.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
  }

  fn load(&self) -> i64 {
    AtomicI64::load(self, Ordering::Acquire)
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Counter + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Adds `delta` to the counter stored under `key` and returns the result.
  ///
  /// A live counter keeps its deadline. A missing or expired one is replaced
  /// by a new counter holding `delta` that expires after `ttl`.
  pub fn increment(&self, key: K, delta: i64, ttl: Duration) -> i64 {
    self.apply_increment(key, delta, ttl, false)
  }

  /// Like [`increment`](Self::increment), but a live counter's deadline is
  /// also moved to `ttl` from now.
  pub fn increment_and_renew(&self, key: K, delta: i64, ttl: Duration) -> i64 {
    self.apply_increment(key, delta, ttl, true)
  }

  /// Reads a live counter without promoting it. Missing or expired counters
  /// read as `0`.
  pub fn counter_value<Q>(&self, key: &Q) -> i64
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self
      .store
      .get_shard(key)
      .counter_value(key, time::now_nanos())
  }

  fn apply_increment(&self, key: K, delta: i64, ttl: Duration, renew: bool) -> i64 {
    let now = time::now_nanos();
    let expires_at = time::deadline_after(now, ttl);
    let result = self
      .store
      .get_shard(&key)
      .increment(key, delta, now, expires_at, renew);

    if let Some(stale) = result.displaced {
      self.notify_delete(stale, EvictionReason::Replaced);
    }
    if let Some(created) = result.created {
      Metrics::record(&self.metrics.inserts, 1);
      self.promote(&created);
    } else if let Some(touched) = result.touched {
      Metrics::record(&self.metrics.updates, 1);
      self.promote(&touched);
    }
    result.value
  }
}
