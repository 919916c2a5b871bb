use crate::entry::Entry;

use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The entry was pruned by a GC sweep because the cache was over its max size.
  Capacity,
  /// The entry was removed with `delete`, `delete_prefix` or `delete_matching`.
  Invalidated,
  /// The entry was overwritten by a later `set` for the same key.
  Replaced,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Invalidated => write!(f, "manually invalidated"),
      EvictionReason::Replaced => write!(f, "replaced by a newer value"),
    }
  }
}

/// A listener that can be registered with the cache to be told when entries
/// leave the recency list.
///
/// `on_evict` runs on the coordinator thread. It must be quick and must not
/// call back into the cache synchronously, or the coordinator can deadlock
/// against its own queues.
pub trait EvictionListener<K, V>: Send + Sync {
  fn on_evict(&self, entry: &Arc<Entry<K, V>>, reason: EvictionReason);
}

impl<K, V, F> EvictionListener<K, V> for F
where
  F: Fn(&Arc<Entry<K, V>>, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, entry: &Arc<Entry<K, V>>, reason: EvictionReason) {
    self(entry, reason)
  }
}
