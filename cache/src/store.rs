use crate::counter::Counter;
use crate::entry::Entry;

use core::fmt;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<Q: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &Q) -> u64 {
  hasher.hash_one(key)
}

/// The result of an increment on a single shard.
pub(crate) struct Increment<K, V> {
  /// The counter's value after the operation.
  pub(crate) value: i64,
  /// A freshly created entry, when the key was absent or stale.
  pub(crate) created: Option<Arc<Entry<K, V>>>,
  /// The live entry that was updated in place.
  pub(crate) touched: Option<Arc<Entry<K, V>>>,
  /// A stale entry pushed out by `created`.
  pub(crate) displaced: Option<Arc<Entry<K, V>>>,
}

/// One independently locked partition of the keyspace.
pub(crate) struct Shard<K, V, H> {
  map: RwLock<HashMap<K, Arc<Entry<K, V>>, H>>,
}

impl<K, V, H> Shard<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher,
{
  fn new(hasher: H) -> Self {
    Self {
      map: RwLock::new(HashMap::with_hasher(hasher)),
    }
  }

  pub(crate) fn item_count(&self) -> usize {
    self.map.read().len()
  }

  pub(crate) fn get<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.map.read().get(key).cloned()
  }

  /// Unconditionally stores a new entry, returning it with the one it displaced.
  pub(crate) fn set(
    &self,
    key: K,
    value: V,
    weight: u64,
    expires_at: i64,
    track: bool,
  ) -> (Arc<Entry<K, V>>, Option<Arc<Entry<K, V>>>) {
    let entry = Arc::new(Entry::new(key.clone(), value, weight, expires_at, track));
    let existing = self.map.write().insert(key, entry.clone());
    (entry, existing)
  }

  pub(crate) fn delete<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.map.write().remove(key)
  }

  /// Removes the key only while it still maps to `entry` itself, so a newer
  /// value stored under the same key survives.
  pub(crate) fn remove_entry(&self, entry: &Arc<Entry<K, V>>) -> bool {
    let mut guard = self.map.write();
    match guard.get(entry.key()) {
      Some(current) if Arc::ptr_eq(current, entry) => {
        guard.remove(entry.key());
        true
      }
      _ => false,
    }
  }

  /// Removes every entry the predicate selects and returns them.
  ///
  /// Matching runs under the read lock so writers to this shard are only held
  /// up for the removals themselves. An entry that was replaced between the
  /// two passes is left alone.
  pub(crate) fn delete_matching<F>(&self, matches: F) -> Vec<Arc<Entry<K, V>>>
  where
    F: Fn(&K, &Entry<K, V>) -> bool,
  {
    let candidates: Vec<Arc<Entry<K, V>>> = {
      let guard = self.map.read();
      guard
        .iter()
        .filter(|&(key, entry)| matches(key, entry))
        .map(|(_, entry)| entry.clone())
        .collect()
    };

    if candidates.is_empty() {
      // Avoid the write lock if we can.
      return candidates;
    }

    let mut guard = self.map.write();
    candidates
      .into_iter()
      .filter(|entry| match guard.get(entry.key()) {
        Some(current) if Arc::ptr_eq(current, entry) => {
          guard.remove(entry.key());
          true
        }
        _ => false,
      })
      .collect()
  }

  /// Empties the shard and returns everything it held.
  pub(crate) fn clear(&self) -> Vec<Arc<Entry<K, V>>> {
    self.map.write().drain().map(|(_, entry)| entry).collect()
  }
}

impl<K, V, H> Shard<K, V, H>
where
  K: Eq + Hash + Clone,
  V: Counter,
  H: BuildHasher,
{
  /// Adds `delta` to a live counter, or replaces a missing or stale one with
  /// a new entry holding `delta`. With `renew`, a live counter's deadline is
  /// moved to `expires_at`.
  pub(crate) fn increment(
    &self,
    key: K,
    delta: i64,
    now: i64,
    expires_at: i64,
    renew: bool,
  ) -> Increment<K, V> {
    let mut guard = self.map.write();
    if let Some(existing) = guard.get(&key) {
      if !existing.is_expired_at_nanos(now) {
        let value = existing.value().add(delta);
        if renew {
          existing.set_deadline(expires_at);
        }
        return Increment {
          value,
          created: None,
          touched: Some(existing.clone()),
          displaced: None,
        };
      }
    }

    let entry = Arc::new(Entry::new(
      key.clone(),
      V::with_value(delta),
      1,
      expires_at,
      false,
    ));
    let displaced = guard.insert(key, entry.clone());
    drop(guard);

    Increment {
      value: delta,
      created: Some(entry),
      touched: None,
      displaced,
    }
  }

  /// The live counter's value, or 0 if the key is absent or stale.
  pub(crate) fn counter_value<Q>(&self, key: &Q, now: i64) -> i64
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.map.read().get(key) {
      Some(entry) if !entry.is_expired_at_nanos(now) => entry.value().load(),
      _ => 0,
    }
  }
}

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<K, V, H> {
  pub(crate) shards: Box<[CachePadded<Shard<K, V, H>>]>,
  pub(crate) hasher: H,
  mask: usize,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// Creates a store with `num_shards` shards, which must be a power of two.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    debug_assert!(num_shards.is_power_of_two());
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(Shard::new(hasher.clone())))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    Self {
      shards,
      hasher,
      mask: num_shards - 1,
    }
  }

  #[inline]
  pub(crate) fn get_shard_index<Q>(&self, key: &Q) -> usize
  where
    K: Borrow<Q>,
    Q: Hash + ?Sized,
  {
    hash_key(&self.hasher, key) as usize & self.mask
  }

  /// Returns the shard owning `key`.
  #[inline]
  pub(crate) fn get_shard<Q>(&self, key: &Q) -> &Shard<K, V, H>
  where
    K: Borrow<Q>,
    Q: Hash + ?Sized,
  {
    &self.shards[self.get_shard_index(key)]
  }

  /// Returns an iterator over all shards, for fan-out operations.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<K, V, H>> {
    self.shards.iter().map(|padded| &**padded)
  }

  pub(crate) fn item_count(&self) -> usize {
    self.iter_shards().map(Shard::item_count).sum()
  }
}
