use crate::config::{Configuration, Weigher};
use crate::entry::Entry;
use crate::error::BuildError;
use crate::listener::EvictionReason;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::store::ShardedStore;
use crate::task::coordinator::{Control, Coordinator, CoordinatorContext, Deletion, Mailboxes};
use crate::time;
use crate::tracked::Tracked;

use core::fmt;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
#[cfg(feature = "bulk")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

/// Keys that support [`Cache::delete_prefix`].
pub trait KeyPrefix {
  type Prefix: ?Sized;

  fn has_prefix(&self, prefix: &Self::Prefix) -> bool;
}

macro_rules! impl_bitmask_prefix {
  ($($ty:ty),*) => {
    $(
      /// An integer key has a prefix when every bit set in the prefix is also
      /// set in the key.
      impl KeyPrefix for $ty {
        type Prefix = $ty;

        #[inline]
        fn has_prefix(&self, prefix: &$ty) -> bool {
          self & prefix == *prefix
        }
      }
    )*
  };
}

impl_bitmask_prefix!(i32, i64, u32, u64, usize);

impl KeyPrefix for String {
  type Prefix = str;

  #[inline]
  fn has_prefix(&self, prefix: &str) -> bool {
    self.starts_with(prefix)
  }
}

/// A thread-safe, sharded LRU cache.
///
/// Reads and writes touch a single shard and then tell the coordinator thread
/// about the change; the coordinator keeps the global recency order and evicts
/// from the least recently used end when the total weight exceeds `max_size`.
///
/// Share a cache between threads with `Arc<Cache<..>>`. Dropping the cache, or
/// calling [`stop`](Cache::stop), shuts the coordinator down.
pub struct Cache<K, V, H = ahash::RandomState> {
  pub(crate) store: Arc<ShardedStore<K, V, H>>,
  pub(crate) metrics: Arc<Metrics>,
  weigher: Option<Weigher<K, V>>,
  promotables: Option<Sender<Arc<Entry<K, V>>>>,
  deletables: Sender<Deletion<K, V>>,
  control: Sender<Control>,
  coordinator: Option<JoinHandle<()>>,
}

impl<K, V, H> fmt::Debug for Cache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache")
      .field("store", &self.store)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V> Cache<K, V, ahash::RandomState>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Creates a cache with the default configuration.
  pub fn with_defaults() -> Result<Self, BuildError> {
    Self::new(Configuration::default())
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Validates `config`, allocates the shards and starts the coordinator.
  pub fn new(config: Configuration<K, V, H>) -> Result<Self, BuildError> {
    config.validate()?;

    let store = Arc::new(ShardedStore::new(config.buckets, config.hasher.clone()));
    let metrics = Arc::new(Metrics::new());

    let (promote_tx, promote_rx) = bounded(config.promote_buffer);
    let (delete_tx, delete_rx) = bounded(config.delete_buffer);
    let (control_tx, control_rx) = bounded(0);

    let context = CoordinatorContext {
      store: Arc::clone(&store),
      metrics: Arc::clone(&metrics),
      listener: config.listener,
      max_size: config.max_size,
      items_to_prune: config.items_to_prune,
      gets_per_promote: config.gets_per_promote,
      tracking: config.tracking,
    };
    let mailboxes = Mailboxes {
      promotables: promote_rx,
      deletables: delete_rx,
      control: control_rx,
    };
    let coordinator = Coordinator::spawn(context, mailboxes).map_err(BuildError::Spawn)?;

    Ok(Self {
      store,
      metrics,
      weigher: config.weigher,
      promotables: Some(promote_tx),
      deletables: delete_tx,
      control: control_tx,
      coordinator: Some(coordinator),
    })
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  /// Looks up an entry, promoting it if it is still live.
  ///
  /// An expired entry is still returned so callers can apply their own
  /// staleness policy; check [`Entry::is_expired`].
  pub fn get<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.lookup(key, time::now_nanos())
  }

  /// Like [`get`](Self::get), judging expiry at `now` instead of the current time.
  pub fn get_at<Q>(&self, key: &Q, now: Instant) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.lookup(key, time::instant_to_nanos(now))
  }

  /// Looks up an entry without promoting it or touching the hit counters.
  pub fn peek<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.store.get_shard(key).get(key)
  }

  fn lookup<Q>(&self, key: &Q, now: i64) -> Option<Arc<Entry<K, V>>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let entry = self.store.get_shard(key).get(key);
    match &entry {
      Some(found) if !found.is_expired_at_nanos(now) => {
        Metrics::record(&self.metrics.hits, 1);
        self.promote(found);
      }
      _ => Metrics::record(&self.metrics.misses, 1),
    }
    entry
  }

  /// Stores `value` under `key` for `ttl`, replacing any existing entry.
  pub fn set(&self, key: K, value: V, ttl: Duration) -> Arc<Entry<K, V>> {
    let expires_at = time::deadline_after(time::now_nanos(), ttl);
    self.store_entry(key, value, expires_at, false)
  }

  /// Stores `value` under `key` until `deadline`. A deadline in the past
  /// stores an entry that is already expired.
  pub fn set_until(&self, key: K, value: V, deadline: Instant) -> Arc<Entry<K, V>> {
    self.store_entry(key, value, time::instant_to_nanos(deadline), false)
  }

  /// Replaces the value of an existing entry, keeping its deadline.
  /// Returns `false`, and stores nothing, if the key is absent.
  pub fn replace(&self, key: K, value: V) -> bool {
    let expires_at = match self.store.get_shard(&key).get(&key) {
      Some(existing) => existing.deadline(),
      None => return false,
    };
    self.store_entry(key, value, expires_at, false);
    true
  }

  /// Returns the live entry for `key`, or loads, stores and returns a new one.
  ///
  /// If the loader fails nothing is cached and its error is returned as is.
  pub fn fetch<F, E>(&self, key: K, ttl: Duration, loader: F) -> Result<Arc<Entry<K, V>>, E>
  where
    F: FnOnce() -> Result<V, E>,
  {
    if let Some(entry) = self.get(&key) {
      if !entry.is_expired() {
        return Ok(entry);
      }
    }
    let value = loader()?;
    Ok(self.set(key, value, ttl))
  }

  /// Removes `key`. Returns `true` if it was present.
  pub fn delete<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.store.get_shard(key).delete(key) {
      Some(entry) => {
        Metrics::record(&self.metrics.invalidations, 1);
        self.notify_delete(entry, EvictionReason::Invalidated);
        true
      }
      None => false,
    }
  }

  /// Removes every entry whose key has `prefix`. Returns how many were removed.
  pub fn delete_prefix(&self, prefix: &K::Prefix) -> usize
  where
    K: KeyPrefix,
    K::Prefix: Sync,
  {
    self.delete_matching(|key, _| key.has_prefix(prefix))
  }

  /// Removes every entry the predicate selects. Returns how many were removed.
  ///
  /// Each shard is handled on its own; the operation as a whole is not atomic.
  pub fn delete_matching<F>(&self, matches: F) -> usize
  where
    F: Fn(&K, &Entry<K, V>) -> bool + Sync,
  {
    let delete_in_shard = |shard: &crate::store::Shard<K, V, H>| {
      let removed = shard.delete_matching(&matches);
      let count = removed.len();
      for entry in removed {
        self.notify_delete(entry, EvictionReason::Invalidated);
      }
      count
    };

    #[cfg(feature = "bulk")]
    let count: usize = self.store.shards[..]
      .par_iter()
      .map(|padded| delete_in_shard(padded))
      .sum();
    #[cfg(not(feature = "bulk"))]
    let count: usize = self.store.iter_shards().map(delete_in_shard).sum();

    Metrics::record(&self.metrics.invalidations, count as u64);
    count
  }

  /// Looks up an entry and pins it. See [`Tracked`].
  pub fn tracking_get<Q>(&self, key: &Q) -> Tracked<K, V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.get(key) {
      Some(entry) => Tracked::acquire(entry),
      None => Tracked::nil(),
    }
  }

  /// Stores a value and returns it pinned. See [`Tracked`].
  pub fn tracking_set(&self, key: K, value: V, ttl: Duration) -> Tracked<K, V> {
    let expires_at = time::deadline_after(time::now_nanos(), ttl);
    Tracked::adopt(self.store_entry(key, value, expires_at, true))
  }

  /// Asks the coordinator to count one use of `entry`. Best-effort: skipped
  /// when the promote queue is full.
  pub fn promote(&self, entry: &Arc<Entry<K, V>>) {
    let Some(promotables) = &self.promotables else {
      return;
    };
    if let Err(TrySendError::Full(_)) = promotables.try_send(entry.clone()) {
      Metrics::record(&self.metrics.promotions_dropped, 1);
    }
  }

  /// The number of entries across all shards, including ones the coordinator
  /// has not linked yet.
  pub fn item_count(&self) -> usize {
    self.store.item_count()
  }

  /// Removes every entry. Returns once all shards are empty.
  pub fn clear(&self) {
    self.request(Control::Clear);
  }

  /// Returns how many entries GC evicted since the previous call.
  pub fn get_dropped(&self) -> usize {
    self.request(Control::GetDropped).unwrap_or_default()
  }

  /// Changes the maximum total weight, evicting right away if the cache is
  /// now over it.
  pub fn set_max_size(&self, max_size: u64) {
    self.request(|reply| Control::SetMaxSize(max_size, reply));
  }

  /// Waits until every promotion and deletion queued so far has been applied.
  pub fn sync(&self) {
    self.request(Control::Sync);
  }

  /// Runs one GC sweep now. Returns how many entries it evicted.
  pub fn gc(&self) -> usize {
    self.request(Control::Gc).unwrap_or_default()
  }

  /// The total weight of every linked entry, as tracked by the coordinator.
  pub fn size(&self) -> u64 {
    self.request(Control::GetSize).unwrap_or_default()
  }

  /// Stops the coordinator after it has applied every pending deletion.
  pub fn stop(mut self) {
    self.shutdown();
  }

  fn store_entry(&self, key: K, value: V, expires_at: i64, track: bool) -> Arc<Entry<K, V>> {
    let weight = self.weigher.as_ref().map_or(1, |weigh| weigh(&key, &value));
    let (entry, existing) = self
      .store
      .get_shard(&key)
      .set(key, value, weight, expires_at, track);

    Metrics::record(&self.metrics.inserts, 1);
    if let Some(existing) = existing {
      self.notify_delete(existing, EvictionReason::Replaced);
    }
    self.promote(&entry);
    entry
  }

  /// Tells the coordinator an entry left its shard. Blocks while the delete
  /// queue is full.
  pub(crate) fn notify_delete(&self, entry: Arc<Entry<K, V>>, reason: EvictionReason) {
    if self.deletables.send((entry, reason)).is_err() {
      tracing::error!("cache coordinator is gone; deletion notice lost");
    }
  }

  /// Sends a command and waits for the coordinator's reply.
  fn request<R>(&self, command: impl FnOnce(Sender<R>) -> Control) -> Option<R> {
    let (reply_tx, reply_rx) = bounded(1);
    if self.control.send(command(reply_tx)).is_err() {
      tracing::error!("cache coordinator is gone; control request dropped");
      return None;
    }
    match reply_rx.recv() {
      Ok(reply) => Some(reply),
      Err(_) => {
        tracing::error!("cache coordinator exited before replying");
        None
      }
    }
  }
}

impl<K, V, H> Cache<K, V, H> {
  fn shutdown(&mut self) {
    // Closing the promote queue is the coordinator's signal to stop.
    if self.promotables.take().is_none() {
      return;
    }
    if let Some(handle) = self.coordinator.take() {
      if handle.join().is_err() {
        tracing::error!("cache coordinator panicked");
      }
    }
  }
}

impl<K, V, H> Drop for Cache<K, V, H> {
  fn drop(&mut self) {
    self.shutdown();
  }
}
