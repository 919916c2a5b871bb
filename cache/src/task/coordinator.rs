use crate::entry::Entry;
use crate::listener::{EvictionListener, EvictionReason};
use crate::metrics::Metrics;
use crate::recency::RecencyList;
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};

/// A deletion notice: the entry that left its shard and why.
pub(crate) type Deletion<K, V> = (Arc<Entry<K, V>>, EvictionReason);

/// Synchronous administrative commands. Each carries the channel its reply
/// is sent on.
pub(crate) enum Control {
  /// Reply with the GC eviction count since the last request, then reset it.
  GetDropped(Sender<usize>),
  SetMaxSize(u64, Sender<()>),
  Clear(Sender<()>),
  /// Process everything already queued, then reply.
  Sync(Sender<()>),
  /// Run one sweep and reply with how many entries it dropped.
  Gc(Sender<usize>),
  GetSize(Sender<u64>),
}

/// The receiving ends of the coordinator's three queues.
pub(crate) struct Mailboxes<K, V> {
  pub(crate) promotables: Receiver<Arc<Entry<K, V>>>,
  pub(crate) deletables: Receiver<Deletion<K, V>>,
  pub(crate) control: Receiver<Control>,
}

/// Everything the coordinator needs besides its queues.
pub(crate) struct CoordinatorContext<K, V, H> {
  pub(crate) store: Arc<ShardedStore<K, V, H>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) listener: Option<Arc<dyn EvictionListener<K, V>>>,
  pub(crate) max_size: u64,
  pub(crate) items_to_prune: usize,
  pub(crate) gets_per_promote: i32,
  pub(crate) tracking: bool,
}

/// The single owner of the recency list and of the cache's total weight.
///
/// All order-affecting work funnels through its queues and is applied one
/// message at a time on a dedicated thread, so neither the list nor the
/// running weight needs a lock.
pub(crate) struct Coordinator<K, V, H> {
  context: CoordinatorContext<K, V, H>,
  list: RecencyList<K, V>,
  size: u64,
  dropped: usize,
}

impl<K, V, H> Coordinator<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Spawns the coordinator thread.
  pub(crate) fn spawn(
    context: CoordinatorContext<K, V, H>,
    mailboxes: Mailboxes<K, V>,
  ) -> io::Result<JoinHandle<()>> {
    let coordinator = Self {
      context,
      list: RecencyList::new(),
      size: 0,
      dropped: 0,
    };

    thread::Builder::new()
      .name("fibre-lru-coordinator".into())
      .spawn(move || coordinator.run(mailboxes))
  }

  fn run(mut self, mailboxes: Mailboxes<K, V>) {
    tracing::debug!(
      max_size = self.context.max_size,
      shards = self.context.store.shards.len(),
      "cache coordinator started"
    );

    loop {
      select! {
        recv(mailboxes.promotables) -> msg => match msg {
          Ok(entry) => self.on_promote(entry),
          // The cache closed the promote queue: time to stop.
          Err(_) => break,
        },
        recv(mailboxes.deletables) -> msg => match msg {
          Ok((entry, reason)) => self.on_delete(&entry, reason),
          Err(_) => break,
        },
        recv(mailboxes.control) -> msg => match msg {
          Ok(command) => self.on_control(command, &mailboxes),
          Err(_) => break,
        },
      }
    }

    // Deletions must never be lost, so drain them before exiting.
    while let Ok((entry, reason)) = mailboxes.deletables.try_recv() {
      self.on_delete(&entry, reason);
    }

    tracing::debug!(
      size = self.size,
      listed = self.list.len(),
      "cache coordinator stopped"
    );
  }

  fn on_promote(&mut self, entry: Arc<Entry<K, V>>) {
    if self.promote(entry) && self.size > self.context.max_size {
      self.dropped += self.gc();
    }
  }

  /// Applies one promotion. Returns `true` if the entry was newly linked,
  /// which is the only case that can grow the total weight.
  fn promote(&mut self, entry: Arc<Entry<K, V>>) -> bool {
    if entry.is_removed() {
      return false;
    }

    if self.list.contains(&entry) {
      if entry.should_promote(self.context.gets_per_promote) {
        self.list.move_to_front(&entry);
      }
      return false;
    }

    self.size = self.size.saturating_add(entry.weight());
    self.list.push_front(entry);
    self.publish_size();
    true
  }

  fn on_delete(&mut self, entry: &Arc<Entry<K, V>>, reason: EvictionReason) {
    if self.list.remove(entry) {
      self.size = self.size.saturating_sub(entry.weight());
      self.publish_size();
      if let Some(listener) = &self.context.listener {
        listener.on_evict(entry, reason);
      }
    }
    // Whether or not it was listed, a late promotion must not link it.
    entry.mark_removed();
  }

  fn on_control(&mut self, command: Control, mailboxes: &Mailboxes<K, V>) {
    // A requester that gave up waiting is not an error for the coordinator.
    match command {
      Control::GetDropped(reply) => {
        let _ = reply.send(self.dropped);
        self.dropped = 0;
      }
      Control::SetMaxSize(max_size, reply) => {
        self.context.max_size = max_size;
        if self.size > max_size {
          self.dropped += self.gc();
        }
        let _ = reply.send(());
      }
      Control::Clear(reply) => {
        // Link what is already queued first, so nothing cleared reappears.
        self.drain_pending(mailboxes);
        self.clear();
        let _ = reply.send(());
      }
      Control::Sync(reply) => {
        self.drain_pending(mailboxes);
        let _ = reply.send(());
      }
      Control::Gc(reply) => {
        let dropped = self.gc();
        self.dropped += dropped;
        let _ = reply.send(dropped);
      }
      Control::GetSize(reply) => {
        let _ = reply.send(self.size);
      }
    }
  }

  /// Applies every deletion and promotion queued before the request.
  /// Deletions go first so a replaced entry is never linked just to be
  /// unlinked again.
  fn drain_pending(&mut self, mailboxes: &Mailboxes<K, V>) {
    for _ in 0..mailboxes.deletables.len() {
      match mailboxes.deletables.try_recv() {
        Ok((entry, reason)) => self.on_delete(&entry, reason),
        Err(_) => break,
      }
    }
    for _ in 0..mailboxes.promotables.len() {
      match mailboxes.promotables.try_recv() {
        Ok(entry) => self.on_promote(entry),
        Err(_) => break,
      }
    }
  }

  fn clear(&mut self) {
    // Entries never linked must be marked too, or a late promotion would
    // link weight that no shard holds.
    for shard in self.context.store.iter_shards() {
      for entry in shard.clear() {
        entry.mark_removed();
      }
    }
    self.size = 0;
    self.publish_size();
    self.list.drain(|entry| entry.mark_removed());
  }

  /// Evicts from the least recently used end until the cache is back within
  /// budget or `items_to_prune` entries have been examined. Tracked entries
  /// are skipped. Returns how many entries were evicted.
  fn gc(&mut self) -> usize {
    let mut dropped = 0;
    let mut examined = 0;
    let mut candidate = self.list.back().cloned();

    while let Some(entry) = candidate {
      if examined == self.context.items_to_prune || self.size <= self.context.max_size {
        break;
      }
      examined += 1;
      candidate = self.list.prev(&entry).cloned();

      if self.context.tracking && entry.ref_count() > 0 {
        continue;
      }

      self.context.store.get_shard(entry.key()).remove_entry(&entry);
      self.size = self.size.saturating_sub(entry.weight());
      self.list.remove(&entry);
      if let Some(listener) = &self.context.listener {
        listener.on_evict(&entry, EvictionReason::Capacity);
      }
      entry.mark_removed();
      dropped += 1;
    }

    self.publish_size();
    if dropped > 0 {
      Metrics::record(&self.context.metrics.evicted_by_capacity, dropped as u64);
    }
    if self.size > self.context.max_size {
      tracing::warn!(
        size = self.size,
        max_size = self.context.max_size,
        examined,
        dropped,
        "gc sweep finished over budget"
      );
    } else {
      tracing::trace!(size = self.size, examined, dropped, "gc sweep");
    }
    dropped
  }

  #[inline]
  fn publish_size(&self) {
    self
      .context
      .metrics
      .current_weight
      .store(self.size, Ordering::Relaxed);
  }
}
