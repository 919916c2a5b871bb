use crate::time;

use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use generational_arena::Index;

/// Promotion sentinel for an entry that has left the cache. Promotions that
/// arrive for such an entry are ignored by the coordinator.
pub(crate) const REMOVED: i32 = -2;

const UNLINKED: usize = usize::MAX;

/// The coordinator-owned handle of an entry inside the recency list.
///
/// Only the coordinator thread reads or writes it, so relaxed atomics are
/// enough; they exist so `Entry` can be shared without a lock.
struct ListLink {
  slot: AtomicUsize,
  generation: AtomicU64,
}

impl ListLink {
  fn new() -> Self {
    Self {
      slot: AtomicUsize::new(UNLINKED),
      generation: AtomicU64::new(0),
    }
  }

  #[inline]
  fn get(&self) -> Option<Index> {
    match self.slot.load(Ordering::Relaxed) {
      UNLINKED => None,
      slot => Some(Index::from_raw_parts(
        slot,
        self.generation.load(Ordering::Relaxed),
      )),
    }
  }

  #[inline]
  fn set(&self, index: Option<Index>) {
    match index {
      Some(index) => {
        let (slot, generation) = index.into_raw_parts();
        self.generation.store(generation, Ordering::Relaxed);
        self.slot.store(slot, Ordering::Relaxed);
      }
      None => self.slot.store(UNLINKED, Ordering::Relaxed),
    }
  }
}

/// A single cached record.
///
/// Entries are handed out as `Arc<Entry<K, V>>`. An entry returned by the
/// cache may already be expired; check [`Entry::is_expired`] before trusting
/// its value if staleness matters.
pub struct Entry<K, V> {
  key: K,
  value: V,
  weight: u64,
  /// Absolute deadline in nanoseconds relative to the cache epoch.
  expires_at: AtomicI64,
  /// Touched only by the coordinator.
  promotions: AtomicI32,
  ref_count: AtomicI32,
  link: ListLink,
}

impl<K, V> Entry<K, V> {
  pub(crate) fn new(key: K, value: V, weight: u64, expires_at: i64, track: bool) -> Self {
    Self {
      key,
      value,
      weight,
      expires_at: AtomicI64::new(expires_at),
      promotions: AtomicI32::new(0),
      ref_count: AtomicI32::new(if track { 1 } else { 0 }),
      link: ListLink::new(),
    }
  }

  /// The key this entry was stored under.
  #[inline]
  pub fn key(&self) -> &K {
    &self.key
  }

  /// The cached value.
  #[inline]
  pub fn value(&self) -> &V {
    &self.value
  }

  /// The weight this entry contributes towards the cache's `max_size`.
  #[inline]
  pub fn weight(&self) -> u64 {
    self.weight
  }

  /// Returns `true` if the entry's deadline has passed.
  #[inline]
  pub fn is_expired(&self) -> bool {
    self.is_expired_at_nanos(time::now_nanos())
  }

  /// Returns `true` if the entry's deadline is before `now`.
  #[inline]
  pub fn is_expired_at(&self, now: Instant) -> bool {
    self.is_expired_at_nanos(time::instant_to_nanos(now))
  }

  #[inline]
  pub(crate) fn is_expired_at_nanos(&self, now: i64) -> bool {
    self.expires_at.load(Ordering::Relaxed) < now
  }

  /// The time left before the entry expires, or `None` if it already has.
  /// Use [`expired_for`](Entry::expired_for) to see how stale it is.
  pub fn ttl(&self) -> Option<Duration> {
    let remaining = self
      .expires_at
      .load(Ordering::Relaxed)
      .saturating_sub(time::now_nanos());
    if remaining < 0 {
      None
    } else {
      Some(Duration::from_nanos(remaining as u64))
    }
  }

  /// How long ago the entry expired, or `None` while it is still live.
  pub fn expired_for(&self) -> Option<Duration> {
    let overdue = time::now_nanos().saturating_sub(self.expires_at.load(Ordering::Relaxed));
    if overdue > 0 {
      Some(Duration::from_nanos(overdue as u64))
    } else {
      None
    }
  }

  /// The instant at which the entry expires.
  pub fn expires_at(&self) -> Instant {
    time::nanos_to_instant(self.expires_at.load(Ordering::Relaxed))
  }

  /// Moves the deadline to `duration` from now.
  pub fn extend(&self, duration: Duration) {
    self.set_deadline(time::deadline_after(time::now_nanos(), duration));
  }

  /// The number of outstanding tracked references.
  #[inline]
  pub fn ref_count(&self) -> i32 {
    self.ref_count.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn deadline(&self) -> i64 {
    self.expires_at.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn set_deadline(&self, expires_at: i64) {
    self.expires_at.store(expires_at, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn track(&self) {
    self.ref_count.fetch_add(1, Ordering::AcqRel);
  }

  #[inline]
  pub(crate) fn release(&self) {
    self.ref_count.fetch_sub(1, Ordering::AcqRel);
  }

  // --- Coordinator-only state ---

  #[inline]
  pub(crate) fn list_index(&self) -> Option<Index> {
    self.link.get()
  }

  #[inline]
  pub(crate) fn set_list_index(&self, index: Option<Index>) {
    self.link.set(index);
  }

  #[inline]
  pub(crate) fn is_removed(&self) -> bool {
    self.promotions.load(Ordering::Relaxed) == REMOVED
  }

  #[inline]
  pub(crate) fn mark_removed(&self) {
    self.promotions.store(REMOVED, Ordering::Relaxed);
  }

  /// Counts one more promotion request and reports whether the threshold was
  /// reached. The counter restarts from zero once it has.
  #[inline]
  pub(crate) fn should_promote(&self, gets_per_promote: i32) -> bool {
    let promotions = self.promotions.load(Ordering::Relaxed) + 1;
    if promotions >= gets_per_promote {
      self.promotions.store(0, Ordering::Relaxed);
      true
    } else {
      self.promotions.store(promotions, Ordering::Relaxed);
      false
    }
  }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Entry")
      .field("key", &self.key)
      .field("value", &self.value)
      .field("weight", &self.weight)
      .field("expired", &self.is_expired())
      .field("ref_count", &self.ref_count())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn live_entry(ttl: Duration) -> Entry<i64, &'static str> {
    let expires_at = time::deadline_after(time::now_nanos(), ttl);
    Entry::new(1, "one", 1, expires_at, false)
  }

  #[test]
  fn expired_entry_reports_no_ttl() {
    let entry = Entry::new(1, "one", 1, time::now_nanos() - 1_000_000_000, false);
    assert!(entry.is_expired());
    assert_eq!(entry.ttl(), None);
    assert!(entry.expires_at() < Instant::now());
    assert!(entry.expired_for().unwrap() >= Duration::from_secs(1));
  }

  #[test]
  fn live_entry_is_not_overdue() {
    let entry = live_entry(Duration::from_secs(60));
    assert!(entry.expired_for().is_none());
  }

  #[test]
  fn extend_pushes_the_deadline_forward() {
    let entry = live_entry(Duration::from_millis(10));
    let before = entry.expires_at();
    entry.extend(Duration::from_secs(60));
    assert!(entry.expires_at() > before);
    assert!(entry.ttl().unwrap() > Duration::from_secs(59));
  }

  #[test]
  fn promotion_threshold_resets_after_firing() {
    let entry = live_entry(Duration::from_secs(60));
    assert!(!entry.should_promote(3));
    assert!(!entry.should_promote(3));
    assert!(entry.should_promote(3));
    assert!(!entry.should_promote(3));
  }

  #[test]
  fn removed_sentinel_is_sticky_until_promoted() {
    let entry = live_entry(Duration::from_secs(60));
    assert!(!entry.is_removed());
    entry.mark_removed();
    assert!(entry.is_removed());
  }

  #[test]
  fn tracking_counts_references() {
    let entry = Entry::new(7, 7u8, 1, 0, true);
    assert_eq!(entry.ref_count(), 1);
    entry.track();
    assert_eq!(entry.ref_count(), 2);
    entry.release();
    entry.release();
    assert_eq!(entry.ref_count(), 0);
  }

  #[test]
  fn list_link_round_trips_arena_indices() {
    let entry = live_entry(Duration::from_secs(1));
    assert!(entry.list_index().is_none());
    let index = Index::from_raw_parts(4, 9);
    entry.set_list_index(Some(index));
    assert_eq!(entry.list_index(), Some(index));
    entry.set_list_index(None);
    assert!(entry.list_index().is_none());
  }
}
