mod common;

use common::build_small_cache;
use fibre_lru::{Cache, Configuration};
use std::cell::Cell;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

fn new_test_cache() -> Cache<String, i32> {
  Cache::new(Configuration::default()).unwrap()
}

#[test]
fn test_sync_set_and_get() {
  let cache = new_test_cache();
  let stored = cache.set("key1".to_string(), 10, HOUR);
  assert_eq!(stored.key(), "key1");

  let found = cache.get("key1").unwrap();
  assert_eq!(*found.value(), 10);
  assert!(!found.is_expired());
  assert!(cache.get("non-existent").is_none());

  let metrics = cache.metrics();
  assert_eq!(metrics.inserts, 1);
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 1);
}

#[test]
fn test_sync_set_replaces_existing_value() {
  let cache = new_test_cache();
  cache.set("key1".to_string(), 10, HOUR);
  cache.sync();
  cache.set("key1".to_string(), 20, HOUR);
  cache.sync();

  assert_eq!(*cache.get("key1").unwrap().value(), 20);
  assert_eq!(cache.item_count(), 1);
  assert_eq!(cache.size(), 1, "the replaced entry no longer counts");
}

#[test]
fn test_sync_peek_does_not_count_as_a_lookup() {
  let cache = new_test_cache();
  cache.set("key1".to_string(), 10, HOUR);

  assert_eq!(*cache.peek("key1").unwrap().value(), 10);
  assert!(cache.peek("missing").is_none());

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 0);
  assert_eq!(metrics.misses, 0);
}

#[test]
fn test_sync_get_at_judges_expiry_at_the_given_instant() {
  let cache = new_test_cache();
  cache.set("key1".to_string(), 10, Duration::from_secs(60));

  let now = Instant::now();
  let entry = cache.get_at("key1", now).unwrap();
  assert!(!entry.is_expired_at(now));

  let later = now + Duration::from_secs(120);
  let entry = cache.get_at("key1", later).unwrap();
  assert!(entry.is_expired_at(later));

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 1, "an expired entry is a miss");
}

#[test]
fn test_sync_replace_keeps_the_deadline() {
  let cache = new_test_cache();
  assert!(!cache.replace("key1".to_string(), 1));
  assert!(cache.peek("key1").is_none(), "replace never inserts");

  let original = cache.set("key1".to_string(), 10, Duration::from_secs(90));
  cache.sync();
  assert!(cache.replace("key1".to_string(), 11));

  let replaced = cache.peek("key1").unwrap();
  assert_eq!(*replaced.value(), 11);
  assert_eq!(replaced.expires_at(), original.expires_at());
}

#[test]
fn test_sync_fetch_loads_only_on_miss() {
  let cache = new_test_cache();
  let calls = Cell::new(0);
  let loader = || {
    calls.set(calls.get() + 1);
    Ok::<_, String>(42)
  };

  let first = cache.fetch("key1".to_string(), HOUR, loader).unwrap();
  assert_eq!(*first.value(), 42);
  assert_eq!(calls.get(), 1);

  let second = cache.fetch("key1".to_string(), HOUR, loader).unwrap();
  assert_eq!(*second.value(), 42);
  assert_eq!(calls.get(), 1, "a live entry is returned without loading");
}

#[test]
fn test_sync_fetch_reloads_stale_entries() {
  let cache = new_test_cache();
  cache.set_until("key1".to_string(), 1, Instant::now() - Duration::from_secs(1));

  let entry = cache
    .fetch("key1".to_string(), HOUR, || Ok::<_, String>(2))
    .unwrap();
  assert_eq!(*entry.value(), 2);
  assert!(!entry.is_expired());
}

#[test]
fn test_sync_fetch_with_failing_loader_caches_nothing() {
  let cache = new_test_cache();
  let result = cache.fetch("key1".to_string(), HOUR, || Err("backend down"));

  assert_eq!(result.unwrap_err(), "backend down");
  assert!(cache.peek("key1").is_none());
  assert_eq!(cache.item_count(), 0);
}

#[test]
fn test_sync_delete_and_clear() {
  let cache = new_test_cache();
  cache.set("key1".to_string(), 10, HOUR);
  cache.set("key2".to_string(), 20, HOUR);
  cache.sync();
  assert_eq!(cache.size(), 2);

  assert!(cache.delete("key1"));
  assert!(!cache.delete("key1"), "double delete should fail");
  assert!(cache.get("key1").is_none());
  assert_eq!(cache.metrics().invalidations, 1);

  cache.sync();
  assert_eq!(cache.size(), 1, "weight of key2 should remain");

  cache.clear();
  assert!(cache.get("key2").is_none());
  assert_eq!(cache.item_count(), 0);
  assert_eq!(cache.size(), 0);
  assert_eq!(cache.metrics().current_weight, 0);
}

#[test]
fn test_sync_cache_is_usable_after_clear() {
  let cache = build_small_cache(2);
  cache.set("a".to_string(), 1, HOUR);
  cache.set("b".to_string(), 2, HOUR);
  cache.clear();

  cache.set("c".to_string(), 3, HOUR);
  cache.sync();
  assert_eq!(cache.size(), 1);
  assert_eq!(cache.get_dropped(), 0, "clear is not counted as GC");
}

#[test]
fn test_sync_manual_promote_links_the_entry() {
  let cache = new_test_cache();
  let entry = cache.set("key1".to_string(), 10, HOUR);
  cache.sync();
  assert_eq!(cache.size(), 1);

  // Promoting an already linked entry never adds its weight twice.
  cache.promote(&entry);
  cache.sync();
  assert_eq!(cache.size(), 1);
}

#[test]
fn test_sync_late_promote_after_delete_is_ignored() {
  let cache = new_test_cache();
  let old = cache.set("key1".to_string(), 10, HOUR);
  cache.sync();
  assert!(cache.delete("key1"));
  cache.sync();
  assert_eq!(cache.size(), 0);

  cache.promote(&old);
  cache.sync();
  assert_eq!(cache.size(), 0, "a deleted entry is never relinked");
}

#[test]
fn test_sync_promotes_after_clear_do_not_relink() {
  let cache: Cache<String, i32> = Cache::new(Configuration {
    promote_buffer: 1,
    ..Default::default()
  })
  .unwrap();

  // With a one-slot promote queue most of these are never linked.
  let held: Vec<_> = (0..500)
    .map(|i| cache.set(common::key(i), i as i32, HOUR))
    .collect();
  cache.sync();
  cache.clear();
  assert_eq!(cache.item_count(), 0);

  for entry in &held {
    cache.promote(entry);
    cache.sync();
  }
  assert_eq!(cache.size(), 0);
  assert_eq!(cache.metrics().current_weight, 0);
}
