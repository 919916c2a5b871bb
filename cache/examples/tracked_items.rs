use fibre_lru::{Cache, Configuration, Entry, EvictionReason};
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

fn main() {
  let config = Configuration {
    max_size: 2,
    tracking: true,
    ..Default::default()
  }
  .with_listener(
    |entry: &Arc<Entry<&'static str, String>>, reason: EvictionReason| {
      println!("  [listener] '{}' removed: {}", entry.key(), reason);
    },
  );
  let cache: Cache<&'static str, String> = Cache::new(config).expect("Failed to build cache");

  // A tracked entry stays pinned until its handle is released.
  let session = cache.tracking_set("session", "alice".to_string(), Duration::from_secs(60));
  cache.set("a", "first".to_string(), Duration::from_secs(60));
  cache.set("b", "second".to_string(), Duration::from_secs(60));
  cache.sync();
  println!(
    "pinned session still cached: {}",
    cache.peek("session").is_some()
  );

  println!("Releasing the session handle...");
  session.release();
  cache.set("c", "third".to_string(), Duration::from_secs(60));
  cache.sync();
  println!("session cached after release: {}", cache.peek("session").is_some());

  // Counters are adjusted in place.
  let counters: Cache<String, AtomicI64> = Cache::with_defaults().expect("Failed to build cache");
  let ttl = Duration::from_secs(60);
  counters.increment("requests".to_string(), 1, ttl);
  counters.increment("requests".to_string(), 1, ttl);
  let total = counters.increment_and_renew("requests".to_string(), 1, ttl);
  println!("\nrequests counted: {}", total);
}
