use fibre_lru::{Cache, Configuration};
use std::time::Duration;

fn main() {
  // A cache holding at most 100 entries, each weighing 1.
  let cache: Cache<String, u32> = Cache::new(Configuration {
    max_size: 100,
    ..Default::default()
  })
  .expect("Failed to build cache");

  println!("Setting ('key1', 100) with a 2-second TTL.");
  cache.set("key1".to_string(), 100, Duration::from_secs(2));

  match cache.get("key1") {
    Some(entry) => println!("Found value for key1: {}", entry.value()),
    None => println!("Value for key1 not found."),
  }

  println!("\nFilling the cache past its max size...");
  for i in 0..150 {
    cache.set(format!("filler{}", i), i, Duration::from_secs(60));
  }
  // Wait for the coordinator to catch up before reading the totals.
  cache.sync();
  println!(
    "items: {}, size: {}, evicted: {}",
    cache.item_count(),
    cache.size(),
    cache.get_dropped()
  );

  let loaded = cache
    .fetch("computed".to_string(), Duration::from_secs(60), || {
      Ok::<_, String>(7 * 6)
    })
    .expect("loader cannot fail");
  println!("\nFetched computed value: {}", loaded.value());

  println!("\nCache metrics: {:#?}", cache.metrics());
  cache.stop();
}
