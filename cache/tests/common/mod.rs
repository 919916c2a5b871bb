#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};

use fibre_lru::{Cache, Configuration};

// A custom hasher that allows us to control which shard a key is assigned to.
// It simply uses the integer value of the key as its hash.
// For a 4-bucket cache:
// - key 0 -> shard 0 (0 & 3 = 0)
// - key 1 -> shard 1 (1 & 3 = 1)
// - key 5 -> shard 1 (5 & 3 = 1)
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, _: &[u8]) {
    unimplemented!()
  }
  fn write_i32(&mut self, i: i32) {
    self.0 = i as u64;
  }
}

pub fn build_sharded_cache(buckets: usize) -> Cache<i32, String, ShardControllingHasher> {
  Cache::new(Configuration {
    buckets,
    ..Default::default()
  })
  .unwrap()
}

// A cache small enough that a handful of inserts trigger GC.
pub fn build_small_cache(max_size: u64) -> Cache<String, i32> {
  Cache::new(Configuration {
    max_size,
    items_to_prune: 10,
    ..Default::default()
  })
  .unwrap()
}

pub fn key(i: usize) -> String {
  format!("key{}", i)
}
