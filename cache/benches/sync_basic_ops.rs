use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_lru::{Cache, Configuration};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy)]
enum Op {
  GetHit,
  GetMiss,
  Set,
}

struct BenchState {
  cache: Arc<Cache<u64, u64>>, // Cache must be in an Arc to be shared across threads
  // Each thread gets its own set of keys to operate on
  keys_by_thread: Vec<Vec<u64>>,
}

fn setup(op: Op, max_size: u64, num_items: usize, concurrency: usize) -> BenchState {
  let cache = Arc::new(
    Cache::new(Configuration {
      max_size,
      ..Default::default()
    })
    .unwrap(),
  );

  // 1. Pre-populate the cache *in a single thread* for a consistent start.
  for i in 0..num_items as u64 {
    cache.set(i, i, TTL);
  }
  cache.sync();

  // 2. Prepare the keys for the actual workload.
  let n = num_items as u64;
  let mut workload_keys: Vec<u64> = match op {
    Op::GetHit => (0..n).collect(),
    Op::GetMiss | Op::Set => (n..2 * n).collect(),
  };

  // 3. Shuffle and distribute the keys among the threads.
  let mut rng = StdRng::from_seed([0; 32]);
  workload_keys.shuffle(&mut rng);

  let mut keys_by_thread = vec![Vec::new(); concurrency];
  for (i, key) in workload_keys.into_iter().enumerate() {
    keys_by_thread[i % concurrency].push(key);
  }

  BenchState {
    cache,
    keys_by_thread,
  }
}

fn run_workload(op: Op, state: &BenchState) -> Duration {
  let barrier = Arc::new(Barrier::new(state.keys_by_thread.len()));
  let start_time = Instant::now();

  thread::scope(|s| {
    for thread_keys in &state.keys_by_thread {
      let barrier = barrier.clone();
      let cache = &state.cache;

      s.spawn(move || {
        barrier.wait(); // Synchronize all threads to start at once
        match op {
          Op::GetHit | Op::GetMiss => {
            for key in thread_keys {
              black_box(cache.get(key));
            }
          }
          Op::Set => {
            for key in thread_keys {
              cache.set(*key, *key, TTL);
            }
          }
        }
      });
    }
  }); // Scope waits for all spawned threads to finish

  start_time.elapsed()
}

fn sync_benches(c: &mut Criterion) {
  let max_size = 100_000;
  let num_items = 10_000;
  let mut group = c.benchmark_group("SyncBasicOps");
  group.throughput(Throughput::Elements(num_items as u64));

  for op in [Op::GetHit, Op::GetMiss, Op::Set] {
    for concurrency in [1, 4, 8] {
      let id = BenchmarkId::new(format!("{:?}", op), format!("Threads={}", concurrency));
      group.bench_function(id, |b| {
        b.iter_custom(|iters| {
          let mut total = Duration::ZERO;
          for _ in 0..iters {
            let state = setup(op, max_size, num_items, concurrency);
            total += run_workload(op, &state);
          }
          total
        })
      });
    }
  }
  group.finish();
}

criterion_group!(benches, sync_benches);
criterion_main!(benches);
