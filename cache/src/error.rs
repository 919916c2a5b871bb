use thiserror::Error;

/// Errors that can occur when constructing a cache.
#[derive(Debug, Error)]
pub enum BuildError {
  /// `max_size` was zero, so nothing could ever be cached.
  #[error("cache max size cannot be zero")]
  ZeroCapacity,
  /// The bucket count must be a non-zero power of two so keys can be routed
  /// with a bit mask.
  #[error("bucket count must be a non-zero power of two, got {0}")]
  InvalidBuckets(usize),
  /// A GC sweep must be allowed to examine at least one entry.
  #[error("items to prune cannot be zero")]
  ZeroItemsToPrune,
  /// Entries need at least one read before they can be promoted.
  #[error("gets per promote must be at least 1, got {0}")]
  InvalidGetsPerPromote(i32),
  /// The coordinator thread could not be started.
  #[error("failed to spawn the cache coordinator thread")]
  Spawn(#[source] std::io::Error),
}
