use crate::error::BuildError;
use crate::listener::EvictionListener;

use core::fmt;
use std::sync::Arc;

/// Computes the weight of an entry from its key and value.
pub type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// Settings for a [`Cache`](crate::Cache).
///
/// Every field is public and `Default` carries the documented defaults, so a
/// configuration is usually written as a struct literal:
///
/// ```
/// use fibre_lru::Configuration;
///
/// let config: Configuration<u64, String> = Configuration {
///   max_size: 10_000,
///   tracking: true,
///   ..Default::default()
/// };
/// assert_eq!(config.buckets, 16);
/// ```
pub struct Configuration<K, V, H = ahash::RandomState> {
  /// The maximum total weight of the cache. Defaults to `5000`.
  pub max_size: u64,
  /// The number of independently locked shards. Must be a power of two.
  /// Defaults to `16`.
  pub buckets: usize,
  /// The most entries one GC sweep will examine. Defaults to `500`.
  pub items_to_prune: usize,
  /// Capacity of the deletion queue. Deletes block while it is full.
  /// Defaults to `1024`.
  pub delete_buffer: usize,
  /// Capacity of the promotion queue. Promotions are skipped while it is
  /// full. Defaults to `1024`.
  pub promote_buffer: usize,
  /// How many promotions an already listed entry needs before it is moved to
  /// the front of the recency list. Defaults to `3`.
  pub gets_per_promote: i32,
  /// When `true`, GC never evicts an entry with outstanding tracked
  /// references. Defaults to `false`.
  pub tracking: bool,
  /// Called on the coordinator thread whenever a listed entry is removed.
  pub listener: Option<Arc<dyn EvictionListener<K, V>>>,
  /// Computes entry weights. Without one, every entry weighs `1`.
  pub weigher: Option<Weigher<K, V>>,
  /// The hasher used to route keys to shards.
  pub hasher: H,
}

impl<K, V, H: Default> Default for Configuration<K, V, H> {
  fn default() -> Self {
    Self {
      max_size: 5000,
      buckets: 16,
      items_to_prune: 500,
      delete_buffer: 1024,
      promote_buffer: 1024,
      gets_per_promote: 3,
      tracking: false,
      listener: None,
      weigher: None,
      hasher: H::default(),
    }
  }
}

impl<K, V, H> fmt::Debug for Configuration<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Configuration")
      .field("max_size", &self.max_size)
      .field("buckets", &self.buckets)
      .field("items_to_prune", &self.items_to_prune)
      .field("delete_buffer", &self.delete_buffer)
      .field("promote_buffer", &self.promote_buffer)
      .field("gets_per_promote", &self.gets_per_promote)
      .field("tracking", &self.tracking)
      .field("has_listener", &self.listener.is_some())
      .field("has_weigher", &self.weigher.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Configuration<K, V, H> {
  /// Sets the eviction listener from a closure or listener type.
  pub fn with_listener<L>(mut self, listener: L) -> Self
  where
    L: EvictionListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Sets the weigher.
  pub fn with_weigher(mut self, weigher: impl Fn(&K, &V) -> u64 + Send + Sync + 'static) -> Self {
    self.weigher = Some(Arc::new(weigher));
    self
  }

  /// Validates the configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.max_size == 0 {
      return Err(BuildError::ZeroCapacity);
    }
    if !self.buckets.is_power_of_two() {
      return Err(BuildError::InvalidBuckets(self.buckets));
    }
    if self.items_to_prune == 0 {
      return Err(BuildError::ZeroItemsToPrune);
    }
    if self.gets_per_promote < 1 {
      return Err(BuildError::InvalidGetsPerPromote(self.gets_per_promote));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type Config = Configuration<u64, u64>;

  #[test]
  fn defaults_match_documentation() {
    let config = Config::default();
    assert_eq!(config.max_size, 5000);
    assert_eq!(config.buckets, 16);
    assert_eq!(config.items_to_prune, 500);
    assert_eq!(config.delete_buffer, 1024);
    assert_eq!(config.promote_buffer, 1024);
    assert_eq!(config.gets_per_promote, 3);
    assert!(!config.tracking);
    assert!(config.listener.is_none());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_bucket_counts_that_are_not_powers_of_two() {
    for buckets in [0, 3, 12, 100] {
      let config = Config {
        buckets,
        ..Default::default()
      };
      assert!(matches!(
        config.validate(),
        Err(BuildError::InvalidBuckets(n)) if n == buckets
      ));
    }
  }

  #[test]
  fn rejects_degenerate_settings() {
    let zero_size = Config {
      max_size: 0,
      ..Default::default()
    };
    assert!(matches!(zero_size.validate(), Err(BuildError::ZeroCapacity)));

    let zero_prune = Config {
      items_to_prune: 0,
      ..Default::default()
    };
    assert!(matches!(
      zero_prune.validate(),
      Err(BuildError::ZeroItemsToPrune)
    ));

    let no_promotions = Config {
      gets_per_promote: 0,
      ..Default::default()
    };
    assert!(matches!(
      no_promotions.validate(),
      Err(BuildError::InvalidGetsPerPromote(0))
    ));
  }
}
