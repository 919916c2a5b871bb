use crate::entry::Entry;

use std::fmt;
use std::sync::Arc;

/// A pinned reference to a cache entry, returned by
/// [`Cache::tracking_get`](crate::Cache::tracking_get) and
/// [`Cache::tracking_set`](crate::Cache::tracking_set).
///
/// While a handle is alive the entry's reference count stays above zero and,
/// with tracking enabled, GC will not evict it. The pin is released by
/// [`release`](Tracked::release) or when the handle is dropped. A lookup that
/// found nothing yields a nil handle whose release does nothing.
pub struct Tracked<K, V> {
  entry: Option<Arc<Entry<K, V>>>,
}

impl<K, V> Tracked<K, V> {
  /// Takes a new reference on `entry`.
  pub(crate) fn acquire(entry: Arc<Entry<K, V>>) -> Self {
    entry.track();
    Self { entry: Some(entry) }
  }

  /// Wraps an entry whose reference was already counted at creation.
  pub(crate) fn adopt(entry: Arc<Entry<K, V>>) -> Self {
    Self { entry: Some(entry) }
  }

  /// A handle that refers to nothing.
  pub fn nil() -> Self {
    Self { entry: None }
  }

  pub fn is_nil(&self) -> bool {
    self.entry.is_none()
  }

  /// The pinned entry, if any.
  pub fn entry(&self) -> Option<&Arc<Entry<K, V>>> {
    self.entry.as_ref()
  }

  /// The pinned value, if any.
  pub fn value(&self) -> Option<&V> {
    self.entry.as_deref().map(Entry::value)
  }

  /// Drops the pin. Equivalent to dropping the handle.
  pub fn release(self) {}
}

impl<K, V> Drop for Tracked<K, V> {
  fn drop(&mut self) {
    if let Some(entry) = self.entry.take() {
      entry.release();
    }
  }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Tracked<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Tracked").field(&self.entry).finish()
  }
}
