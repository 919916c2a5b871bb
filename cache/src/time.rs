use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for all deadlines in the cache.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Converts an `Instant` into signed nanoseconds relative to the cache's epoch.
///
/// Instants before the epoch map to negative values, so a deadline that is
/// already in the past stays representable.
#[inline]
pub(crate) fn instant_to_nanos(instant: Instant) -> i64 {
  let epoch = *CACHE_EPOCH;
  match instant.checked_duration_since(epoch) {
    Some(after) => saturating_nanos(after),
    None => -saturating_nanos(epoch.duration_since(instant)),
  }
}

/// Converts nanoseconds relative to the epoch back into an `Instant`.
#[inline]
pub(crate) fn nanos_to_instant(nanos: i64) -> Instant {
  let epoch = *CACHE_EPOCH;
  let offset = Duration::from_nanos(nanos.unsigned_abs());
  if nanos >= 0 {
    epoch + offset
  } else {
    epoch.checked_sub(offset).unwrap_or(epoch)
  }
}

/// The current time as nanoseconds since the epoch.
#[inline]
pub(crate) fn now_nanos() -> i64 {
  instant_to_nanos(Instant::now())
}

/// A deadline `ttl` after `now`, saturating instead of overflowing.
#[inline]
pub(crate) fn deadline_after(now: i64, ttl: Duration) -> i64 {
  now.saturating_add(saturating_nanos(ttl))
}

#[inline]
fn saturating_nanos(duration: Duration) -> i64 {
  i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
