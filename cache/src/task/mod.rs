//! Background work for the cache. A single coordinator thread owns the
//! recency list and applies promotions, deletions and control commands.

pub(crate) mod coordinator;
