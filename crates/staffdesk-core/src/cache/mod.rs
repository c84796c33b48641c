//! In-memory request cache for backend resources.
//!
//! This module provides the `FetchCache`, which deduplicates requests for the
//! same key, remembers the last outcome per key and pushes changes to
//! subscribers. Results settled less than two seconds ago are served without
//! a new request.
//!
//! Keys are request paths with their query string; see [`keys`].

pub mod keys;
pub mod manager;

pub use manager::{CacheEvent, FetchCache, RevalidationPolicy, Subscription, DEFAULT_DEDUP_INTERVAL};
