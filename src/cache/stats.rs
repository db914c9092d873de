//! Cache statistics and per-handle diagnostics.
use std::path::PathBuf;

use serde::Serialize;

use super::types::AccessMode;

/// Point-in-time statistics of a [`HandleCache`](super::HandleCache).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups answered by a resident, unexpired handle.
    pub hits: u64,
    /// Lookups that created a new handle.
    pub misses: u64,
    /// Handles dropped for capacity or age while making room.
    pub evictions: u64,
    /// All lookups, hits and misses.
    pub total_accesses: u64,
    /// Handles currently resident.
    pub size: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// Configured time-to-live in seconds.
    pub ttl: f64,
    /// `hits / total_accesses`, 0.0 before the first lookup.
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn hit_rate(hits: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Diagnostic view of one resident handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleSnapshot {
    pub path: PathBuf,
    pub mode: AccessMode,
    pub access_count: u64,
    pub is_dirty: bool,
    pub is_loaded: bool,
    /// Seconds since the handle was last accessed.
    pub idle_seconds: f64,
}
