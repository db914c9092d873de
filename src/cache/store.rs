//! Bounded, keyed store of document handles.
//!
//! # Eviction
//!
//! A lookup of a resident handle that has been idle longer than the TTL
//! discards it and proceeds as a miss. Before a new handle is inserted,
//! every expired handle is purged and then least-recently-used handles
//! (ties broken by insertion order) are evicted until there is room.
//! Purges and capacity evictions both count toward
//! [`CacheStats::evictions`].
//!
//! Evicted handles are not saved unless
//! [`CacheConfig::save_on_evict`] is set. Callers that rely on the default
//! must end their scopes (which save) before the handle can age out.
//!
//! The cache lock is never held across document I/O: eviction saves run
//! after the lock has been released.
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::CacheConfig;
use super::document::Document;
use super::handle::DocumentHandle;
use super::stats::{CacheStats, HandleSnapshot};
use super::types::{HandleKey, normalize_path};
use crate::common::Result;
use crate::sheet::Workbook;

/// A resident handle and its insertion sequence number.
struct Entry<D: Document> {
    handle: Arc<DocumentHandle<D>>,
    seq: u64,
}

/// Everything the cache mutex protects.
struct CacheState<D: Document> {
    entries: HashMap<HandleKey, Entry<D>>,
    config: CacheConfig,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    total_accesses: u64,
}

impl<D: Document> CacheState<D> {
    /// Remove every entry idle for longer than the TTL.
    fn purge_expired(&mut self, now: Instant, evicted: &mut Vec<Arc<DocumentHandle<D>>>) {
        let ttl = self.config.ttl;
        let expired: Vec<HandleKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.handle.is_expired_at(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            if let Some(entry) = self.entries.remove(&key) {
                tracing::debug!(key = %key, "expired handle purged");
                self.evictions += 1;
                evicted.push(entry.handle);
            }
        }
    }

    /// Evict least-recently-used entries until one more fits.
    fn make_room(&mut self, evicted: &mut Vec<Arc<DocumentHandle<D>>>) {
        while self.entries.len() >= self.config.capacity {
            let Some(lru) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.handle.last_accessed(), entry.seq))
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            if let Some(entry) = self.entries.remove(&lru) {
                tracing::debug!(key = %lru, "least recently used handle evicted");
                self.evictions += 1;
                evicted.push(entry.handle);
            }
        }
    }
}

/// Thread-safe LRU/TTL cache of [`DocumentHandle`]s.
///
/// # Examples
///
/// ```rust
/// use sheetcache::cache::{AccessMode, CacheConfig, HandleCache, HandleKey};
/// use std::time::Duration;
///
/// let cache: HandleCache = HandleCache::new(CacheConfig::new(2, Duration::from_secs(60)))?;
/// let key = HandleKey::new("report.xlsx", AccessMode::read_only())?;
///
/// let first = cache.get(&key);
/// let second = cache.get(&key);
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(cache.stats().hits, 1);
/// # Ok::<(), sheetcache::Error>(())
/// ```
pub struct HandleCache<D: Document = Workbook> {
    state: Mutex<CacheState<D>>,
}

impl<D: Document> HandleCache<D> {
    /// Create an empty cache. Fails if `config` does not validate.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create an empty cache with [`CacheConfig::default`].
    pub fn with_defaults() -> Self {
        Self::build(CacheConfig::default())
    }

    fn build(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                config,
                next_seq: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                total_accesses: 0,
            }),
        }
    }

    /// Get the handle for `key`, creating an unloaded one on a miss.
    ///
    /// Concurrent lookups of the same key return the same handle.
    pub fn get(&self, key: &HandleKey) -> Arc<DocumentHandle<D>> {
        let mut evicted = Vec::new();

        let (handle, save_on_evict) = {
            let mut state = self.state.lock();
            state.total_accesses += 1;
            let now = Instant::now();

            let resident = state.entries.get(key).map(|entry| Arc::clone(&entry.handle));
            if let Some(handle) = resident {
                if !handle.is_expired_at(now, state.config.ttl) {
                    state.hits += 1;
                    handle.touch();
                    tracing::debug!(key = %key, "cache hit");
                    return handle;
                }
                state.entries.remove(key);
                tracing::debug!(key = %key, "resident handle expired");
                discard(&handle, "expired");
            }

            state.misses += 1;
            tracing::debug!(key = %key, "cache miss");

            state.purge_expired(now, &mut evicted);
            state.make_room(&mut evicted);

            let handle = Arc::new(DocumentHandle::new(key.clone()));
            let seq = state.next_seq;
            state.next_seq += 1;
            state.entries.insert(
                key.clone(),
                Entry {
                    handle: Arc::clone(&handle),
                    seq,
                },
            );
            (handle, state.config.save_on_evict)
        };

        for old in evicted {
            if save_on_evict {
                save_evicted(&old);
            } else {
                discard(&old, "evicted");
            }
        }

        handle
    }

    /// Whether `key` is resident. Does not count as an access.
    pub fn contains(&self, key: &HandleKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Remove the handle for `key` without saving it.
    pub fn invalidate(&self, key: &HandleKey) -> bool {
        let removed = self.state.lock().entries.remove(key);
        match removed {
            Some(entry) => {
                tracing::debug!(key = %key, "handle invalidated");
                discard(&entry.handle, "invalidated");
                true
            },
            None => false,
        }
    }

    /// Remove the handles for `path` under every access mode, without
    /// saving them. Returns how many were removed.
    pub fn invalidate_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = normalize_path(path.as_ref())?;
        let removed: Vec<Arc<DocumentHandle<D>>> = {
            let mut state = self.state.lock();
            let keys: Vec<HandleKey> = state
                .entries
                .keys()
                .filter(|key| key.path() == path)
                .cloned()
                .collect();
            keys.iter()
                .filter_map(|key| state.entries.remove(key))
                .map(|entry| entry.handle)
                .collect()
        };

        for handle in &removed {
            discard(handle, "invalidated");
        }
        tracing::debug!(path = %path.display(), count = removed.len(), "path invalidated");
        Ok(removed.len())
    }

    /// Remove every handle without saving. Counters are kept.
    pub fn clear(&self) {
        let drained: Vec<Entry<D>> = self.state.lock().entries.drain().map(|(_, e)| e).collect();
        for entry in &drained {
            discard(&entry.handle, "cleared");
        }
        tracing::debug!(count = drained.len(), "cache cleared");
    }

    /// Number of resident handles.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            total_accesses: state.total_accesses,
            size: state.entries.len(),
            max_size: state.config.capacity,
            ttl: state.config.ttl.as_secs_f64(),
            hit_rate: CacheStats::hit_rate(state.hits, state.total_accesses),
        }
    }

    /// Diagnostics for every resident handle, ordered by path then mode.
    pub fn entries(&self) -> Vec<HandleSnapshot> {
        let handles: Vec<Arc<DocumentHandle<D>>> = self
            .state
            .lock()
            .entries
            .values()
            .map(|entry| Arc::clone(&entry.handle))
            .collect();

        let mut snapshots: Vec<HandleSnapshot> = handles.iter().map(|h| h.snapshot()).collect();
        snapshots.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then((a.mode.read_only, a.mode.values_only).cmp(&(b.mode.read_only, b.mode.values_only)))
        });
        snapshots
    }

    pub fn config(&self) -> CacheConfig {
        self.state.lock().config.clone()
    }

    /// Change capacity and TTL, keeping the save-on-evict policy.
    pub fn configure(&self, capacity: usize, ttl: Duration) -> Result<()> {
        let save_on_evict = self.state.lock().config.save_on_evict;
        self.reconfigure(CacheConfig::new(capacity, ttl).with_save_on_evict(save_on_evict))
    }

    /// Replace the whole policy.
    ///
    /// Resident handles are not evicted retroactively: a smaller capacity or
    /// a shorter TTL takes effect on the next lookup.
    pub fn reconfigure(&self, config: CacheConfig) -> Result<()> {
        config.validate()?;
        tracing::debug!(
            capacity = config.capacity,
            ttl_seconds = config.ttl.as_secs_f64(),
            save_on_evict = config.save_on_evict,
            "cache reconfigured"
        );
        self.state.lock().config = config;
        Ok(())
    }
}

impl<D: Document> Default for HandleCache<D> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Drop a handle from the cache without saving it.
fn discard<D: Document>(handle: &DocumentHandle<D>, reason: &str) {
    if handle.is_dirty() && !handle.is_read_only() {
        tracing::warn!(key = %handle.key(), reason, "dropping a handle with unsaved changes");
    }
}

/// Save an evicted handle if it has unsaved changes. Errors are logged.
///
/// A handle whose document is still borrowed, possibly by the evicting
/// thread, is skipped; its scope saves it when it ends.
fn save_evicted<D: Document>(handle: &DocumentHandle<D>) {
    match handle.try_flush() {
        Some(Ok(true)) => tracing::debug!(key = %handle.key(), "evicted handle saved"),
        Some(Ok(false)) => {},
        None => tracing::debug!(key = %handle.key(), "evicted handle still in use, left to its scope"),
        Some(Err(e)) => tracing::error!(
            key = %handle.key(),
            error = %e,
            "failed to save evicted handle, changes are lost"
        ),
    }
}
