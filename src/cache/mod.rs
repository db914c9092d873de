//! Handle cache for opened spreadsheet documents.
//!
//! Opening a workbook is expensive, and tools tend to touch the same file
//! many times in a row. This module keeps opened documents resident and
//! shares them between callers:
//!
//! - [`DocumentHandle`]: one document under one [`AccessMode`], loaded on
//!   first use, with dirty tracking and atomic save.
//! - [`HandleCache`]: bounded LRU store with idle-time (TTL) expiry.
//! - [`ScopedAccess`]: borrow of a handle for one operation that saves on
//!   exit if the document changed.
//! - [`Registry`]: owner of a cache; [`global`] is the shared instance the
//!   free functions ([`scoped_access`], [`invalidate`], [`clear_all`],
//!   [`configure`], [`get_stats`]) operate on.
//!
//! The cache works with any [`Document`]; [`Workbook`](crate::sheet::Workbook)
//! is the default.
//!
//! # Example
//!
//! ```rust
//! use sheetcache::cache::{AccessMode, Registry};
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("inventory.xlsx");
//! let registry: Registry = Registry::with_defaults();
//!
//! registry.with_document(&path, AccessMode::mutable(), |scope| {
//!     scope.edit(|wb| wb.active_worksheet_mut().set_cell("A1", "SKU"))
//! })?;
//!
//! let stats = registry.get_stats();
//! assert_eq!((stats.misses, stats.size), (1, 1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod document;
mod handle;
mod registry;
mod scope;
mod stats;
mod store;
mod types;

pub use config::{
    CacheConfig, DEFAULT_CAPACITY, DEFAULT_TTL, ENV_CACHE_SIZE, ENV_CACHE_TTL, ENV_SAVE_ON_EVICT,
    ttl_from_secs,
};
pub use document::Document;
pub use handle::{DocumentGuard, DocumentHandle};
pub use registry::{
    Registry, clear_all, configure, get_stats, global, invalidate, invalidate_path, scoped_access,
};
pub use scope::ScopedAccess;
pub use stats::{CacheStats, HandleSnapshot};
pub use store::HandleCache;
pub use types::{AccessMode, HandleKey, normalize_path};
