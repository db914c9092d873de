//! Sheetcache - a handle cache for opened spreadsheet documents
//!
//! Spreadsheet tools tend to read and modify the same workbook many times
//! in a row. This library keeps opened workbooks resident, shares them
//! between callers, and writes them back when a logical operation ends.
//!
//! # Features
//!
//! - **Lazy loading**: a document is read from disk on its first use only
//! - **LRU + TTL eviction**: bounded residency with idle-time expiry
//! - **Scoped save-on-exit**: modified documents are saved when the scope
//!   ends, including early returns and panics
//! - **Thread-safe**: concurrent callers of the same file share one handle
//! - **Atomic saves**: `.xlsx` files are written next to the destination
//!   and renamed into place
//!
//! # Example - Editing a workbook through the global cache
//!
//! ```no_run
//! use sheetcache::{AccessMode, CellValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scope = sheetcache::scoped_access("sales.xlsx", AccessMode::mutable())?;
//! scope.edit(|wb| wb.active_worksheet_mut().set_cell("B2", 1250))?;
//! scope.finish()?;
//!
//! let scope = sheetcache::scoped_access("sales.xlsx", AccessMode::read_only())?;
//! assert_eq!(scope.document()?.active_worksheet().cell("B2")?, &CellValue::Int(1250));
//!
//! println!("{:?}", sheetcache::get_stats());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - An independent cache
//!
//! ```no_run
//! use sheetcache::{AccessMode, CacheConfig, Registry};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry: Registry = Registry::new(CacheConfig::new(4, Duration::from_secs(120)))?;
//! let total = registry.with_document("sales.xlsx", AccessMode::values_only(), |scope| {
//!     Ok(scope.document()?.active_worksheet().cell_count())
//! })?;
//! println!("{} cells", total);
//! # Ok(())
//! # }
//! ```

/// Handle cache, scoped access and the global registry
pub mod cache;

/// Shared error type and XML helpers
pub mod common;

/// OOXML (Office Open XML) persistence for workbooks
pub mod ooxml;

/// In-memory workbook model
pub mod sheet;

// Re-export commonly used types for convenience
pub use cache::{
    AccessMode, CacheConfig, CacheStats, Document, DocumentHandle, HandleCache, HandleKey,
    HandleSnapshot, Registry, ScopedAccess, clear_all, configure, get_stats, invalidate,
    invalidate_path, scoped_access,
};
pub use common::{Error, ErrorKind, Result};
pub use sheet::{CellValue, Workbook, Worksheet};
