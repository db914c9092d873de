//! The storage-facing side of a cached document.
use std::path::Path;

use super::types::AccessMode;
use crate::common::Result;
use crate::sheet::Workbook;

/// A document type the handle cache can manage.
///
/// The cache never interprets document contents. It only needs to create a
/// blank document for a path that does not exist yet, load one from
/// storage, and write one back.
pub trait Document: Send + Sized + 'static {
    /// A new, blank document.
    fn empty() -> Self;

    /// Load the document stored at `path`.
    fn load(path: &Path, mode: AccessMode) -> Result<Self>;

    /// Persist the document to `path`. From the cache's point of view this
    /// either fully succeeds or leaves the previous contents in place.
    fn save(&self, path: &Path) -> Result<()>;
}

impl Document for Workbook {
    fn empty() -> Self {
        Workbook::new()
    }

    fn load(path: &Path, mode: AccessMode) -> Result<Self> {
        Workbook::open(path, mode)
    }

    fn save(&self, path: &Path) -> Result<()> {
        Workbook::save(self, path)
    }
}
