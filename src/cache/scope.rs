//! Scoped access with save-on-exit.
use std::sync::Arc;

use super::document::Document;
use super::handle::{DocumentGuard, DocumentHandle};
use crate::common::Result;
use crate::sheet::Workbook;

/// A borrow of a cached handle for one logical operation.
///
/// When the scope ends the document is saved if it was marked dirty and the
/// handle is writable. Call [`finish`](Self::finish) to end the scope and
/// observe the save result. A scope that is simply dropped (early return,
/// `?`, panic) performs the same flush, but can only log a failure; the
/// handle then stays dirty and the next scope retries the save.
///
/// # Examples
///
/// ```rust
/// use sheetcache::cache::{AccessMode, Registry};
/// use sheetcache::sheet::CellValue;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("budget.xlsx");
/// let registry: Registry = Registry::with_defaults();
///
/// let scope = registry.scoped_access(&path, AccessMode::mutable())?;
/// scope.document()?.active_worksheet_mut().set_cell("A1", 1200)?;
/// scope.mark_dirty();
/// scope.finish()?;
///
/// let scope = registry.scoped_access(&path, AccessMode::read_only())?;
/// assert_eq!(scope.document()?.active_worksheet().cell("A1")?, &CellValue::Int(1200));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ScopedAccess<D: Document = Workbook> {
    handle: Arc<DocumentHandle<D>>,
    finished: bool,
}

impl<D: Document> ScopedAccess<D> {
    /// Begin a scope on `handle`, loading the document if needed.
    pub fn new(handle: Arc<DocumentHandle<D>>) -> Result<Self> {
        drop(handle.get_document()?);
        Ok(Self {
            handle,
            finished: false,
        })
    }

    /// The live document.
    pub fn document(&self) -> Result<DocumentGuard<'_, D>> {
        self.handle.get_document()
    }

    /// Signal that the document was modified in this scope.
    pub fn mark_dirty(&self) {
        self.handle.mark_dirty();
    }

    /// Run `f` on the document and mark it dirty if `f` succeeds.
    pub fn edit<T>(&self, f: impl FnOnce(&mut D) -> Result<T>) -> Result<T> {
        let value = {
            let mut document = self.handle.get_document()?;
            f(&mut *document)?
        };
        self.handle.mark_dirty();
        Ok(value)
    }

    pub fn handle(&self) -> &Arc<DocumentHandle<D>> {
        &self.handle
    }

    /// End the scope, saving if the document is dirty and writable.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.handle.flush().map(|_| ())
    }
}

impl<D: Document> Drop for ScopedAccess<D> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.handle.flush() {
            tracing::error!(
                key = %self.handle.key(),
                error = %e,
                "failed to save document at end of scope, changes remain unsaved"
            );
        }
    }
}
