//! Process-wide handle registry.
//!
//! A [`Registry`] owns one [`HandleCache`] and turns paths into scoped
//! accesses. Tools share the lazily created [`global`] registry, which is
//! configured from the environment on first use; tests build their own.
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;

use super::config::{CacheConfig, ttl_from_secs};
use super::document::Document;
use super::scope::ScopedAccess;
use super::stats::{CacheStats, HandleSnapshot};
use super::store::HandleCache;
use super::types::{AccessMode, HandleKey};
use crate::common::Result;
use crate::sheet::Workbook;

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::from_env);

/// The shared registry, built from [`CacheConfig::from_env`] on first use.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Owner of a handle cache.
pub struct Registry<D: Document = Workbook> {
    cache: HandleCache<D>,
}

impl<D: Document> Registry<D> {
    pub fn new(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: HandleCache::new(config)?,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            cache: HandleCache::with_defaults(),
        }
    }

    pub fn from_env() -> Self {
        let config = CacheConfig::from_env();
        match HandleCache::new(config) {
            Ok(cache) => Self { cache },
            Err(e) => {
                tracing::warn!(error = %e, "invalid cache configuration, using defaults");
                Self::with_defaults()
            },
        }
    }

    /// Open a scope on the document at `path` under `mode`.
    pub fn scoped_access(&self, path: impl AsRef<Path>, mode: AccessMode) -> Result<ScopedAccess<D>> {
        let key = HandleKey::new(path, mode)?;
        ScopedAccess::new(self.cache.get(&key))
    }

    /// Run `f` inside a scope and always flush afterwards.
    ///
    /// If `f` fails its error is returned even when the flush fails too;
    /// the flush error is then only logged. Otherwise the flush result is
    /// returned.
    pub fn with_document<T>(
        &self,
        path: impl AsRef<Path>,
        mode: AccessMode,
        f: impl FnOnce(&ScopedAccess<D>) -> Result<T>,
    ) -> Result<T> {
        let scope = self.scoped_access(path, mode)?;
        let outcome = f(&scope);
        let key = scope.handle().key().clone();
        let flushed = scope.finish();

        match (outcome, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(save_error)) => {
                tracing::error!(
                    key = %key,
                    error = %save_error,
                    "failed to save document after a failed operation"
                );
                Err(e)
            },
        }
    }

    /// Drop the handle for `path` under `mode` without saving it.
    pub fn invalidate(&self, path: impl AsRef<Path>, mode: AccessMode) -> Result<bool> {
        Ok(self.cache.invalidate(&HandleKey::new(path, mode)?))
    }

    /// Drop the handles for `path` under every mode without saving them.
    pub fn invalidate_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.cache.invalidate_path(path)
    }

    /// Drop every handle without saving.
    pub fn clear_all(&self) {
        self.cache.clear();
    }

    /// Set capacity and TTL (in seconds). Resident handles are kept.
    pub fn configure(&self, capacity: usize, ttl_seconds: f64) -> Result<()> {
        self.cache.configure(capacity, ttl_from_secs(ttl_seconds)?)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn entries(&self) -> Vec<HandleSnapshot> {
        self.cache.entries()
    }

    pub fn cache(&self) -> &HandleCache<D> {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.cache.config().ttl
    }
}

impl<D: Document> Default for Registry<D> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// [`Registry::scoped_access`] on the global registry.
pub fn scoped_access(path: impl AsRef<Path>, mode: AccessMode) -> Result<ScopedAccess> {
    global().scoped_access(path, mode)
}

/// [`Registry::invalidate`] on the global registry.
pub fn invalidate(path: impl AsRef<Path>, mode: AccessMode) -> Result<bool> {
    global().invalidate(path, mode)
}

/// [`Registry::invalidate_path`] on the global registry.
pub fn invalidate_path(path: impl AsRef<Path>) -> Result<usize> {
    global().invalidate_path(path)
}

/// [`Registry::clear_all`] on the global registry.
pub fn clear_all() {
    global().clear_all();
}

/// [`Registry::configure`] on the global registry.
pub fn configure(capacity: usize, ttl_seconds: f64) -> Result<()> {
    global().configure(capacity, ttl_seconds)
}

/// [`Registry::get_stats`] on the global registry.
pub fn get_stats() -> CacheStats {
    global().get_stats()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::common::{Error, ErrorKind};
    use crate::sheet::CellValue;

    fn registry(capacity: usize) -> Registry {
        Registry::new(CacheConfig::new(capacity, Duration::from_secs(300))).unwrap()
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let registry = registry(4);

        let scope = registry.scoped_access(&path, AccessMode::mutable()).unwrap();
        scope
            .edit(|wb| wb.active_worksheet_mut().set_cell("A1", "quarterly"))
            .unwrap();
        scope.finish().unwrap();

        let scope = registry.scoped_access(&path, AccessMode::read_only()).unwrap();
        assert_eq!(
            scope.document().unwrap().active_worksheet().cell("A1").unwrap(),
            &CellValue::from("quarterly")
        );
    }

    #[test]
    fn test_capacity_two_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(10);
        registry.configure(2, 300.0).unwrap();

        for name in ["a", "b", "c"] {
            drop(registry.scoped_access(dir.path().join(name), AccessMode::mutable()).unwrap());
        }
        let stats = registry.get_stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);

        let misses = stats.misses;
        drop(registry.scoped_access(dir.path().join("a"), AccessMode::mutable()).unwrap());
        assert_eq!(registry.get_stats().misses, misses + 1);

        let hits = registry.get_stats().hits;
        drop(registry.scoped_access(dir.path().join("c"), AccessMode::mutable()).unwrap());
        assert_eq!(registry.get_stats().hits, hits + 1);
    }

    #[test]
    fn test_with_document_saves_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let registry = registry(4);

        let count = registry
            .with_document(&path, AccessMode::mutable(), |scope| {
                scope.edit(|wb| {
                    let ws = wb.active_worksheet_mut();
                    ws.set_cell("A1", 1)?;
                    ws.set_cell("A2", 2)?;
                    Ok(ws.cell_count())
                })
            })
            .unwrap();
        assert_eq!(count, 2);

        let value = registry
            .with_document(&path, AccessMode::values_only(), |scope| {
                Ok(scope.document()?.active_worksheet().cell("A2")?.clone())
            })
            .unwrap();
        assert_eq!(value, CellValue::Int(2));
        assert_eq!(registry.get_stats().size, 2);
    }

    #[test]
    fn test_with_document_flushes_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let registry = registry(4);

        let err = registry
            .with_document(&path, AccessMode::mutable(), |scope| -> Result<()> {
                scope.edit(|wb| wb.active_worksheet_mut().set_cell("B2", 5))?;
                Err(Error::invalid_operation("downstream check failed"))
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        let saved = Workbook::open(&path, AccessMode::read_only()).unwrap();
        assert_eq!(saved.active_worksheet().cell("B2").unwrap(), &CellValue::Int(5));
    }

    #[test]
    fn test_with_document_prefers_operation_error() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("gone");
        fs::create_dir(&sub).unwrap();
        let path = sub.join("book.xlsx");
        let registry = registry(4);

        let err = registry
            .with_document(&path, AccessMode::mutable(), |scope| -> Result<()> {
                scope.mark_dirty();
                fs::remove_dir(&sub)?;
                Err(Error::invalid_operation("operation failed"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        fs::create_dir(&sub).unwrap();
        let err = registry
            .with_document(&path, AccessMode::mutable(), |_| {
                fs::remove_dir(&sub)?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn test_read_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(4);
        let err = registry
            .scoped_access(dir.path().join("nope.xlsx"), AccessMode::read_only())
            .err()
            .unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(8);
        let path = dir.path().join("book.xlsx");

        registry
            .with_document(&path, AccessMode::mutable(), |_| Ok(()))
            .unwrap();
        registry
            .with_document(&path, AccessMode::read_only(), |_| Ok(()))
            .unwrap();
        assert!(registry.invalidate(&path, AccessMode::read_only()).unwrap());
        assert!(!registry.invalidate(&path, AccessMode::read_only()).unwrap());
        assert_eq!(registry.entries().len(), 1);

        registry
            .with_document(&path, AccessMode::values_only(), |_| Ok(()))
            .unwrap();
        assert_eq!(registry.invalidate_path(&path).unwrap(), 2);

        registry
            .with_document(&path, AccessMode::mutable(), |_| Ok(()))
            .unwrap();
        registry.clear_all();
        assert_eq!(registry.get_stats().size, 0);
    }

    #[test]
    fn test_configure_rejects_bad_values() {
        let registry = registry(4);
        assert_eq!(registry.configure(0, 60.0).unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert_eq!(registry.configure(4, -1.0).unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert_eq!(registry.configure(4, f64::NAN).unwrap_err().kind(), ErrorKind::InvalidOperation);

        registry.configure(3, 0.5).unwrap();
        assert_eq!(registry.ttl(), Duration::from_millis(500));
        assert_eq!(registry.get_stats().max_size, 3);
    }

    #[test]
    fn test_global_registry_functions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.xlsx");

        let scope = scoped_access(&path, AccessMode::mutable()).unwrap();
        scope.edit(|wb| wb.active_worksheet_mut().set_cell("C3", 9.5)).unwrap();
        scope.finish().unwrap();

        assert!(get_stats().total_accesses >= 1);
        assert!(invalidate(&path, AccessMode::mutable()).unwrap());
        assert_eq!(invalidate_path(&path).unwrap(), 0);
        assert!(configure(0, 10.0).is_err());

        let scope = scoped_access(&path, AccessMode::read_only()).unwrap();
        assert_eq!(
            scope.document().unwrap().active_worksheet().cell("C3").unwrap(),
            &CellValue::Float(9.5)
        );
    }
}
