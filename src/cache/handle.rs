//! A single opened document bound to a cache key.
//!
//! The document is loaded lazily on the first [`DocumentHandle::get_document`]
//! call and stays in memory for the lifetime of the handle. Mutation is
//! tracked by an explicit dirty flag that callers set with
//! [`DocumentHandle::mark_dirty`] and that only a successful save clears.
//!
//! # Locking
//!
//! The document sits behind a per-handle mutex; the guard returned by
//! `get_document` holds it. Counters and flags are atomics, and the
//! last-access timestamp has its own short lock, so the cache can inspect a
//! handle while another thread is working on its document. The document
//! mutex is not reentrant: calling [`DocumentHandle::save`] on the same
//! thread while a [`DocumentGuard`] is alive deadlocks. Saves triggered by
//! cache eviction only try the lock.
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use super::document::Document;
use super::stats::HandleSnapshot;
use super::types::{AccessMode, HandleKey};
use crate::common::{Error, Result};
use crate::sheet::Workbook;

/// Exclusive access to a loaded document.
pub type DocumentGuard<'a, D> = MappedMutexGuard<'a, D>;

/// Load state of a handle.
enum DocumentState<D> {
    Unloaded,
    Loaded(D),
}

impl<D> DocumentState<D> {
    fn document_mut(&mut self) -> Option<&mut D> {
        match self {
            DocumentState::Loaded(doc) => Some(doc),
            DocumentState::Unloaded => None,
        }
    }
}

/// One opened document under one access mode.
pub struct DocumentHandle<D: Document = Workbook> {
    key: HandleKey,
    state: Mutex<DocumentState<D>>,
    loaded: AtomicBool,
    dirty: AtomicBool,
    access_count: AtomicU64,
    created_at: Instant,
    last_accessed: Mutex<Instant>,
}

impl<D: Document> DocumentHandle<D> {
    /// Create an unloaded, clean handle. No storage is touched.
    pub fn new(key: HandleKey) -> Self {
        let now = Instant::now();
        Self {
            key,
            state: Mutex::new(DocumentState::Unloaded),
            loaded: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            access_count: AtomicU64::new(0),
            created_at: now,
            last_accessed: Mutex::new(now),
        }
    }

    pub fn key(&self) -> &HandleKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.key.path()
    }

    pub fn mode(&self) -> AccessMode {
        self.key.mode()
    }

    pub fn is_read_only(&self) -> bool {
        self.key.mode().read_only
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Number of document fetches so far.
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        *self.last_accessed.lock()
    }

    /// Get the document, loading it first if needed.
    ///
    /// A missing (or zero-length) file opened read-write yields a blank
    /// document that is marked dirty, so the end of the scope creates the
    /// file. A missing file opened read-only is [`Error::NotFound`]. Load
    /// failures propagate and leave the handle unloaded; the next call tries
    /// again.
    ///
    /// Concurrent callers are serialized on the handle, so the document is
    /// loaded at most once.
    pub fn get_document(&self) -> Result<DocumentGuard<'_, D>> {
        let mut state = self.state.lock();
        if matches!(*state, DocumentState::Unloaded) {
            let (document, fresh) = self.load()?;
            *state = DocumentState::Loaded(document);
            self.loaded.store(true, Ordering::Release);
            if fresh {
                self.dirty.store(true, Ordering::Release);
            }
        }

        self.access_count.fetch_add(1, Ordering::Relaxed);
        self.touch();

        MutexGuard::try_map(state, DocumentState::document_mut)
            .map_err(|_| Error::invalid_operation(format!("{} is not loaded", self.key)))
    }

    /// Record that the document was modified.
    ///
    /// Ignored while the handle is unloaded: there is nothing to save yet.
    pub fn mark_dirty(&self) {
        if self.is_loaded() {
            self.dirty.store(true, Ordering::Release);
        } else {
            tracing::debug!(key = %self.key, "mark_dirty on an unloaded handle ignored");
        }
    }

    /// Write the document back to its path.
    ///
    /// Fails with [`Error::InvalidOperation`] on a read-only handle without
    /// touching storage. Does nothing if the document was never loaded. The
    /// dirty flag is cleared only when the write succeeds.
    pub fn save(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::invalid_operation(format!(
                "cannot save read-only document {}",
                self.path().display()
            )));
        }

        self.write_back(&self.state.lock())
    }

    /// Save if the handle is writable and dirty. Returns whether a save ran.
    pub(crate) fn flush(&self) -> Result<bool> {
        if self.is_read_only() || !self.is_dirty() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Like [`flush`](Self::flush), but gives up with `None` instead of
    /// waiting when the document is borrowed, including by the calling
    /// thread.
    pub(crate) fn try_flush(&self) -> Option<Result<bool>> {
        if self.is_read_only() || !self.is_dirty() {
            return Some(Ok(false));
        }
        let state = self.state.try_lock()?;
        Some(self.write_back(&state).map(|()| true))
    }

    fn write_back(&self, state: &DocumentState<D>) -> Result<()> {
        let DocumentState::Loaded(document) = state else {
            return Ok(());
        };

        document.save(self.path())?;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(key = %self.key, "document saved");
        Ok(())
    }

    /// Whether the handle has been idle for longer than `max_age`.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.is_expired_at(Instant::now(), max_age)
    }

    /// [`is_expired`](Self::is_expired) evaluated at `now`.
    pub fn is_expired_at(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.last_accessed()) > max_age
    }

    /// Diagnostic view of this handle.
    pub fn snapshot(&self) -> HandleSnapshot {
        HandleSnapshot {
            path: self.path().to_path_buf(),
            mode: self.mode(),
            access_count: self.access_count(),
            is_dirty: self.is_dirty(),
            is_loaded: self.is_loaded(),
            idle_seconds: self.last_accessed().elapsed().as_secs_f64(),
        }
    }

    /// Refresh the last-access timestamp.
    pub(crate) fn touch(&self) {
        *self.last_accessed.lock() = Instant::now();
    }

    /// Produce the initial document and whether it is new (not yet on disk).
    fn load(&self) -> Result<(D, bool)> {
        let path = self.path();
        let mode = self.mode();

        match fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() == 0 => {
                tracing::debug!(key = %self.key, "zero-length file, starting a blank document");
                Ok((D::empty(), !mode.read_only))
            },
            Ok(_) => {
                tracing::debug!(key = %self.key, "loading document");
                Ok((D::load(path, mode)?, false))
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if mode.read_only {
                    Err(Error::NotFound(path.to_path_buf()))
                } else {
                    tracing::debug!(key = %self.key, "no file yet, starting a blank document");
                    Ok((D::empty(), true))
                }
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl<D: Document> std::fmt::Debug for DocumentHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .field("dirty", &self.is_dirty())
            .field("access_count", &self.access_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;
    use crate::common::ErrorKind;
    use crate::sheet::CellValue;

    fn handle(path: &Path, mode: AccessMode) -> DocumentHandle {
        DocumentHandle::new(HandleKey::new(path, mode).unwrap())
    }

    /// Document that counts loads and stores its payload as raw bytes.
    struct Probe(Vec<u8>);

    static PROBE_LOADS: AtomicUsize = AtomicUsize::new(0);

    impl Document for Probe {
        fn empty() -> Self {
            Probe(Vec::new())
        }

        fn load(path: &Path, _mode: AccessMode) -> Result<Self> {
            PROBE_LOADS.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Probe(fs::read(path)?))
        }

        fn save(&self, path: &Path) -> Result<()> {
            fs::write(path, &self.0)?;
            Ok(())
        }
    }

    #[test]
    fn test_new_handle_is_unloaded_and_clean() {
        let dir = tempfile::tempdir().unwrap();
        let h = handle(&dir.path().join("a.xlsx"), AccessMode::mutable());
        assert!(!h.is_loaded());
        assert!(!h.is_dirty());
        assert_eq!(h.access_count(), 0);
        assert!(h.last_accessed() >= h.created_at());
    }

    #[test]
    fn test_missing_file_mutable_starts_blank_and_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.xlsx");
        let h = handle(&path, AccessMode::mutable());

        let doc = h.get_document().unwrap();
        assert_eq!(*doc, Workbook::new());
        drop(doc);

        assert!(h.is_loaded());
        assert!(h.is_dirty());
        assert_eq!(h.access_count(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_read_only_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let h = handle(&dir.path().join("missing.xlsx"), AccessMode::read_only());
        let err = h.get_document().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!h.is_loaded());
    }

    #[test]
    fn test_zero_length_file_loads_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        fs::write(&path, b"").unwrap();

        let ro = handle(&path, AccessMode::read_only());
        assert_eq!(*ro.get_document().unwrap(), Workbook::new());
        assert!(!ro.is_dirty());

        let rw = handle(&path, AccessMode::mutable());
        rw.get_document().unwrap();
        assert!(rw.is_dirty());
    }

    #[test]
    fn test_load_failure_leaves_handle_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.xlsx");
        fs::write(&path, b"definitely not a zip package").unwrap();

        let h = handle(&path, AccessMode::mutable());
        let err = h.get_document().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(!h.is_loaded());
        assert!(!h.is_dirty());
        assert_eq!(h.access_count(), 0);
    }

    #[test]
    fn test_document_is_loaded_once_and_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.xlsx");
        let h = handle(&path, AccessMode::mutable());

        h.get_document().unwrap().active_worksheet_mut().set_cell("A1", 7).unwrap();
        let doc = h.get_document().unwrap();
        assert_eq!(doc.active_worksheet().cell("A1").unwrap(), &CellValue::Int(7));
        drop(doc);
        assert_eq!(h.access_count(), 2);
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.bin");
        fs::write(&path, b"payload").unwrap();

        let key = HandleKey::new(&path, AccessMode::read_only()).unwrap();
        let h: Arc<DocumentHandle<Probe>> = Arc::new(DocumentHandle::new(key));
        let before = PROBE_LOADS.load(Ordering::SeqCst);

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let h = Arc::clone(&h);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    h.get_document().unwrap().0.clone()
                })
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), b"payload");
        }
        assert_eq!(PROBE_LOADS.load(Ordering::SeqCst) - before, 1);
        assert_eq!(h.access_count(), threads as u64);
    }

    #[test]
    fn test_mark_dirty_ignored_until_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        Workbook::new().save(&path).unwrap();

        let h = handle(&path, AccessMode::mutable());
        h.mark_dirty();
        assert!(!h.is_dirty());

        h.get_document().unwrap();
        assert!(!h.is_dirty());
        h.mark_dirty();
        h.mark_dirty();
        assert!(h.is_dirty());
    }

    #[test]
    fn test_read_only_save_is_rejected_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.xlsx");

        let missing = handle(&path, AccessMode::read_only());
        let err = missing.save().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(!path.exists());

        let mut wb = Workbook::new();
        wb.active_worksheet_mut().set_cell("A1", "original").unwrap();
        wb.save(&path).unwrap();
        let on_disk = fs::read(&path).unwrap();

        let h = handle(&path, AccessMode::read_only());
        h.get_document().unwrap().active_worksheet_mut().set_cell("A1", "changed").unwrap();
        h.mark_dirty();
        assert_eq!(h.save().unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert_eq!(fs::read(&path).unwrap(), on_disk);
        assert!(!h.flush().unwrap());
    }

    #[test]
    fn test_try_flush_does_not_wait_for_a_borrowed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.xlsx");
        let h = handle(&path, AccessMode::mutable());

        let document = h.get_document().unwrap();
        assert!(h.try_flush().is_none());
        drop(document);

        assert!(h.is_dirty());
        assert!(h.try_flush().unwrap().unwrap());
        assert!(!h.is_dirty());
        assert!(path.exists());
        assert!(!h.try_flush().unwrap().unwrap());
    }

    #[test]
    fn test_save_of_unloaded_handle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untouched.xlsx");
        let h = handle(&path, AccessMode::mutable());
        h.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_save_keeps_dirty_and_retry_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("out");
        fs::create_dir(&sub).unwrap();
        let path = sub.join("book.xlsx");

        let h = handle(&path, AccessMode::mutable());
        h.get_document().unwrap().active_worksheet_mut().set_cell("A1", 1).unwrap();
        h.mark_dirty();

        fs::remove_dir(&sub).unwrap();
        let err = h.save().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(h.is_dirty());

        fs::create_dir(&sub).unwrap();
        h.save().unwrap();
        assert!(!h.is_dirty());

        let reopened = Workbook::open(&path, AccessMode::read_only()).unwrap();
        assert_eq!(reopened.active_worksheet().cell("A1").unwrap(), &CellValue::Int(1));
    }

    #[test]
    fn test_expiry_uses_last_access() {
        let dir = tempfile::tempdir().unwrap();
        let h = handle(&dir.path().join("t.xlsx"), AccessMode::mutable());
        let ttl = Duration::from_secs(300);
        let last = h.last_accessed();

        assert!(!h.is_expired(ttl));
        assert!(!h.is_expired_at(last + ttl, ttl));
        assert!(h.is_expired_at(last + ttl + Duration::from_millis(1), ttl));
        // A clock reading from before the last access is never expired
        assert!(!h.is_expired_at(h.created_at(), Duration::ZERO));

        thread::sleep(Duration::from_millis(5));
        h.touch();
        assert!(!h.is_expired_at(last + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let h = handle(&dir.path().join("s.xlsx"), AccessMode::mutable());
        h.get_document().unwrap();
        let snap = h.snapshot();
        assert_eq!(snap.path, h.path());
        assert_eq!(snap.mode, AccessMode::mutable());
        assert_eq!(snap.access_count, 1);
        assert!(snap.is_loaded && snap.is_dirty);
        assert!(snap.idle_seconds >= 0.0);
    }
}
