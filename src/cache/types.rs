//! Cache key types.
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::Result;

/// How a document is opened.
///
/// The mode is part of the cache key: the same file opened read-only and
/// read-write lives in two separate handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct AccessMode {
    /// The handle never writes back to storage
    pub read_only: bool,
    /// Formula cells are replaced by their cached values on load
    pub values_only: bool,
}

impl AccessMode {
    pub const fn new(read_only: bool, values_only: bool) -> Self {
        Self {
            read_only,
            values_only,
        }
    }

    /// Read-write access with formulas preserved.
    pub const fn mutable() -> Self {
        Self::new(false, false)
    }

    /// Read-only access with formulas preserved.
    pub const fn read_only() -> Self {
        Self::new(true, false)
    }

    /// Read-only access that sees cached formula results instead of formulas.
    pub const fn values_only() -> Self {
        Self::new(true, true)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.read_only { "read-only" } else { "read-write" })?;
        if self.values_only {
            f.write_str("+values")?;
        }
        Ok(())
    }
}

/// Identity of a cached handle: an absolute path plus the access mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleKey {
    path: PathBuf,
    mode: AccessMode,
}

impl HandleKey {
    /// Build a key, normalizing `path` with [`normalize_path`].
    pub fn new(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        Ok(Self {
            path: normalize_path(path.as_ref())?,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.path.display(), self.mode)
    }
}

/// Resolve `path` to the absolute form used in cache keys.
///
/// Existing files are canonicalized. For a file that does not exist yet the
/// parent directory is canonicalized when possible, so a document created
/// through the cache keeps the same key after its first save.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }

    let absolute = std::path::absolute(path)?;
    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name())
        && let Ok(parent) = std::fs::canonicalize(parent)
    {
        return Ok(parent.join(name));
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_display() {
        assert_eq!(AccessMode::mutable().to_string(), "read-write");
        assert_eq!(AccessMode::read_only().to_string(), "read-only");
        assert_eq!(AccessMode::values_only().to_string(), "read-only+values");
        assert_eq!(AccessMode::default(), AccessMode::mutable());
    }

    #[test]
    fn test_keys_partition_by_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let rw = HandleKey::new(&path, AccessMode::mutable()).unwrap();
        let ro = HandleKey::new(&path, AccessMode::read_only()).unwrap();
        assert_ne!(rw, ro);
        assert_eq!(rw.path(), ro.path());
    }

    #[test]
    fn test_key_is_stable_across_file_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.xlsx");
        let before = HandleKey::new(&path, AccessMode::mutable()).unwrap();
        std::fs::write(&path, b"").unwrap();
        let after = HandleKey::new(&path, AccessMode::mutable()).unwrap();
        assert_eq!(before, after);
        assert!(before.path().is_absolute());
    }

    #[test]
    fn test_relative_paths_become_absolute() {
        let key = HandleKey::new("some/dir/that/does/not/exist.xlsx", AccessMode::default())
            .unwrap();
        assert!(key.path().is_absolute());
        assert!(key.path().ends_with("some/dir/that/does/not/exist.xlsx"));
    }

    #[test]
    fn test_dot_segments_resolve_to_same_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let direct = HandleKey::new(dir.path().join("book.xlsx"), AccessMode::default()).unwrap();
        let dotted =
            HandleKey::new(dir.path().join("sub/../book.xlsx"), AccessMode::default()).unwrap();
        assert_eq!(direct, dotted);
    }
}
