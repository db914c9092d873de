//! Excel (.xlsx) load and persist for [`Workbook`].
//!
//! Only the parts needed for cell data are read and written: the workbook
//! sheet list, shared strings, and worksheet cells (values and formulas).

mod reader;
mod shared_strings;
mod worksheet;
mod writer;

use std::fs::{self, File, Permissions};
use std::io::{self, BufReader, Cursor, Write};
use std::path::Path;

use crate::common::Result;
use crate::sheet::Workbook;

/// Load a workbook from an `.xlsx` file.
pub(crate) fn read_workbook(path: &Path) -> Result<Workbook> {
    let file = File::open(path)?;
    let archive = zip::ZipArchive::new(BufReader::new(file))?;
    reader::read_package(archive)
}

/// Load a workbook from `.xlsx` bytes.
pub(crate) fn read_workbook_from_bytes(bytes: Vec<u8>) -> Result<Workbook> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    reader::read_package(archive)
}

/// Serialize a workbook to `.xlsx` bytes.
pub(crate) fn write_workbook_to_bytes(workbook: &Workbook) -> Result<Vec<u8>> {
    let cursor = writer::write_package(workbook, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Persist a workbook to `path`.
///
/// The package is written to a temporary file in the destination directory
/// and renamed over `path`, so readers never observe a partial file. The
/// destination directory must already exist. An existing file keeps its
/// permissions; a new one gets the usual umask-filtered defaults.
pub(crate) fn write_workbook(workbook: &Workbook, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let existing = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".sheetcache-").suffix(".xlsx.tmp");
    if existing.is_none()
        && let Some(permissions) = new_file_permissions()
    {
        builder.permissions(permissions);
    }

    let mut tmp = builder.tempfile_in(dir)?;
    let file = writer::write_package(workbook, tmp.as_file_mut())?;
    file.flush()?;
    file.sync_all()?;
    if let Some(permissions) = existing {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.persist(path)?;
    Ok(())
}

/// Mode for files that do not exist yet. Temporary files default to 0600.
#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}
