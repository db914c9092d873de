//! Unified error type for sheetcache.
//!
//! Every failure the cache, the scoped access layer and the xlsx codec can
//! report is a variant of [`Error`]. Callers at the tool layer usually only
//! care about the coarse [`ErrorKind`].
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Main error type for sheetcache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A read-only handle was asked to load a path that does not exist
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The operation is not allowed in the current state (e.g. saving a
    /// read-only handle, configuring a zero-capacity cache)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A cell reference such as `A1` could not be parsed
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// The package is a ZIP file but not a workbook we can read
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Coarse classification of [`Error`], as reported to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The requested document does not exist
    NotFound,
    /// The caller misused the API; retrying will not help
    InvalidOperation,
    /// Storage-level failure while loading or persisting
    IoFailure,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidOperation(_) | Error::InvalidReference(_) => {
                ErrorKind::InvalidOperation
            },
            Error::Io(_) | Error::Zip(_) | Error::Xml(_) | Error::InvalidFormat(_) => {
                ErrorKind::IoFailure
            },
        }
    }

    /// Shorthand for [`Error::InvalidOperation`].
    pub(crate) fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }
}

/// Result type for sheetcache operations.
pub type Result<T> = std::result::Result<T, Error>;
