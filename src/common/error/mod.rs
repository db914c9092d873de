//! Unified error types for sheetcache.
//!
//! This module provides one error type covering cache misuse, missing
//! documents and storage failures from the xlsx codec.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, ErrorKind, Result};
