//! Spreadsheet document model.
//!
//! This module provides the in-memory workbook that the handle cache loads,
//! hands out to callers and persists back to `.xlsx`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sheetcache::cache::AccessMode;
//! use sheetcache::sheet::Workbook;
//!
//! let mut workbook = Workbook::open("data.xlsx", AccessMode::default())?;
//! workbook.active_worksheet_mut().set_cell("A1", "updated")?;
//! workbook.save("data.xlsx")?;
//! # Ok::<(), sheetcache::Error>(())
//! ```

// Submodule declarations
pub mod reference;
pub mod types;
mod workbook;

// Re-exports
pub use reference::{coords_to_reference, column_to_letters, letters_to_column, reference_to_coords};
pub use types::CellValue;
pub use workbook::{Workbook, Worksheet};
