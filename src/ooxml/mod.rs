//! OOXML (Office Open XML) persistence.
//!
//! This module reads and writes the SpreadsheetML subset the workbook model
//! needs (.xlsx).

pub mod xlsx;
