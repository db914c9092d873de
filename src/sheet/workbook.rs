//! In-memory workbook model.
//!
//! A [`Workbook`] is an ordered list of named [`Worksheet`]s plus the index
//! of the active one. It is the document type the handle cache manages by
//! default; persistence lives in [`crate::ooxml::xlsx`].

use std::collections::BTreeMap;
use std::path::Path;

use super::reference::{MAX_COLUMN, MAX_ROW, reference_to_coords};
use super::types::CellValue;
use crate::cache::AccessMode;
use crate::common::{Error, Result};
use crate::ooxml::xlsx;

/// Maximum length Excel accepts for a sheet name.
const MAX_SHEET_NAME_LEN: usize = 31;

/// A single worksheet: a sparse grid of cells keyed by `(row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl Worksheet {
    /// Create an empty worksheet.
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Get the worksheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a cell by reference (e.g., "A1"). Missing cells read as `Empty`.
    pub fn cell(&self, reference: &str) -> Result<&CellValue> {
        let (row, col) = reference_to_coords(reference)?;
        Ok(self.cell_at(row, col))
    }

    /// Get a cell by 1-based row and column.
    pub fn cell_at(&self, row: u32, col: u32) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.cells.get(&(row, col)).unwrap_or(EMPTY)
    }

    /// Set a cell by reference. Setting `Empty` removes the cell.
    pub fn set_cell(&mut self, reference: &str, value: impl Into<CellValue>) -> Result<()> {
        let (row, col) = reference_to_coords(reference)?;
        self.set_cell_at(row, col, value)
    }

    /// Set a cell by 1-based row and column. Setting `Empty` removes the cell.
    pub fn set_cell_at(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        if row == 0 || row > MAX_ROW || col == 0 || col > MAX_COLUMN {
            return Err(Error::InvalidReference(format!("R{}C{}", row, col)));
        }
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
        Ok(())
    }

    /// Remove a cell, returning its previous value.
    pub fn clear_cell(&mut self, reference: &str) -> Result<CellValue> {
        let (row, col) = reference_to_coords(reference)?;
        Ok(self.cells.remove(&(row, col)).unwrap_or(CellValue::Empty))
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Get the dimensions as (min_row, min_col, max_row, max_col).
    /// Returns None if the worksheet is empty.
    pub fn dimensions(&self) -> Option<(u32, u32, u32, u32)> {
        let (first, _) = self.cells.first_key_value()?;
        let (last, _) = self.cells.last_key_value()?;
        let (min_col, max_col) = self
            .cells
            .keys()
            .fold((u32::MAX, 0), |(lo, hi), &(_, c)| (lo.min(c), hi.max(c)));
        Some((first.0, min_col, last.0, max_col))
    }

    /// Iterate non-empty cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &CellValue)> {
        self.cells.iter().map(|(&pos, value)| (pos, value))
    }

    /// Replace every formula with its cached value.
    pub(crate) fn collapse_formulas(&mut self) {
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .map(|(pos, value)| (pos, value.into_value()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
    }
}

/// An in-memory spreadsheet document.
///
/// # Examples
///
/// ```rust
/// use sheetcache::sheet::{CellValue, Workbook};
///
/// let mut workbook = Workbook::new();
/// workbook.active_worksheet_mut().set_cell("A1", "Hello")?;
/// workbook.add_worksheet("Totals")?.set_cell("B2", 42)?;
///
/// assert_eq!(workbook.worksheet_names(), vec!["Sheet1", "Totals"]);
/// assert_eq!(workbook.active_worksheet().cell("A1")?, &CellValue::from("Hello"));
/// # Ok::<(), sheetcache::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
    active: usize,
}

impl Workbook {
    /// Create a workbook with one empty worksheet named "Sheet1".
    pub fn new() -> Self {
        Self {
            sheets: vec![Worksheet::new("Sheet1")],
            active: 0,
        }
    }

    /// Build a workbook from parsed sheets. An empty list yields a default
    /// workbook; an out-of-range active index falls back to the first sheet.
    pub(crate) fn from_parts(sheets: Vec<Worksheet>, active: usize) -> Self {
        if sheets.is_empty() {
            return Self::new();
        }
        let active = if active < sheets.len() { active } else { 0 };
        Self { sheets, active }
    }

    /// Open an `.xlsx` file.
    ///
    /// With `mode.values_only`, formula cells are replaced by their cached
    /// values.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let mut workbook = xlsx::read_workbook(path.as_ref())?;
        if mode.values_only {
            workbook.collapse_formulas();
        }
        Ok(workbook)
    }

    /// Parse an `.xlsx` package held in memory.
    pub fn from_bytes(bytes: Vec<u8>, mode: AccessMode) -> Result<Self> {
        let mut workbook = xlsx::read_workbook_from_bytes(bytes)?;
        if mode.values_only {
            workbook.collapse_formulas();
        }
        Ok(workbook)
    }

    /// Write the workbook to `path` as `.xlsx`, replacing it atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        xlsx::write_workbook(self, path.as_ref())
    }

    /// Serialize the workbook to `.xlsx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        xlsx::write_workbook_to_bytes(self)
    }

    /// Get all worksheet names in order.
    pub fn worksheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Worksheet::name).collect()
    }

    /// Get the number of worksheets.
    pub fn worksheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Iterate worksheets in order.
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.sheets.iter()
    }

    /// Get a worksheet by name.
    pub fn worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|ws| ws.name == name)
    }

    /// Get a mutable worksheet by name.
    pub fn worksheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|ws| ws.name == name)
    }

    /// Get a worksheet by index.
    pub fn worksheet_at(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    /// Get the index of the active worksheet.
    pub fn active_sheet_index(&self) -> usize {
        self.active
    }

    /// Get the active worksheet.
    pub fn active_worksheet(&self) -> &Worksheet {
        &self.sheets[self.active]
    }

    /// Get the active worksheet mutably.
    pub fn active_worksheet_mut(&mut self) -> &mut Worksheet {
        &mut self.sheets[self.active]
    }

    /// Make the named worksheet active.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.active = self.index_of(name)?;
        Ok(())
    }

    /// Append a new empty worksheet.
    pub fn add_worksheet(&mut self, name: &str) -> Result<&mut Worksheet> {
        self.check_new_name(name)?;
        self.sheets.push(Worksheet::new(name));
        let index = self.sheets.len() - 1;
        Ok(&mut self.sheets[index])
    }

    /// Remove a worksheet. The last remaining worksheet cannot be removed.
    pub fn remove_worksheet(&mut self, name: &str) -> Result<Worksheet> {
        let index = self.index_of(name)?;
        if self.sheets.len() == 1 {
            return Err(Error::invalid_operation(
                "cannot remove the only worksheet of a workbook",
            ));
        }
        let removed = self.sheets.remove(index);
        if self.active > index || self.active >= self.sheets.len() {
            self.active = self.active.saturating_sub(1);
        }
        Ok(removed)
    }

    /// Rename a worksheet.
    pub fn rename_worksheet(&mut self, from: &str, to: &str) -> Result<()> {
        let index = self.index_of(from)?;
        if from == to {
            return Ok(());
        }
        self.check_new_name(to)?;
        self.sheets[index].name = to.to_string();
        Ok(())
    }

    /// Copy a worksheet's cells into a new worksheet appended at the end.
    pub fn copy_worksheet(&mut self, from: &str, to: &str) -> Result<&mut Worksheet> {
        let index = self.index_of(from)?;
        self.check_new_name(to)?;
        let mut copy = self.sheets[index].clone();
        copy.name = to.to_string();
        self.sheets.push(copy);
        let index = self.sheets.len() - 1;
        Ok(&mut self.sheets[index])
    }

    /// Replace every formula in every sheet with its cached value.
    pub(crate) fn collapse_formulas(&mut self) {
        for sheet in &mut self.sheets {
            sheet.collapse_formulas();
        }
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|ws| ws.name == name)
            .ok_or_else(|| Error::invalid_operation(format!("no worksheet named '{}'", name)))
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::invalid_operation(format!(
                "worksheet name must be 1-{} characters: '{}'",
                MAX_SHEET_NAME_LEN, name
            )));
        }
        if name.contains(['\\', '/', '?', '*', '[', ']', ':']) {
            return Err(Error::invalid_operation(format!(
                "worksheet name contains a forbidden character: '{}'",
                name
            )));
        }
        if self
            .sheets
            .iter()
            .any(|ws| ws.name.eq_ignore_ascii_case(name))
        {
            return Err(Error::invalid_operation(format!(
                "worksheet '{}' already exists",
                name
            )));
        }
        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook_has_one_sheet() {
        let wb = Workbook::new();
        assert_eq!(wb.worksheet_names(), vec!["Sheet1"]);
        assert_eq!(wb.active_sheet_index(), 0);
        assert!(wb.active_worksheet().dimensions().is_none());
    }

    #[test]
    fn test_set_and_clear_cells() {
        let mut wb = Workbook::new();
        let ws = wb.active_worksheet_mut();
        ws.set_cell("B2", 3.5).unwrap();
        ws.set_cell("D7", "x").unwrap();
        ws.set_cell_at(4, 1, true).unwrap();
        assert_eq!(ws.cell_count(), 3);
        assert_eq!(ws.dimensions(), Some((2, 1, 7, 4)));

        assert_eq!(ws.clear_cell("B2").unwrap(), CellValue::Float(3.5));
        assert_eq!(ws.cell("B2").unwrap(), &CellValue::Empty);

        ws.set_cell("D7", CellValue::Empty).unwrap();
        assert_eq!(ws.cell_count(), 1);
        assert!(ws.set_cell_at(0, 1, 1).is_err());
    }

    #[test]
    fn test_cells_iterate_row_major() {
        let mut ws = Worksheet::new("S");
        ws.set_cell("B2", 1).unwrap();
        ws.set_cell("A2", 2).unwrap();
        ws.set_cell("C1", 3).unwrap();
        let order: Vec<_> = ws.cells().map(|(pos, _)| pos).collect();
        assert_eq!(order, vec![(1, 3), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_sheet_management() {
        let mut wb = Workbook::new();
        wb.add_worksheet("Data").unwrap().set_cell("A1", 1).unwrap();
        wb.copy_worksheet("Data", "Data copy").unwrap();
        assert_eq!(
            wb.worksheet("Data copy").unwrap().cell("A1").unwrap(),
            &CellValue::Int(1)
        );

        assert!(wb.add_worksheet("data").is_err());
        assert!(wb.add_worksheet("bad/name").is_err());
        assert!(wb.add_worksheet("").is_err());

        wb.rename_worksheet("Data copy", "Archive").unwrap();
        assert_eq!(wb.worksheet_names(), vec!["Sheet1", "Data", "Archive"]);

        wb.set_active("Archive").unwrap();
        wb.remove_worksheet("Sheet1").unwrap();
        assert_eq!(wb.active_worksheet().name(), "Archive");

        wb.remove_worksheet("Archive").unwrap();
        assert_eq!(wb.active_worksheet().name(), "Data");
        assert!(matches!(
            wb.remove_worksheet("Data"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_collapse_formulas() {
        let mut wb = Workbook::new();
        let ws = wb.active_worksheet_mut();
        ws.set_cell("A1", 2).unwrap();
        ws.set_cell(
            "A2",
            CellValue::Formula {
                formula: "A1*2".to_string(),
                cached_value: Some(Box::new(CellValue::Int(4))),
            },
        )
        .unwrap();
        ws.set_cell("A3", CellValue::formula("NOW()")).unwrap();

        wb.collapse_formulas();
        let ws = wb.active_worksheet();
        assert_eq!(ws.cell("A2").unwrap(), &CellValue::Int(4));
        assert_eq!(ws.cell("A3").unwrap(), &CellValue::Empty);
        assert_eq!(ws.cell_count(), 2);
    }
}
