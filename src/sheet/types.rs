//! Common types for spreadsheet cells.

use serde::Serialize;

/// Types of data that can be stored in a cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellValue {
    /// Empty cell
    Empty,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point number
    Float(f64),
    /// String value
    String(String),
    /// Date/time value (stored as serial number)
    ///
    /// Written as a plain number; without a date style it loads back as
    /// [`CellValue::Float`].
    DateTime(f64),
    /// Error value such as `#DIV/0!`
    Error(String),
    /// Formula with the value computed by the last application that
    /// evaluated it, if any
    Formula {
        /// Formula text without the leading `=`
        formula: String,
        /// Cached result
        cached_value: Option<Box<CellValue>>,
    },
}

impl CellValue {
    /// Build a formula cell. A leading `=` is stripped.
    pub fn formula(formula: impl Into<String>) -> Self {
        let formula = formula.into();
        let formula = match formula.strip_prefix('=') {
            Some(stripped) => stripped.to_string(),
            None => formula,
        };
        CellValue::Formula {
            formula,
            cached_value: None,
        }
    }

    /// Check if the cell is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the cell contains a formula.
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// The value a values-only reader sees: formulas collapse to their
    /// cached result, or to `Empty` when never evaluated.
    pub fn into_value(self) -> CellValue {
        match self {
            CellValue::Formula { cached_value, .. } => match cached_value {
                Some(cached) => cached.into_value(),
                None => CellValue::Empty,
            },
            other => other,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i64::from(i))
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}
