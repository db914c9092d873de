//! A1-style cell references.
//!
//! Rows and columns are 1-based everywhere in this crate; coordinate pairs
//! are `(row, column)`.

use crate::common::{Error, Result};

/// Largest column SpreadsheetML allows (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row SpreadsheetML allows.
pub const MAX_ROW: u32 = 1_048_576;

/// Convert column number to Excel column letters (e.g., 1 -> "A", 26 -> "Z", 27 -> "AA").
pub fn column_to_letters(col: u32) -> String {
    let mut letters = Vec::with_capacity(3);
    let mut col = col;

    while col > 0 {
        col -= 1;
        letters.push((col % 26) as u8 + b'A');
        col /= 26;
    }

    letters.reverse();
    // Only ASCII uppercase letters were pushed
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert Excel column letters to a column number (e.g., "A" -> 1, "AA" -> 27).
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidReference(letters.to_string()));
    }

    let mut col = 0u32;
    for byte in letters.bytes() {
        if !byte.is_ascii_alphabetic() {
            return Err(Error::InvalidReference(letters.to_string()));
        }
        col = col * 26 + u32::from(byte.to_ascii_uppercase() - b'A' + 1);
        if col > MAX_COLUMN {
            return Err(Error::InvalidReference(letters.to_string()));
        }
    }

    Ok(col)
}

/// Convert Excel reference (e.g., "B3") to `(row, column)`.
///
/// `$` anchors are accepted and ignored.
pub fn reference_to_coords(reference: &str) -> Result<(u32, u32)> {
    let cleaned: String = reference.chars().filter(|&c| c != '$').collect();
    let bytes = cleaned.as_bytes();

    let split = bytes
        .iter()
        .position(|b| b.is_ascii_digit())
        .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
    if split == 0 {
        return Err(Error::InvalidReference(reference.to_string()));
    }

    let col = letters_to_column(&cleaned[..split])
        .map_err(|_| Error::InvalidReference(reference.to_string()))?;
    let row = cleaned[split..]
        .parse::<u32>()
        .map_err(|_| Error::InvalidReference(reference.to_string()))?;
    if row == 0 || row > MAX_ROW {
        return Err(Error::InvalidReference(reference.to_string()));
    }

    Ok((row, col))
}

/// Convert `(row, column)` to an Excel reference (e.g., (3, 2) -> "B3").
pub fn coords_to_reference(row: u32, col: u32) -> String {
    let mut reference = column_to_letters(col);
    reference.push_str(itoa::Buffer::new().format(row));
    reference
}
