//! Worksheet part parsing.
//!
//! Reads `<sheetData>` from a worksheet part into a [`Worksheet`]. Everything
//! outside cell values and formulas (styles, merges, views) is ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::shared_strings::SharedStrings;
use crate::common::xml::{escape_xml, unescape_xml};
use crate::common::{Error, Result};
use crate::sheet::{CellValue, Worksheet, reference_to_coords};

/// Which child of `<c>` text is being collected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Value,
    Formula,
    InlineText,
}

/// Cell being assembled while its children are read.
#[derive(Debug, Default)]
struct PendingCell {
    row: u32,
    col: u32,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
    inline: Option<String>,
}

/// Parse worksheet XML into `ws`.
pub(crate) fn parse_worksheet(
    content: &str,
    shared_strings: &SharedStrings,
    ws: &mut Worksheet,
) -> Result<()> {
    let mut reader = Reader::from_reader(content.as_bytes());
    let mut buf = Vec::new();

    let mut current_row = 0u32;
    let mut last_col = 0u32;
    let mut cell: Option<PendingCell> = None;
    let mut capture = Capture::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"row" => start_row(e, &mut current_row, &mut last_col)?,
                b"c" => cell = Some(start_cell(e, current_row, &mut last_col)?),
                b"v" if cell.is_some() => begin(&mut capture, &mut text, Capture::Value),
                b"f" if cell.is_some() => begin(&mut capture, &mut text, Capture::Formula),
                b"t" if cell.is_some() => begin(&mut capture, &mut text, Capture::InlineText),
                _ => {},
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"row" => start_row(e, &mut current_row, &mut last_col)?,
                // A self-closing cell only carries a style; it has no value
                b"c" => {
                    start_cell(e, current_row, &mut last_col)?;
                },
                _ => {},
            },
            Event::Text(ref t) if capture != Capture::None => {
                text.push_str(&String::from_utf8_lossy(t));
            },
            Event::GeneralRef(ref r) if capture != Capture::None => {
                text.push('&');
                text.push_str(&String::from_utf8_lossy(r));
                text.push(';');
            },
            Event::CData(ref c) if capture != Capture::None => {
                text.push_str(&escape_xml(&String::from_utf8_lossy(c)));
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"f" | b"t" if capture != Capture::None => {
                    let value = unescape_xml(&std::mem::take(&mut text));
                    if let Some(pending) = cell.as_mut() {
                        match capture {
                            Capture::Value => pending.value = Some(value),
                            Capture::Formula => pending.formula = Some(value),
                            Capture::InlineText => {
                                pending.inline.get_or_insert_with(String::new).push_str(&value)
                            },
                            Capture::None => {},
                        }
                    }
                    capture = Capture::None;
                },
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let (row, col) = (pending.row, pending.col);
                        let value = finish_cell(pending, shared_strings)?;
                        ws.set_cell_at(row, col, value)?;
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok(())
}

fn begin(capture: &mut Capture, text: &mut String, what: Capture) {
    *capture = what;
    text.clear();
}

/// Find an attribute by local name and return its unescaped value.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Xml(err.to_string()))?;
        if attr.key.local_name().as_ref() == name {
            let raw = String::from_utf8(attr.value.to_vec())?;
            return Ok(Some(unescape_xml(&raw)));
        }
    }
    Ok(None)
}

fn start_row(e: &BytesStart<'_>, current_row: &mut u32, last_col: &mut u32) -> Result<()> {
    *current_row = match attribute(e, b"r")? {
        Some(r) => r
            .parse::<u32>()
            .map_err(|_| Error::InvalidFormat(format!("invalid row number '{}'", r)))?,
        None => *current_row + 1,
    };
    *last_col = 0;
    Ok(())
}

fn start_cell(e: &BytesStart<'_>, current_row: u32, last_col: &mut u32) -> Result<PendingCell> {
    // Cells without `r` follow the previous cell in the same row
    let (row, col) = match attribute(e, b"r")? {
        Some(reference) => reference_to_coords(&reference)
            .map_err(|_| Error::InvalidFormat(format!("invalid cell reference '{}'", reference)))?,
        None => (current_row.max(1), *last_col + 1),
    };
    *last_col = col;

    Ok(PendingCell {
        row,
        col,
        cell_type: attribute(e, b"t")?,
        ..PendingCell::default()
    })
}

/// Turn the collected pieces of a `<c>` element into a value.
fn finish_cell(pending: PendingCell, shared_strings: &SharedStrings) -> Result<CellValue> {
    let PendingCell {
        cell_type,
        value,
        formula,
        inline,
        ..
    } = pending;

    let value = match (cell_type.as_deref(), value) {
        (Some("inlineStr"), _) => inline.map(CellValue::String).unwrap_or(CellValue::Empty),
        (_, None) => CellValue::Empty,
        (Some("s"), Some(v)) => {
            let index = v
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidFormat(format!("invalid shared string index '{}'", v)))?;
            let s = shared_strings.get(index).ok_or_else(|| {
                Error::InvalidFormat(format!("shared string index {} out of range", index))
            })?;
            CellValue::String(s.to_string())
        },
        (Some("str") | Some("d"), Some(v)) => CellValue::String(v),
        (Some("b"), Some(v)) => match v.trim() {
            "1" | "true" => CellValue::Bool(true),
            "0" | "false" => CellValue::Bool(false),
            _ => CellValue::Error(format!("invalid boolean '{}'", v)),
        },
        (Some("e"), Some(v)) => CellValue::Error(v),
        (_, Some(v)) => parse_number(&v),
    };

    Ok(match formula {
        Some(formula) if !formula.is_empty() => CellValue::Formula {
            formula,
            cached_value: (!value.is_empty()).then(|| Box::new(value)),
        },
        _ => value,
    })
}

fn parse_number(v: &str) -> CellValue {
    let v = v.trim();
    if let Ok(int_val) = atoi_simd::parse::<i64, false, false>(v.as_bytes()) {
        CellValue::Int(int_val)
    } else if let Ok(float_val) = fast_float2::parse::<f64, _>(v) {
        CellValue::Float(float_val)
    } else {
        CellValue::String(v.to_string())
    }
}
