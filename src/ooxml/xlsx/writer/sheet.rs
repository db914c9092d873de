/// Worksheet XML generation.
use std::fmt::{self, Write as FmtWrite};

use super::strings::SharedStringTable;
use crate::common::Result;
use crate::common::xml::escape_xml;
use crate::sheet::{CellValue, Worksheet, coords_to_reference};

const WORKSHEET_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
);

/// Generate `xl/worksheets/sheetN.xml` for one worksheet.
pub(crate) fn worksheet_xml(
    ws: &Worksheet,
    is_active: bool,
    shared_strings: &mut SharedStringTable,
) -> Result<String> {
    let mut xml = String::with_capacity(1024 + ws.cell_count() * 48);
    xml.push_str(WORKSHEET_OPEN);

    match ws.dimensions() {
        Some((min_row, min_col, max_row, max_col)) => write!(
            xml,
            r#"<dimension ref="{}:{}"/>"#,
            coords_to_reference(min_row, min_col),
            coords_to_reference(max_row, max_col)
        )?,
        None => xml.push_str(r#"<dimension ref="A1"/>"#),
    }

    xml.push_str("<sheetViews><sheetView workbookViewId=\"0\"");
    if is_active {
        xml.push_str(" tabSelected=\"1\"");
    }
    xml.push_str("/></sheetViews>");
    xml.push_str("<sheetFormatPr defaultRowHeight=\"15\"/>");

    xml.push_str("<sheetData>");
    let mut current_row = None;
    for ((row, col), value) in ws.cells() {
        if current_row != Some(row) {
            if current_row.is_some() {
                xml.push_str("</row>");
            }
            write!(xml, r#"<row r="{}">"#, row)?;
            current_row = Some(row);
        }
        write_cell(&mut xml, &coords_to_reference(row, col), value, shared_strings)?;
    }
    if current_row.is_some() {
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    xml.push_str(
        r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    );
    xml.push_str("</worksheet>");
    Ok(xml)
}

/// Write a single cell to XML.
///
/// `DateTime` is written as its serial number. No date style is emitted, so
/// it loads back as a `Float` with the same value.
fn write_cell(
    xml: &mut String,
    cell_ref: &str,
    value: &CellValue,
    shared_strings: &mut SharedStringTable,
) -> fmt::Result {
    match value {
        CellValue::Empty => Ok(()),
        CellValue::String(s) => {
            let string_index = shared_strings.intern(s);
            write!(xml, r#"<c r="{}" t="s"><v>{}</v></c>"#, cell_ref, string_index)
        },
        CellValue::Int(i) => write!(
            xml,
            r#"<c r="{}"><v>{}</v></c>"#,
            cell_ref,
            itoa::Buffer::new().format(*i)
        ),
        CellValue::Float(f) | CellValue::DateTime(f) => write_number(xml, cell_ref, *f),
        CellValue::Bool(b) => write!(
            xml,
            r#"<c r="{}" t="b"><v>{}</v></c>"#,
            cell_ref,
            if *b { "1" } else { "0" }
        ),
        CellValue::Error(e) => {
            write!(xml, r#"<c r="{}" t="e"><v>{}</v></c>"#, cell_ref, escape_xml(e))
        },
        CellValue::Formula {
            formula,
            cached_value,
        } => write_formula(xml, cell_ref, formula, cached_value.as_deref()),
    }
}

fn write_number(xml: &mut String, cell_ref: &str, f: f64) -> fmt::Result {
    if f.is_finite() {
        write!(
            xml,
            r#"<c r="{}"><v>{}</v></c>"#,
            cell_ref,
            ryu::Buffer::new().format_finite(f)
        )
    } else {
        write!(xml, r##"<c r="{}" t="e"><v>#NUM!</v></c>"##, cell_ref)
    }
}

fn write_formula(
    xml: &mut String,
    cell_ref: &str,
    formula: &str,
    cached: Option<&CellValue>,
) -> fmt::Result {
    let formula = escape_xml(formula);
    match cached {
        Some(CellValue::String(s)) => write!(
            xml,
            r#"<c r="{}" t="str"><f>{}</f><v>{}</v></c>"#,
            cell_ref,
            formula,
            escape_xml(s)
        ),
        Some(CellValue::Bool(b)) => write!(
            xml,
            r#"<c r="{}" t="b"><f>{}</f><v>{}</v></c>"#,
            cell_ref,
            formula,
            if *b { "1" } else { "0" }
        ),
        Some(CellValue::Error(e)) => write!(
            xml,
            r#"<c r="{}" t="e"><f>{}</f><v>{}</v></c>"#,
            cell_ref,
            formula,
            escape_xml(e)
        ),
        Some(CellValue::Int(i)) => write!(
            xml,
            r#"<c r="{}"><f>{}</f><v>{}</v></c>"#,
            cell_ref,
            formula,
            itoa::Buffer::new().format(*i)
        ),
        Some(CellValue::Float(f) | CellValue::DateTime(f)) if f.is_finite() => write!(
            xml,
            r#"<c r="{}"><f>{}</f><v>{}</v></c>"#,
            cell_ref,
            formula,
            ryu::Buffer::new().format_finite(*f)
        ),
        // Nested formulas and non-finite results are not representable
        _ => write!(xml, r#"<c r="{}"><f>{}</f></c>"#, cell_ref, formula),
    }
}
