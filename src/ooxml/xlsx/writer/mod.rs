//! XLSX writer.
//!
//! Serializes a [`Workbook`] into a SpreadsheetML package: one part per
//! worksheet, a shared strings table, and the relationship and content type
//! parts that tie them together.

mod sheet;
mod strings;
mod workbook;

use std::io::{Seek, Write};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::common::Result;
use crate::sheet::Workbook;

use sheet::worksheet_xml;
use strings::SharedStringTable;
use workbook::{
    content_types_xml, root_rels_xml, workbook_rels_xml, workbook_xml, worksheet_part_name,
};

/// Write `workbook` as a ZIP package into `writer`, returning the writer.
pub(crate) fn write_package<W: Write + Seek>(workbook: &Workbook, writer: W) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = zip::ZipWriter::new(writer);
    let sheet_count = workbook.worksheet_count();

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(sheet_count)?.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(root_rels_xml()?.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(workbook)?.as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(sheet_count)?.as_bytes())?;

    // Worksheets fill the shared strings table, so it is written last
    let mut shared_strings = SharedStringTable::new();
    let active = workbook.active_sheet_index();
    for (index, ws) in workbook.worksheets().enumerate() {
        let xml = worksheet_xml(ws, index == active, &mut shared_strings)?;
        zip.start_file(worksheet_part_name(index), options)?;
        zip.write_all(xml.as_bytes())?;
    }

    zip.start_file("xl/sharedStrings.xml", options)?;
    zip.write_all(shared_strings.to_xml()?.as_bytes())?;

    Ok(zip.finish()?)
}
