/// Package-level parts for XLSX: workbook, relationships, content types.
use std::fmt::Write as FmtWrite;

use crate::common::Result;
use crate::common::xml::escape_xml;
use crate::sheet::Workbook;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Relationship type for worksheets.
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
/// Relationship type for the shared strings table.
const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
/// Relationship type for the main document part.
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// Part name of worksheet `index` (0-based).
pub(crate) fn worksheet_part_name(index: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", index + 1)
}

/// Generate workbook.xml content.
///
/// Worksheet `i` is related as `rId{i+1}`; see [`workbook_rels_xml`].
pub(crate) fn workbook_xml(workbook: &Workbook) -> Result<String> {
    let mut xml = String::with_capacity(512 + workbook.worksheet_count() * 64);

    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    );
    xml.push_str(
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    );

    write!(
        xml,
        r#"<bookViews><workbookView activeTab="{}"/></bookViews>"#,
        workbook.active_sheet_index()
    )?;

    xml.push_str("<sheets>");
    for (index, ws) in workbook.worksheets().enumerate() {
        write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(ws.name()),
            index + 1,
            index + 1
        )?;
    }
    xml.push_str("</sheets>");

    xml.push_str("</workbook>");
    Ok(xml)
}

/// Generate xl/_rels/workbook.xml.rels.
pub(crate) fn workbook_rels_xml(sheet_count: usize) -> Result<String> {
    let mut xml = String::with_capacity(256 + sheet_count * 160);

    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for index in 0..sheet_count {
        write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{}" Target="worksheets/sheet{}.xml"/>"#,
            index + 1,
            REL_WORKSHEET,
            index + 1
        )?;
    }
    write!(
        xml,
        r#"<Relationship Id="rId{}" Type="{}" Target="sharedStrings.xml"/>"#,
        sheet_count + 1,
        REL_SHARED_STRINGS
    )?;
    xml.push_str("</Relationships>");
    Ok(xml)
}

/// Generate _rels/.rels.
pub(crate) fn root_rels_xml() -> Result<String> {
    let mut xml = String::with_capacity(320);
    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    write!(
        xml,
        r#"<Relationship Id="rId1" Type="{}" Target="xl/workbook.xml"/>"#,
        REL_OFFICE_DOCUMENT
    )?;
    xml.push_str("</Relationships>");
    Ok(xml)
}

/// Generate [Content_Types].xml.
pub(crate) fn content_types_xml(sheet_count: usize) -> Result<String> {
    let mut xml = String::with_capacity(768 + sheet_count * 160);
    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    );
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    for index in 0..sheet_count {
        write!(
            xml,
            r#"<Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            worksheet_part_name(index)
        )?;
    }
    xml.push_str(
        r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
    );
    xml.push_str("</Types>");
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workbook_xml_lists_sheets_in_order() {
        let mut wb = Workbook::new();
        wb.add_worksheet("P&L").unwrap();
        wb.set_active("P&L").unwrap();

        let xml = workbook_xml(&wb).unwrap();
        assert!(xml.contains(r#"<workbookView activeTab="1"/>"#));
        assert!(xml.contains(r#"<sheet name="Sheet1" sheetId="1" r:id="rId1"/>"#));
        assert!(xml.contains(r#"<sheet name="P&amp;L" sheetId="2" r:id="rId2"/>"#));
    }

    #[test]
    fn test_rels_and_content_types_cover_every_sheet() {
        let rels = workbook_rels_xml(2).unwrap();
        assert!(rels.contains(r#"Id="rId2""#));
        assert!(rels.contains(r#"Target="worksheets/sheet2.xml""#));
        assert!(rels.contains(r#"Id="rId3""#));
        assert!(rels.contains("sharedStrings.xml"));

        let types = content_types_xml(2).unwrap();
        assert!(types.contains(r#"PartName="/xl/worksheets/sheet1.xml""#));
        assert!(types.contains(r#"PartName="/xl/worksheets/sheet2.xml""#));
        assert!(root_rels_xml().unwrap().contains(r#"Target="xl/workbook.xml""#));
    }
}
