//! XLSX package reader.
//!
//! Locates the workbook part, resolves each `<sheet>` to its worksheet part
//! through the workbook relationships, then parses shared strings and cells.

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;
use zip::result::ZipError;

use super::shared_strings::SharedStrings;
use super::worksheet::{attribute, parse_worksheet};
use crate::common::{Error, Result};
use crate::sheet::{Workbook, Worksheet};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// A `<sheet>` entry of workbook.xml.
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    relationship_id: Option<String>,
}

/// What workbook.xml tells us about the sheets.
#[derive(Debug, Default)]
struct WorkbookInfo {
    sheets: Vec<SheetEntry>,
    active_tab: usize,
}

/// Read a workbook from a ZIP package.
pub(crate) fn read_package<R: Read + Seek>(mut archive: ZipArchive<R>) -> Result<Workbook> {
    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?.ok_or_else(|| {
        Error::InvalidFormat(format!("package has no {} part", WORKBOOK_PART))
    })?;
    let info = parse_workbook_info(&workbook_xml)?;

    let relationships = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => Relationships::default(),
    };

    let shared_strings_part = relationships
        .shared_strings
        .clone()
        .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
    let shared_strings = match read_part(&mut archive, &shared_strings_part)? {
        Some(xml) => SharedStrings::parse(&xml)?,
        None => SharedStrings::default(),
    };

    let mut sheets = Vec::with_capacity(info.sheets.len());
    for (index, entry) in info.sheets.iter().enumerate() {
        let part = entry
            .relationship_id
            .as_ref()
            .and_then(|rid| relationships.targets.get(rid).cloned())
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let mut ws = Worksheet::new(entry.name.clone());
        match read_part(&mut archive, &part)? {
            Some(xml) => parse_worksheet(&xml, &shared_strings, &mut ws)?,
            None => tracing::warn!(sheet = %entry.name, part = %part, "worksheet part missing, loading it empty"),
        }
        sheets.push(ws);
    }

    Ok(Workbook::from_parts(sheets, info.active_tab))
}

/// Read a part as UTF-8 text, `None` if the package does not contain it.
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut bytes)?;
    Ok(Some(String::from_utf8(bytes)?))
}

fn parse_workbook_info(content: &str) -> Result<WorkbookInfo> {
    let mut reader = Reader::from_reader(content.as_bytes());
    let mut buf = Vec::new();
    let mut info = WorkbookInfo::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attribute(e, b"name")?.ok_or_else(|| {
                        Error::InvalidFormat("<sheet> without a name".to_string())
                    })?;
                    info.sheets.push(SheetEntry {
                        name,
                        relationship_id: attribute(e, b"id")?,
                    });
                },
                b"workbookView" => {
                    if let Some(tab) = attribute(e, b"activeTab")? {
                        info.active_tab = atoi_simd::parse::<usize, false, false>(tab.as_bytes()).unwrap_or(0);
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok(info)
}

/// Relationship targets of the workbook part, resolved to package paths.
#[derive(Debug, Default)]
struct Relationships {
    targets: HashMap<String, String>,
    shared_strings: Option<String>,
}

fn parse_relationships(content: &str) -> Result<Relationships> {
    let mut reader = Reader::from_reader(content.as_bytes());
    let mut buf = Vec::new();
    let mut rels = Relationships::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id")?, attribute(e, b"Target")?) {
                    let target = resolve_target(&target);
                    if attribute(e, b"Type")?.is_some_and(|t| t.ends_with("/sharedStrings")) {
                        rels.shared_strings = Some(target.clone());
                    }
                    rels.targets.insert(id, target);
                }
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok(rels)
}

/// Resolve a relationship target relative to `xl/`.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => {
            let mut parts: Vec<&str> = vec!["xl"];
            for segment in target.split('/') {
                match segment {
                    "" | "." => {},
                    ".." => {
                        parts.pop();
                    },
                    other => parts.push(other),
                }
            }
            parts.join("/")
        },
    }
}
