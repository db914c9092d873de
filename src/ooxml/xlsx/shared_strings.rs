//! Shared strings table for Excel files.
//!
//! Excel uses a shared strings table to efficiently store string values.
//! Cells with `t="s"` hold an index into this table.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::common::Result;
use crate::common::xml::unescape_xml;

/// Shared strings table, parsed from `xl/sharedStrings.xml`.
#[derive(Debug, Default)]
pub(crate) struct SharedStrings {
    strings: Vec<String>,
}

impl SharedStrings {
    /// Parse shared strings from xl/sharedStrings.xml content.
    ///
    /// Rich text items (`<si><r><t>..</t></r>...</si>`) are flattened to their
    /// plain text; phonetic runs (`<rPh>`) are skipped.
    pub(crate) fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_reader(content.as_bytes());
        let mut buf = Vec::new();
        let mut strings = Vec::new();

        let mut current: Option<String> = None;
        let mut in_text = false;
        let mut phonetic_depth = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"si" => current = Some(String::new()),
                    b"rPh" => phonetic_depth += 1,
                    b"t" => in_text = phonetic_depth == 0,
                    _ => {},
                },
                Event::Empty(ref e) => {
                    if e.local_name().as_ref() == b"si" {
                        strings.push(String::new());
                    }
                },
                Event::Text(ref t) if in_text => {
                    if let Some(s) = current.as_mut() {
                        s.push_str(&String::from_utf8_lossy(t));
                    }
                },
                Event::GeneralRef(ref r) if in_text => {
                    if let Some(s) = current.as_mut() {
                        s.push('&');
                        s.push_str(&String::from_utf8_lossy(r));
                        s.push(';');
                    }
                },
                Event::CData(ref c) if in_text => {
                    if let Some(s) = current.as_mut() {
                        // CDATA is literal; pre-escape so the final unescape is a no-op on it
                        s.push_str(&crate::common::xml::escape_xml(&String::from_utf8_lossy(c)));
                    }
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"si" => {
                        if let Some(raw) = current.take() {
                            strings.push(unescape_xml(&raw));
                        }
                    },
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_text = false,
                    _ => {},
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(SharedStrings { strings })
    }

    /// Get a string by its index.
    pub(crate) fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|s| s.as_str())
    }

    /// Get the number of strings in the table.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }
}
