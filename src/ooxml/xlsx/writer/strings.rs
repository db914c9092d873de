//! Shared string table built while worksheets are serialized.
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;

use crate::common::Result;
use crate::common::xml::escape_xml;

/// Interned string cell values, indexed in first-use order.
#[derive(Debug, Default)]
pub(crate) struct SharedStringTable {
    index: HashMap<String, usize>,
    /// Every `intern` call, duplicates included (the `count` attribute)
    uses: usize,
}

impl SharedStringTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Index of `s` in the table, adding it on first use.
    pub(crate) fn intern(&mut self, s: &str) -> usize {
        self.uses += 1;
        let next = self.index.len();
        match self.index.get(s) {
            Some(&i) => i,
            None => {
                self.index.insert(s.to_owned(), next);
                next
            },
        }
    }

    /// Number of distinct strings.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// The `xl/sharedStrings.xml` part.
    pub(crate) fn to_xml(&self) -> Result<String> {
        let mut ordered: Vec<&str> = vec![""; self.index.len()];
        for (s, &i) in &self.index {
            ordered[i] = s.as_str();
        }

        let mut xml = String::with_capacity(160 + ordered.iter().map(|s| s.len() + 16).sum::<usize>());
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(
            xml,
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">"#,
            self.uses,
            ordered.len()
        )?;
        for s in ordered {
            // Excel trims surrounding whitespace unless told otherwise
            let space = if s.trim() != s { r#" xml:space="preserve""# } else { "" };
            write!(xml, "<si><t{}>{}</t></si>", space, escape_xml(s))?;
        }
        xml.push_str("</sst>");
        Ok(xml)
    }
}
