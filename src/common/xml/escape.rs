use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("static escape patterns are valid")
});

// `&#` starts a numeric character reference; it is decoded by hand
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;", "&#"])
        .expect("static unescape patterns are valid")
});

const NAMED_ENTITY_CHARS: [char; 5] = ['&', '<', '>', '"', '\''];

/// Escape XML special characters for text and attribute content.
///
/// # Examples
///
/// ```
/// use sheetcache::common::xml::escape_xml;
/// assert_eq!(escape_xml("Q1 & Q2"), "Q1 &amp; Q2");
/// assert_eq!(escape_xml("=A1<B1"), "=A1&lt;B1");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Unescape the five predefined XML entities plus numeric character
/// references (`&#10;`, `&#x41;`).
///
/// Decoding is a single left-to-right pass, so `&amp;#65;` becomes `&#65;`
/// and `&amp;lt;` becomes `&lt;`. Unknown or malformed entities are left
/// unchanged.
pub fn unescape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    while let Some(m) = XML_UNESCAPER.find(&s[pos..]) {
        let start = pos + m.start();
        let end = pos + m.end();
        out.push_str(&s[pos..start]);
        match NAMED_ENTITY_CHARS.get(m.pattern().as_usize()) {
            Some(&ch) => {
                out.push(ch);
                pos = end;
            },
            None => match decode_char_ref(&s[end..]) {
                Some((ch, len)) => {
                    out.push(ch);
                    pos = end + len;
                },
                None => {
                    out.push_str("&#");
                    pos = end;
                },
            },
        }
    }
    out.push_str(&s[pos..]);
    out
}

/// Decode the body of a character reference following `&#`. Returns the
/// character and the number of bytes consumed, including the `;`.
fn decode_char_ref(tail: &str) -> Option<(char, usize)> {
    let end = tail.find(';')?;
    let body = &tail[..end];
    let code = match body.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u32>().ok()?,
    };
    char::from_u32(code).map(|ch| (ch, end + 1))
}
