//! Textual scans for directives the parser does not surface.
//!
//! The JSX-import-source pragma lives in a comment and triple-slash
//! references are comments too, so both are located by scanning the raw
//! text. Every span is a byte range into the ORIGINAL text, suitable for
//! the edit list.

/// A scanned value and its byte span in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedValue {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

const JSX_PRAGMA: &str = "@jsxImportSource";

/// First JSX-import-source pragma value, if any.
pub(crate) fn jsx_import_source(text: &str) -> Option<ScannedValue> {
    let tag = text.find(JSX_PRAGMA)?;
    let bytes = text.as_bytes();
    let mut start = tag + JSX_PRAGMA.len();
    while start < bytes.len() && bytes[start].is_ascii_whitespace() {
        start += 1;
    }
    let mut end = start;
    // Multi-byte characters pass through: the loop only stops on ASCII.
    while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'*' {
        end += 1;
    }
    if end == start {
        return None;
    }
    Some(ScannedValue {
        start,
        end,
        value: text[start..end].to_string(),
    })
}

/// All `/// <reference path="..." />` targets.
pub(crate) fn reference_paths(text: &str) -> Vec<ScannedValue> {
    scan_references(text, "path")
}

/// All `/// <reference lib="..." />` names.
pub(crate) fn reference_libs(text: &str) -> Vec<ScannedValue> {
    scan_references(text, "lib")
}

fn scan_references(text: &str, attribute: &str) -> Vec<ScannedValue> {
    let mut found = Vec::new();
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("///")
            && !trimmed.starts_with("////")
            && let Some((start, end)) = attribute_value(line, attribute)
        {
            found.push(ScannedValue {
                start: line_start + start,
                end: line_start + end,
                value: line[start..end].to_string(),
            });
        }
        line_start += line.len();
    }
    found
}

/// Byte span of a quoted attribute value within one directive line.
fn attribute_value(line: &str, attribute: &str) -> Option<(usize, usize)> {
    let open = line.find("<reference")?;
    let bytes = line.as_bytes();
    let mut at = open + "<reference".len();
    while let Some(found) = line.get(at..)?.find(attribute) {
        let name_start = at + found;
        at = name_start + attribute.len();
        // Boundary check so `lib=` never matches inside `no-default-lib=`.
        if !bytes[name_start - 1].is_ascii_whitespace() {
            continue;
        }
        let mut i = at;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
            continue;
        }
        let quote = bytes[i] as char;
        let value_start = i + 1;
        let close = line[value_start..].find(quote)?;
        return Some((value_start, value_start + close));
    }
    None
}
