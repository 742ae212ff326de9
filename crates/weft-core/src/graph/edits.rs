//! Byte-range text replacement.
//!
//! Specifier rewrites are discovered out of order (some only after network
//! round trips) but all name ranges in the original text. Collecting them
//! here and splicing in a single pass avoids ever recomputing offsets
//! against partially edited text.

use tracing::warn;

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// An accumulating list of non-overlapping byte-range replacements.
///
/// Ranges are half-open byte offsets into the original text. Edits may be
/// recorded in any order; [`TextEdits::apply`] sorts them and produces the
/// final text in one pass.
#[derive(Debug, Default)]
pub struct TextEdits {
    edits: Vec<Edit>,
}

impl TextEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a replacement of `original[start..end]`.
    pub fn replace(&mut self, start: usize, end: usize, replacement: impl Into<String>) {
        self.edits.push(Edit {
            start,
            end,
            replacement: replacement.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Apply all recorded edits to `original`.
    ///
    /// Edits are sorted by start offset. An edit that overlaps the previous
    /// one, falls outside the text, or splits a UTF-8 character is skipped
    /// with a warning rather than corrupting the output.
    pub fn apply(mut self, original: &str) -> String {
        self.edits.sort_by_key(|e| (e.start, e.end));

        let mut out = String::with_capacity(original.len());
        let mut cursor = 0usize;
        for edit in &self.edits {
            if edit.start < cursor
                || edit.end < edit.start
                || edit.end > original.len()
                || !original.is_char_boundary(edit.start)
                || !original.is_char_boundary(edit.end)
            {
                warn!(
                    start = edit.start,
                    end = edit.end,
                    replacement = %edit.replacement,
                    "skipping conflicting text edit"
                );
                continue;
            }
            out.push_str(&original[cursor..edit.start]);
            out.push_str(&edit.replacement);
            cursor = edit.end;
        }
        out.push_str(&original[cursor..]);
        out
    }
}
