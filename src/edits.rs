//! Byte-range edit buffer for rewriting emitted files in a single pass.

use crate::errors::{LibpackError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Collected `(start, end, replacement)` edits against one source text.
///
/// Edits are applied from the highest offset down, so earlier offsets stay
/// valid regardless of the order edits were recorded in.
#[derive(Debug, Clone, Default)]
pub struct SourceEdits {
    edits: Vec<Edit>,
}

impl SourceEdits {
    pub fn new() -> Self {
        Self::default()
    }

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

    /// Apply every edit to `source`. Overlapping or out-of-range edits are an internal error.
    pub fn apply(mut self, source: &str) -> Result<String> {
        self.edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

        let mut out = source.to_string();
        let mut limit = source.len();
        for edit in &self.edits {
            if edit.start > edit.end || edit.end > limit {
                return Err(LibpackError::internal(format!(
                    "overlapping or out-of-range edit {}..{}",
                    edit.start, edit.end
                )));
            }
            if !source.is_char_boundary(edit.start) || !source.is_char_boundary(edit.end) {
                return Err(LibpackError::internal(format!(
                    "edit {}..{} splits a character",
                    edit.start, edit.end
                )));
            }
            out.replace_range(edit.start..edit.end, &edit.replacement);
            limit = edit.start;
        }
        Ok(out)
    }
}
