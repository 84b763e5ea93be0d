//! In-memory document with grouped undo/redo
//!
//! Edits are addressed by character ranges. Every mutation bumps the
//! document version; edits made between `begin_group` and `end_group` undo
//! as a single step.

use prosefix_core::{byte_range, char_len, slice_chars, TextRange};
use tracing::error;
use uuid::Uuid;

/// Default undo depth
pub const DEFAULT_MAX_UNDO: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Range {range} is outside the document ({len} characters)")]
    OutOfBounds { range: TextRange, len: usize },

    #[error("Text at {range} is '{found}', expected '{expected}'")]
    Mismatch {
        range: TextRange,
        expected: String,
        found: String,
    },
}

/// One replacement, recorded with enough text to revert it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub removed: String,
    pub inserted: String,
}

impl Edit {
    pub fn removed_len(&self) -> usize {
        char_len(&self.removed)
    }

    pub fn inserted_len(&self) -> usize {
        char_len(&self.inserted)
    }

    /// Range the edit occupies after it was applied
    pub fn applied_range(&self) -> TextRange {
        TextRange::new(self.start, self.start + self.inserted_len())
    }

    /// Range the edit occupied before it was applied
    pub fn original_range(&self) -> TextRange {
        TextRange::new(self.start, self.start + self.removed_len())
    }
}

/// Which correction changes an undo step belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTag {
    pub message_id: Uuid,
    pub changes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub edits: Vec<Edit>,
    pub tag: Option<EditTag>,
}

#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    text: String,
    version: u64,
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    max_undo: usize,
    open_group: Option<Vec<Edit>>,
    clean_version: u64,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            version: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo: DEFAULT_MAX_UNDO,
            open_group: None,
            clean_version: 0,
        }
    }

    pub fn with_max_undo(mut self, max_undo: usize) -> Self {
        self.max_undo = max_undo.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }

    pub fn slice(&self, range: TextRange) -> Option<&str> {
        slice_chars(&self.text, range)
    }

    /// Whether the text changed since the last `mark_clean`
    pub fn is_dirty(&self) -> bool {
        self.version != self.clean_version
    }

    pub fn mark_clean(&mut self) {
        self.clean_version = self.version;
    }

    /// Replace the whole text and drop the history
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.version += 1;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_group = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Replace `range` with `text`
    pub fn replace(&mut self, range: TextRange, text: &str) -> Result<Edit, DocumentError> {
        let edit = self.splice(range, text)?;
        self.record(edit.clone());
        Ok(edit)
    }

    /// Replace `range` with `text` only if it currently reads `expected`
    pub fn replace_verified(
        &mut self,
        range: TextRange,
        expected: &str,
        text: &str,
    ) -> Result<Edit, DocumentError> {
        let found = self.slice(range).ok_or(DocumentError::OutOfBounds {
            range,
            len: self.char_len(),
        })?;
        if found != expected {
            return Err(DocumentError::Mismatch {
                range,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        self.replace(range, text)
    }

    /// Start collecting edits into one undo step
    pub fn begin_group(&mut self) {
        if self.open_group.is_none() {
            self.open_group = Some(Vec::new());
        }
    }

    /// Close the open group. Returns false if it recorded no edits.
    pub fn end_group(&mut self, tag: Option<EditTag>) -> bool {
        match self.open_group.take() {
            Some(edits) if !edits.is_empty() => {
                self.push_step(UndoStep { edits, tag });
                true
            }
            _ => false,
        }
    }

    /// Revert the most recent step
    pub fn undo(&mut self) -> Option<UndoStep> {
        self.open_group = None;
        let step = self.undo_stack.pop()?;
        for edit in step.edits.iter().rev() {
            self.restore(edit.applied_range(), &edit.removed);
        }
        self.redo_stack.push(step.clone());
        Some(step)
    }

    /// Re-apply the most recently undone step
    pub fn redo(&mut self) -> Option<UndoStep> {
        self.open_group = None;
        let step = self.redo_stack.pop()?;
        for edit in &step.edits {
            self.restore(edit.original_range(), &edit.inserted);
        }
        self.undo_stack.push(step.clone());
        Some(step)
    }

    fn splice(&mut self, range: TextRange, text: &str) -> Result<Edit, DocumentError> {
        let bytes = byte_range(&self.text, range).ok_or(DocumentError::OutOfBounds {
            range,
            len: self.char_len(),
        })?;
        let removed = self.text[bytes.clone()].to_string();
        self.text.replace_range(bytes, text);
        self.version += 1;
        Ok(Edit {
            start: range.start,
            removed,
            inserted: text.to_string(),
        })
    }

    fn restore(&mut self, range: TextRange, text: &str) {
        // Inverse edits stay in bounds unless the history is corrupt.
        if let Some(bytes) = byte_range(&self.text, range) {
            self.text.replace_range(bytes, text);
            self.version += 1;
        } else {
            error!(document = %self.id, range = %range, "undo history out of sync");
        }
    }

    fn record(&mut self, edit: Edit) {
        match self.open_group.as_mut() {
            Some(group) => group.push(edit),
            None => self.push_step(UndoStep {
                edits: vec![edit],
                tag: None,
            }),
        }
    }

    fn push_step(&mut self, step: UndoStep) {
        self.redo_stack.clear();
        if self.undo_stack.len() >= self.max_undo {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_undo_redo() {
        let mut doc = Document::new("d", "Teh cat sat");
        doc.replace(TextRange::new(0, 3), "The").unwrap();
        assert_eq!(doc.text(), "The cat sat");
        assert!(doc.is_dirty());

        doc.undo().unwrap();
        assert_eq!(doc.text(), "Teh cat sat");
        doc.redo().unwrap();
        assert_eq!(doc.text(), "The cat sat");
        assert!(doc.redo().is_none());
    }

    #[test]
    fn test_group_is_one_step() {
        let mut doc = Document::new("d", "aa bb cc");
        doc.begin_group();
        doc.replace(TextRange::new(0, 2), "AAA").unwrap();
        doc.replace(TextRange::new(7, 9), "C").unwrap();
        assert!(doc.end_group(None));
        assert_eq!(doc.text(), "AAA bb C");
        assert_eq!(doc.undo_depth(), 1);

        doc.undo().unwrap();
        assert_eq!(doc.text(), "aa bb cc");
    }

    #[test]
    fn test_empty_group_records_nothing() {
        let mut doc = Document::new("d", "x");
        doc.begin_group();
        assert!(!doc.end_group(None));
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_replace_verified_mismatch_leaves_text() {
        let mut doc = Document::new("d", "héllo world");
        let err = doc
            .replace_verified(TextRange::new(0, 5), "hello", "Hello")
            .unwrap_err();
        assert!(matches!(err, DocumentError::Mismatch { .. }));
        assert_eq!(doc.text(), "héllo world");
        assert_eq!(doc.version(), 0);

        doc.replace_verified(TextRange::new(0, 5), "héllo", "Hello")
            .unwrap();
        assert_eq!(doc.text(), "Hello world");
    }

    #[test]
    fn test_out_of_bounds() {
        let mut doc = Document::new("d", "abc");
        assert_eq!(
            doc.replace(TextRange::new(2, 5), "x").unwrap_err(),
            DocumentError::OutOfBounds {
                range: TextRange::new(2, 5),
                len: 3
            }
        );
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut doc = Document::new("d", "abc");
        doc.replace(TextRange::new(0, 1), "A").unwrap();
        doc.undo();
        doc.replace(TextRange::new(1, 2), "B").unwrap();
        assert!(!doc.can_redo());
    }
}
