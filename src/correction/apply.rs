//! Applying corrections to text
//!
//! Response positions are offsets into the submitted text. Before anything
//! is replaced the live span is checked against `original`; a span that no
//! longer matches is refused rather than relocated.

use crate::chat::{ChangeStatus, CorrectionCard};
use crate::document::{Document, DocumentError, Edit};
use crate::llm::TextChange;
use prosefix_core::{byte_range, char_len, TextRange};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("Change at {range} is outside the text ({len} characters)")]
    OutOfBounds { range: TextRange, len: usize },

    #[error("Text at {range} changed since the correction was requested: expected '{expected}', found '{found}'")]
    Stale {
        range: TextRange,
        expected: String,
        found: String,
    },

    #[error("Change #{index} at {range} overlaps a change that was already applied")]
    Conflict { index: usize, range: TextRange },

    #[error("Change #{index} is already {status}")]
    NotPending { index: usize, status: String },

    #[error("No chat message with id {0}")]
    UnknownMessage(Uuid),

    #[error("Message {message} has no change #{index}")]
    UnknownChange { message: Uuid, index: usize },
}

impl From<DocumentError> for ApplyError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::OutOfBounds { range, len } => ApplyError::OutOfBounds { range, len },
            DocumentError::Mismatch {
                range,
                expected,
                found,
            } => ApplyError::Stale {
                range,
                expected,
                found,
            },
        }
    }
}

/// Replace exactly the change's span of `text` with `corrected`
pub fn apply_change(text: &str, change: &TextChange) -> Result<String, ApplyError> {
    let range = change.range();
    let bytes = byte_range(text, range).ok_or(ApplyError::OutOfBounds {
        range,
        len: char_len(text),
    })?;
    let found = &text[bytes.clone()];
    if found != change.original {
        return Err(ApplyError::Stale {
            range,
            expected: change.original.clone(),
            found: found.to_string(),
        });
    }

    let mut out = String::with_capacity(text.len() + change.corrected.len());
    out.push_str(&text[..bytes.start]);
    out.push_str(&change.corrected);
    out.push_str(&text[bytes.end..]);
    Ok(out)
}

/// Apply a set of non-overlapping changes, all or nothing
pub fn apply_changes(text: &str, changes: &[TextChange]) -> Result<String, ApplyError> {
    let mut ordered: Vec<(usize, &TextChange)> = changes.iter().enumerate().collect();
    ordered.sort_by_key(|(_, c)| c.range());

    for pair in ordered.windows(2) {
        let (_, prev) = pair[0];
        let (index, next) = pair[1];
        if prev.range().overlaps(&next.range()) {
            return Err(ApplyError::Conflict {
                index,
                range: next.range(),
            });
        }
    }

    // Descending start so earlier spans keep their offsets.
    let mut out = text.to_string();
    for (_, change) in ordered.into_iter().rev() {
        out = apply_change(&out, change)?;
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedSpan {
    index: usize,
    range: TextRange,
    delta: isize,
}

/// Changes of one card already written to the document
///
/// Later changes of the same card are shifted by the length deltas of the
/// applied changes that precede them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLedger {
    applied: Vec<AppliedSpan>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a submitted-text range to the current offset relative to the card base
    pub fn resolve(&self, index: usize, range: TextRange) -> Result<TextRange, ApplyError> {
        let mut shift: isize = 0;
        for span in &self.applied {
            if span.range.overlaps(&range)
                || (span.range.is_empty() && range.is_empty() && span.range.start == range.start)
            {
                return Err(ApplyError::Conflict { index, range });
            }
            if span.range.end <= range.start {
                shift += span.delta;
            }
        }

        let start = range.start as isize + shift;
        if start < 0 {
            return Err(ApplyError::Conflict { index, range });
        }
        let start = start as usize;
        Ok(TextRange::new(start, start + range.len()))
    }

    pub fn record(&mut self, index: usize, range: TextRange, inserted_len: usize) {
        self.forget(index);
        self.applied.push(AppliedSpan {
            index,
            range,
            delta: inserted_len as isize - range.len() as isize,
        });
    }

    pub fn forget(&mut self, index: usize) {
        self.applied.retain(|s| s.index != index);
    }

    pub fn is_applied(&self, index: usize) -> bool {
        self.applied.iter().any(|s| s.index == index)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Document range that change `index` of `card` currently maps to
pub fn document_range(card: &CorrectionCard, index: usize) -> Result<TextRange, ApplyError> {
    let change = &card
        .entries
        .get(index)
        .ok_or(ApplyError::UnknownChange {
            message: card.message_id,
            index,
        })?
        .change;
    let relative = card.ledger.resolve(index, change.range())?;
    Ok(relative.offset_by(card.base_offset))
}

/// Write change `index` of `card` into `document`
///
/// The live span must still read the change's `original`; otherwise the
/// change is marked failed and the document is untouched.
pub fn apply_card_change(
    document: &mut Document,
    card: &mut CorrectionCard,
    index: usize,
) -> Result<Edit, ApplyError> {
    let entry = card.entries.get(index).ok_or(ApplyError::UnknownChange {
        message: card.message_id,
        index,
    })?;
    if entry.status != ChangeStatus::Pending {
        return Err(ApplyError::NotPending {
            index,
            status: entry.status.label().to_string(),
        });
    }
    let change = entry.change.clone();

    if document.version() != card.document_version {
        debug!(
            document = document.id(),
            sent_version = card.document_version,
            current_version = document.version(),
            "document changed since request; re-validating span"
        );
    }

    let result = document_range(card, index).and_then(|range| {
        document
            .replace_verified(range, &change.original, &change.corrected)
            .map_err(ApplyError::from)
    });

    match result {
        Ok(edit) => {
            card.ledger
                .record(index, change.range(), char_len(&change.corrected));
            card.entries[index].status = ChangeStatus::Applied;
            Ok(edit)
        }
        Err(err) => {
            warn!(change = index, error = %err, "correction not applied");
            card.entries[index].status = ChangeStatus::Failed(err.to_string());
            Err(err)
        }
    }
}
