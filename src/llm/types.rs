//! LLM request, message and connection report types

use prosefix_core::{char_len, TextRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// LLM message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    /// System message (sets behavior/context)
    System,
    /// User message (human input)
    User,
    /// Assistant message (LLM response)
    Assistant,
}

/// Single chat-completions message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }
}

/// One correction attempt. Immutable once sent.
#[derive(Clone, PartialEq, Eq)]
pub struct CorrectionRequest {
    /// Which document the range belongs to
    pub document_id: String,
    /// Exactly the text sent to the model
    pub text: String,
    pub prompt: String,
    pub prompt_name: String,
    pub is_selection: bool,
    /// Character range of `text` inside the document, for selections
    pub selection_range: Option<TextRange>,
    pub api_endpoint: String,
    pub api_key: String,
}

impl CorrectionRequest {
    /// Range of the document locked while this request is outstanding
    pub fn target_range(&self) -> TextRange {
        match self.selection_range {
            Some(range) if self.is_selection => range,
            _ => TextRange::whole(char_len(&self.text)),
        }
    }

    /// Document offset that response positions are relative to
    pub fn base_offset(&self) -> usize {
        if self.is_selection {
            self.selection_range.map(|r| r.start).unwrap_or(0)
        } else {
            0
        }
    }
}

impl fmt::Debug for CorrectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionRequest")
            .field("document_id", &self.document_id)
            .field("text_chars", &char_len(&self.text))
            .field("prompt_name", &self.prompt_name)
            .field("is_selection", &self.is_selection)
            .field("selection_range", &self.selection_range)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Result of a connection test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub endpoint: String,
    pub model: String,
    pub latency: Duration,
    /// First characters of the model's reply
    pub reply: String,
}
