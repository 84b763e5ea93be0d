//! Correction error taxonomy

use crate::llm::ApiError;
use crate::tasks::OverlapError;
use prosefix_core::{PromptError, TextRange};

/// Why a correction did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrectionError {
    #[error("Configuration error: {}", .0.join("; "))]
    Configuration(Vec<String>),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Overlap(#[from] OverlapError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Nothing to correct: the text is empty")]
    EmptyText,

    #[error("Selection {range} is outside the document ({len} characters)")]
    InvalidSelection { range: TextRange, len: usize },
}

impl CorrectionError {
    /// Category name for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            CorrectionError::Configuration(_) => "configuration",
            CorrectionError::Api(err) => err.kind(),
            CorrectionError::Overlap(_) => "overlap",
            CorrectionError::Prompt(_) => "prompt",
            CorrectionError::EmptyText | CorrectionError::InvalidSelection { .. } => "input",
        }
    }

    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            CorrectionError::Configuration(_) => {
                Some("Open the settings and fill in the API endpoint, key and model.")
            }
            CorrectionError::Api(err) => err.guidance(),
            CorrectionError::Overlap(_) => {
                Some("Wait for the running correction of this text to finish.")
            }
            _ => None,
        }
    }
}

impl From<Vec<String>> for CorrectionError {
    fn from(errors: Vec<String>) -> Self {
        CorrectionError::Configuration(errors)
    }
}
