//! Building correction requests from a document and selection

use crate::error::CorrectionError;
use crate::llm::CorrectionRequest;
use prosefix_core::{char_len, slice_chars, ApiSettings, NamePromptPair, TextRange};

/// Build the request for `selection` of `text`
///
/// An absent or empty selection means the whole document. Whitespace-only
/// text is refused since there is nothing to correct.
pub fn build_request(
    document_id: &str,
    text: &str,
    selection: Option<TextRange>,
    prompt: &NamePromptPair,
    api: &ApiSettings,
) -> Result<CorrectionRequest, CorrectionError> {
    let len = char_len(text);
    let selection = selection.filter(|r| !r.is_empty());

    let (submitted, selection_range) = match selection {
        Some(range) => {
            let slice = slice_chars(text, range)
                .ok_or(CorrectionError::InvalidSelection { range, len })?;
            (slice, Some(range))
        }
        None => (text, None),
    };

    if submitted.trim().is_empty() {
        return Err(CorrectionError::EmptyText);
    }

    Ok(CorrectionRequest {
        document_id: document_id.to_string(),
        text: submitted.to_string(),
        prompt: prompt.prompt.clone(),
        prompt_name: prompt.name.clone(),
        is_selection: selection_range.is_some(),
        selection_range,
        api_endpoint: api.endpoint.trim().to_string(),
        api_key: api.resolved_api_key(),
    })
}
