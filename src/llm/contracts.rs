//! Correction contract prompts
//!
//! The system message tells the model the exact JSON shape the schema
//! validator accepts. The user's selected prompt is appended as the task.

use crate::llm::types::{CorrectionRequest, LlmMessage};

/// Fixed response contract shared by every prompt
pub const RESPONSE_CONTRACT: &str = r#"You are a careful copy editor. You receive a piece of text and a task.
Find the passages that the task asks you to change and propose replacements.

Respond with ONLY a JSON object, no prose and no Markdown, of this exact shape:
{"corrections": [{"original": "<exact text from the input>", "corrected": "<replacement>", "reason": "<short explanation>", "position": {"start": <int>, "end": <int>}}]}

Rules:
- "position" uses zero-based character offsets into the input text; "end" is exclusive.
- "original" must be exactly the input text between "start" and "end".
- Corrections must not overlap each other.
- Leave everything that needs no change out of the list.
- If nothing needs to change, respond with {"corrections": []}."#;

/// System message for a correction prompt
pub fn system_prompt(task: &str) -> String {
    format!("{}\n\nTask:\n{}", RESPONSE_CONTRACT, task.trim())
}

/// Messages for a correction request: the contract plus task, then exactly the submitted text
pub fn build_messages(request: &CorrectionRequest) -> Vec<LlmMessage> {
    vec![
        LlmMessage::system(system_prompt(&request.prompt)),
        LlmMessage::user(request.text.clone()),
    ]
}

/// Minimal messages used by the connection test
pub fn ping_messages() -> Vec<LlmMessage> {
    vec![
        LlmMessage::system("Reply with the single word: pong"),
        LlmMessage::user("ping"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::LlmRole;

    #[test]
    fn test_user_message_is_exactly_the_text() {
        let request = CorrectionRequest {
            document_id: "d".to_string(),
            text: "  BBB \n".to_string(),
            prompt: "  Be formal.  ".to_string(),
            prompt_name: "Formal".to_string(),
            is_selection: false,
            selection_range: None,
            api_endpoint: String::new(),
            api_key: String::new(),
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, LlmRole::System);
        assert!(messages[0].content.ends_with("Task:\nBe formal."));
        assert!(messages[0].content.contains("\"corrections\""));
        assert_eq!(messages[1].content, "  BBB \n");
    }
}
