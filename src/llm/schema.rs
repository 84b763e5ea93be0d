//! Correction response parsing
//!
//! The correction payload is either the response body itself or the JSON
//! text inside `choices[0].message.content`. Validation is strict: the first
//! missing or mistyped field rejects the whole response.

use crate::llm::adapters::ApiError;
use prosefix_core::TextRange;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// One suggested replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub original: String,
    pub corrected: String,
    pub reason: String,
    /// Character offsets into the submitted text
    pub position: TextRange,
}

impl TextChange {
    pub fn range(&self) -> TextRange {
        self.position
    }
}

/// Validated correction payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrectionResponse {
    pub corrections: Vec<TextChange>,
}

impl CorrectionResponse {
    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }
}

/// Parse and validate a response body
pub fn parse_correction_response(body: &str) -> Result<CorrectionResponse, ApiError> {
    let payload = extract_payload(body)?;
    validate_payload(&payload)?;
    Ok(serde_json::from_value(payload)?)
}

/// Reject responses whose positions fall outside the submitted text
pub fn check_bounds(response: &CorrectionResponse, text_len: usize) -> Result<(), ApiError> {
    for (i, change) in response.corrections.iter().enumerate() {
        if change.position.end > text_len {
            return Err(ApiError::Schema(format!(
                "corrections[{}].position {} is outside the submitted text ({} characters)",
                i, change.position, text_len
            )));
        }
    }
    Ok(())
}

/// Extract `choices[0].message.content` from a chat completion body
pub fn parse_chat_completion(body: &str) -> Result<String, ApiError> {
    let json: JsonValue = serde_json::from_str(body)?;
    chat_content(&json)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Schema("missing choices[0].message.content".to_string()))
}

fn chat_content(json: &JsonValue) -> Option<&str> {
    json.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

/// Locate the correction payload inside a response body
pub fn extract_payload(body: &str) -> Result<JsonValue, ApiError> {
    let json: JsonValue = serde_json::from_str(body)?;

    if json.get("corrections").is_some() {
        return Ok(json);
    }

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(JsonValue::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("unknown error");
        return Err(ApiError::Schema(format!("provider returned an error: {}", message)));
    }

    if json.get("choices").is_some() {
        let content = chat_content(&json).ok_or_else(|| {
            ApiError::Schema("missing choices[0].message.content".to_string())
        })?;
        return parse_content(content);
    }

    Err(ApiError::Schema("missing required field 'corrections'".to_string()))
}

/// Parse the model's message content, tolerating a Markdown code fence or
/// prose around a single JSON object.
fn parse_content(content: &str) -> Result<JsonValue, ApiError> {
    let trimmed = content.trim();

    let unfenced = fence_pattern()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match serde_json::from_str::<JsonValue>(unfenced) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let start = unfenced.find('{');
            let end = unfenced.rfind('}');
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&unfenced[start..=end]).map_err(ApiError::from)
                }
                _ => Err(ApiError::from(first_err)),
            }
        }
    }
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").ok())
        .as_ref()
}

fn validate_payload(payload: &JsonValue) -> Result<(), ApiError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ApiError::Schema("response payload is not a JSON object".to_string()))?;

    let corrections = object
        .get("corrections")
        .ok_or_else(|| ApiError::Schema("missing required field 'corrections'".to_string()))?
        .as_array()
        .ok_or_else(|| ApiError::Schema("'corrections' is not an array".to_string()))?;

    for (i, item) in corrections.iter().enumerate() {
        let path = format!("corrections[{}]", i);
        let item = item
            .as_object()
            .ok_or_else(|| ApiError::Schema(format!("{} is not an object", path)))?;

        for field in ["original", "corrected", "reason"] {
            match item.get(field) {
                None => return Err(missing(&format!("{}.{}", path, field))),
                Some(value) if !value.is_string() => {
                    return Err(wrong_type(&format!("{}.{}", path, field), "a string"))
                }
                Some(_) => {}
            }
        }

        let position_path = format!("{}.position", path);
        let position = item
            .get("position")
            .ok_or_else(|| missing(&position_path))?
            .as_object()
            .ok_or_else(|| wrong_type(&position_path, "an object"))?;

        let mut bounds = [0u64; 2];
        for (slot, field) in bounds.iter_mut().zip(["start", "end"]) {
            let field_path = format!("{}.{}", position_path, field);
            *slot = position
                .get(field)
                .ok_or_else(|| missing(&field_path))?
                .as_u64()
                .ok_or_else(|| wrong_type(&field_path, "a non-negative integer"))?;
        }

        if bounds[0] > bounds[1] {
            return Err(ApiError::Schema(format!(
                "{}: start {} is after end {}",
                position_path, bounds[0], bounds[1]
            )));
        }
    }

    Ok(())
}

fn missing(path: &str) -> ApiError {
    ApiError::Schema(format!("{}: missing required field", path))
}

fn wrong_type(path: &str, expected: &str) -> ApiError {
    ApiError::Schema(format!("{}: expected {}", path, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO: &str = r#"{"corrections":[
        {"original":"Teh","corrected":"The","reason":"spelling","position":{"start":0,"end":3}},
        {"original":"sat","corrected":"sits","reason":"tense","position":{"start":8,"end":11}}
    ]}"#;

    fn schema_message(body: &str) -> String {
        match parse_correction_response(body) {
            Err(ApiError::Schema(msg)) => msg,
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_top_level_payload() {
        let response = parse_correction_response(TWO).unwrap();
        assert_eq!(response.len(), 2);
        assert_eq!(response.corrections[0].corrected, "The");
        assert_eq!(response.corrections[1].range(), TextRange::new(8, 11));
    }

    #[test]
    fn test_parse_chat_completion_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": TWO}}]
        })
        .to_string();
        assert_eq!(parse_correction_response(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_fenced_content() {
        let content = format!("```json\n{}\n```", TWO);
        let body = serde_json::json!({"choices": [{"message": {"content": content}}]}).to_string();
        assert_eq!(parse_correction_response(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_content_with_surrounding_prose() {
        let content = format!("Here you go:\n{}\nHope this helps.", TWO);
        let body = serde_json::json!({"choices": [{"message": {"content": content}}]}).to_string();
        assert_eq!(parse_correction_response(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_corrections_is_valid() {
        assert!(parse_correction_response(r#"{"corrections":[]}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_field_rejects_whole_response() {
        let body = r#"{"corrections":[
            {"original":"a","corrected":"b","reason":"r","position":{"start":0,"end":1}},
            {"original":"c","corrected":"d","position":{"start":2,"end":3}}
        ]}"#;
        assert_eq!(
            schema_message(body),
            "corrections[1].reason: missing required field"
        );
    }

    #[test]
    fn test_position_violations() {
        let end_missing =
            r#"{"corrections":[{"original":"a","corrected":"b","reason":"r","position":{"start":0}}]}"#;
        assert!(schema_message(end_missing).contains("position.end"));

        let negative = r#"{"corrections":[{"original":"a","corrected":"b","reason":"r","position":{"start":-1,"end":1}}]}"#;
        assert!(schema_message(negative).contains("non-negative integer"));

        let reversed = r#"{"corrections":[{"original":"a","corrected":"b","reason":"r","position":{"start":5,"end":1}}]}"#;
        assert!(schema_message(reversed).contains("after end"));
    }

    #[test]
    fn test_wrong_types() {
        assert!(schema_message(r#"{"corrections":{}}"#).contains("not an array"));
        assert!(schema_message(r#"{"corrections":[1]}"#).contains("not an object"));
        let numeric = r#"{"corrections":[{"original":1,"corrected":"b","reason":"r","position":{"start":0,"end":1}}]}"#;
        assert!(schema_message(numeric).contains("expected a string"));
    }

    #[test]
    fn test_truncated_body_is_schema_error() {
        let truncated = &TWO[..TWO.len() / 2];
        assert!(schema_message(truncated).starts_with("malformed JSON"));
    }

    #[test]
    fn test_missing_content_and_provider_error() {
        assert!(schema_message(r#"{"choices":[]}"#).contains("choices[0].message.content"));
        assert!(schema_message(r#"{"error":{"message":"quota"}}"#).contains("quota"));
        assert!(schema_message(r#"{"result":"ok"}"#).contains("'corrections'"));
    }

    #[test]
    fn test_check_bounds() {
        let response = parse_correction_response(TWO).unwrap();
        assert!(check_bounds(&response, 11).is_ok());
        assert!(matches!(
            check_bounds(&response, 10),
            Err(ApiError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_chat_completion() {
        let body = r#"{"choices":[{"message":{"content":"pong"}}]}"#;
        assert_eq!(parse_chat_completion(body).unwrap(), "pong");
        assert!(parse_chat_completion(r#"{"model":"x"}"#).is_err());
    }
}
