//! Transport types
//!
//! Error taxonomy and the transport trait shared by the real and fake
//! transports.

use async_trait::async_trait;

/// Errors from talking to the chat-completions endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid settings, detected before any network call
    #[error("Configuration error: {}", .0.join("; "))]
    Configuration(Vec<String>),

    /// Network error (connection refused, DNS, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP error (non-2xx status)
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Response does not match the correction schema
    #[error("Schema error: {0}")]
    Schema(String),
}

impl ApiError {
    /// Short category name used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Configuration(_) => "configuration",
            ApiError::Network(_) => "network",
            ApiError::Http { .. } => "http",
            ApiError::Schema(_) => "schema",
        }
    }

    /// What the user can do about it
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            ApiError::Configuration(_) => {
                Some("Open the settings and fill in the API endpoint, key and model.")
            }
            ApiError::Network(_) => {
                Some("Check your network connection and the endpoint URL, then try again.")
            }
            ApiError::Http { status, .. } => match status {
                400 => Some("The endpoint rejected the request. Check the model name and max tokens."),
                401 => Some("The API key was rejected. Check the key in the settings."),
                403 => Some("The API key is not allowed to use this model or endpoint."),
                404 => Some("Endpoint or model not found. Check the endpoint URL and model name."),
                408 | 504 => Some("The endpoint timed out. Try again or correct a smaller selection."),
                429 => Some("Rate limit or quota exceeded. Wait a moment before trying again."),
                500..=599 => Some("The endpoint reported a server error. Try again later."),
                _ => None,
            },
            ApiError::Schema(_) => Some(
                "The model did not answer in the expected format. Try again or use a different model.",
            ),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Schema(format!("malformed JSON: {}", err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Asynchronous HTTP transport
///
/// Abstraction over the HTTP client so the client can be tested with
/// FakeTransport.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    /// POST a JSON body and return the response body of a 2xx response.
    ///
    /// Non-2xx responses map to `ApiError::Http`.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, ApiError>;
}

/// Pull a human-readable message out of an error body.
///
/// OpenAI-compatible servers answer `{"error": {"message": "..."}}`; anything
/// else is truncated raw text.
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
            .or_else(|| json.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        let cut: String = trimmed.chars().take(200).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}
