//! LLM API client
//!
//! Talks to a single OpenAI-compatible chat-completions endpoint. Request
//! bodies are built here; responses go through the strict correction schema.

use crate::llm::adapters::{ApiError, AsyncTransport, Transport};
use crate::llm::contracts::{build_messages, ping_messages};
use crate::llm::schema::{check_bounds, parse_chat_completion, parse_correction_response, CorrectionResponse};
use crate::llm::types::{ConnectionReport, CorrectionRequest, LlmMessage};
use prosefix_core::{char_len, ApiSettings};
use std::time::Instant;
use tracing::{debug, info, warn};

const COMPLETIONS_PATH: &str = "/chat/completions";

/// Client for the configured chat-completions endpoint
#[derive(Debug, Clone)]
pub struct LlmApiClient {
    settings: ApiSettings,
    transport: Transport,
}

impl LlmApiClient {
    /// Client with the real HTTP transport
    pub fn new(settings: ApiSettings) -> Self {
        let transport = Transport::http(settings.timeout_seconds);
        Self {
            settings,
            transport,
        }
    }

    /// Client with a custom transport (for testing)
    pub fn with_transport(settings: ApiSettings, transport: impl Into<Transport>) -> Self {
        Self {
            settings,
            transport: transport.into(),
        }
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Replace the settings. A real transport is rebuilt so a new timeout takes effect.
    pub fn update_settings(&mut self, settings: ApiSettings) {
        if let Transport::Http(_) = self.transport {
            self.transport = Transport::http(settings.timeout_seconds);
        }
        self.settings = settings;
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Every problem that prevents a request from being sent
    pub fn validate_configuration(&self) -> Vec<String> {
        self.settings.validate()
    }

    /// Full completions URL for the configured endpoint
    pub fn endpoint_url(&self) -> String {
        endpoint_url_for(&self.settings.endpoint)
    }

    /// JSON body for a correction request
    pub fn build_body(&self, request: &CorrectionRequest) -> serde_json::Value {
        self.body_for(&build_messages(request))
    }

    fn body_for(&self, messages: &[LlmMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        })
    }

    /// POST a body and return the raw response text
    async fn post(&self, endpoint: &str, api_key: &str, body: &serde_json::Value) -> Result<String, ApiError> {
        let url = endpoint_url_for(endpoint);
        let auth = format!("Bearer {}", api_key);
        let headers = [
            ("Authorization", auth.as_str()),
            ("Content-Type", "application/json"),
        ];
        self.transport
            .post_json(&url, &headers, &body.to_string())
            .await
    }

    /// Send the request and return the raw response body
    pub async fn send_raw(&self, request: &CorrectionRequest) -> Result<String, ApiError> {
        let errors = request_errors(request);
        if !errors.is_empty() {
            return Err(ApiError::Configuration(errors));
        }

        let body = self.build_body(request);
        debug!(
            document = %request.document_id,
            prompt = %request.prompt_name,
            chars = char_len(&request.text),
            "sending correction request"
        );
        self.post(&request.api_endpoint, &request.api_key, &body).await
    }

    /// Parse a response body for `request`, including the bounds check
    pub fn parse_response(
        &self,
        request: &CorrectionRequest,
        body: &str,
    ) -> Result<CorrectionResponse, ApiError> {
        let response = parse_correction_response(body)?;
        check_bounds(&response, char_len(&request.text))?;
        Ok(response)
    }

    /// Send a correction request and validate the response
    pub async fn send_request(
        &self,
        request: &CorrectionRequest,
    ) -> Result<CorrectionResponse, ApiError> {
        let body = self.send_raw(request).await?;
        let response = self.parse_response(request, &body)?;
        info!(
            document = %request.document_id,
            corrections = response.len(),
            "correction response accepted"
        );
        Ok(response)
    }

    /// Send a minimal request and check that a chat completion comes back
    pub async fn test_connection(&self) -> Result<ConnectionReport, ApiError> {
        let errors = self.validate_configuration();
        if !errors.is_empty() {
            return Err(ApiError::Configuration(errors));
        }

        let mut body = self.body_for(&ping_messages());
        body["max_tokens"] = serde_json::json!(8);

        let started = Instant::now();
        let result = self
            .post(&self.settings.endpoint, &self.settings.resolved_api_key(), &body)
            .await;
        let latency = started.elapsed();

        let reply = match result.and_then(|text| parse_chat_completion(&text)) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "connection test failed");
                return Err(err);
            }
        };

        info!(latency_ms = latency.as_millis() as u64, "connection test succeeded");
        Ok(ConnectionReport {
            endpoint: self.endpoint_url(),
            model: self.settings.model.clone(),
            latency,
            reply: reply.trim().chars().take(80).collect(),
        })
    }
}

/// Completions URL for an endpoint: used as-is when it already ends with
/// `/chat/completions`, otherwise the path is appended to the trimmed base.
pub fn endpoint_url_for(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.ends_with(COMPLETIONS_PATH) {
        base.to_string()
    } else {
        format!("{}{}", base, COMPLETIONS_PATH)
    }
}

fn request_errors(request: &CorrectionRequest) -> Vec<String> {
    let mut errors = Vec::new();
    if request.api_endpoint.trim().is_empty() {
        errors.push("API endpoint is not configured".to_string());
    }
    if request.api_key.trim().is_empty() {
        errors.push("API key is not configured".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::adapters::FakeTransport;
    use prosefix_core::TextRange;

    fn settings() -> ApiSettings {
        ApiSettings {
            endpoint: "https://llm.example.com/v1/".to_string(),
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            timeout_seconds: 5,
        }
    }

    fn request(text: &str) -> CorrectionRequest {
        CorrectionRequest {
            document_id: "doc".to_string(),
            text: text.to_string(),
            prompt: "Fix grammar.".to_string(),
            prompt_name: "Grammar".to_string(),
            is_selection: false,
            selection_range: None,
            api_endpoint: "https://llm.example.com/v1/".to_string(),
            api_key: "sk-test".to_string(),
        }
    }

    #[test]
    fn test_endpoint_url_normalization() {
        assert_eq!(
            endpoint_url_for("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url_for(" https://api.openai.com/v1/ "),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url_for("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_body_shape() {
        let client = LlmApiClient::with_transport(settings(), FakeTransport::new("{}"));
        let body = client.build_body(&request("Teh cat"));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Teh cat");
    }

    #[tokio::test]
    async fn test_send_request_headers_and_parse() {
        let fake = FakeTransport::new(
            r#"{"corrections":[{"original":"Teh","corrected":"The","reason":"typo","position":{"start":0,"end":3}}]}"#,
        );
        let client = LlmApiClient::with_transport(settings(), fake.clone());
        let response = client.send_request(&request("Teh cat")).await.unwrap();
        assert_eq!(response.len(), 1);

        let sent = fake.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://llm.example.com/v1/chat/completions");
        assert_eq!(sent[0].header("authorization"), Some("Bearer sk-test"));
        assert_eq!(sent[0].header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_out_of_range_position_rejects_response() {
        let fake = FakeTransport::new(
            r#"{"corrections":[{"original":"x","corrected":"y","reason":"r","position":{"start":2,"end":9}}]}"#,
        );
        let client = LlmApiClient::with_transport(settings(), fake);
        let err = client.send_request(&request("abc")).await.unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let fake = FakeTransport::new("{}");
        let client = LlmApiClient::with_transport(settings(), fake.clone());
        let mut req = request("abc");
        req.api_key = String::new();
        req.selection_range = Some(TextRange::new(0, 3));
        let err = client.send_request(&req).await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
        assert_eq!(fake.request_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_report() {
        let fake = FakeTransport::new(r#"{"choices":[{"message":{"content":" pong "}}]}"#);
        let client = LlmApiClient::with_transport(settings(), fake.clone());
        let report = client.test_connection().await.unwrap();
        assert_eq!(report.reply, "pong");
        assert_eq!(report.model, "test-model");
        assert_eq!(fake.requests()[0].json()["max_tokens"], 8);
    }

    #[tokio::test]
    async fn test_connection_http_error() {
        let fake = FakeTransport::with_status(401, r#"{"error":{"message":"bad key"}}"#);
        let client = LlmApiClient::with_transport(settings(), fake);
        let err = client.test_connection().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 401,
                message: "bad key".to_string()
            }
        );
        assert!(err.guidance().unwrap_or_default().contains("API key"));
    }

    #[test]
    fn test_update_settings_rebuilds_http_timeout() {
        let mut client = LlmApiClient::new(settings());
        client.update_settings(ApiSettings {
            timeout_seconds: 90,
            ..settings()
        });
        match client.transport() {
            Transport::Http(http) => assert_eq!(http.timeout(), 90),
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(client.settings().timeout_seconds, 90);
    }
}
