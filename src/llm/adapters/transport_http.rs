//! Real HTTP transport using reqwest

use crate::llm::adapters::transport_types::{error_message_from_body, ApiError, AsyncTransport};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Real HTTP transport using reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    /// Timeout in seconds for requests
    timeout: u64,
}

impl HttpTransport {
    /// Create new transport with default timeout (30s)
    pub fn new() -> Self {
        Self::with_timeout(30)
    }

    /// Create transport with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: timeout_secs,
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AsyncTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, ApiError> {
        debug!(url, timeout_secs = self.timeout, body_len = body.len(), "POST");

        let mut request = self
            .client
            .post(url)
            .timeout(Duration::from_secs(self.timeout));

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.body(body.to_string()).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), body_len = text.len(), "response");

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message_from_body(&text),
            });
        }

        Ok(text)
    }
}
