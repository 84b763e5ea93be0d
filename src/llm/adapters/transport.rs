//! HTTP Transport for the API client
//!
//! Concrete transport enum so the client holds one type for both the real
//! reqwest transport and the test fake.

pub use crate::llm::adapters::transport_fake::{FakeReply, FakeTransport, RecordedRequest};
pub use crate::llm::adapters::transport_http::HttpTransport;
pub use crate::llm::adapters::transport_types::{ApiError, AsyncTransport};

use async_trait::async_trait;

/// Concrete transport enum
#[derive(Debug, Clone)]
pub enum Transport {
    Http(HttpTransport),
    Fake(FakeTransport),
}

impl Transport {
    /// Real transport with the given timeout
    pub fn http(timeout_secs: u64) -> Self {
        Transport::Http(HttpTransport::with_timeout(timeout_secs))
    }
}

#[async_trait]
impl AsyncTransport for Transport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, ApiError> {
        match self {
            Transport::Http(t) => t.post_json(url, headers, body).await,
            Transport::Fake(t) => t.post_json(url, headers, body).await,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Http(HttpTransport::new())
    }
}

impl From<FakeTransport> for Transport {
    fn from(fake: FakeTransport) -> Self {
        Transport::Fake(fake)
    }
}
