//! Fake transport for testing
//!
//! Uses scripted replies instead of real HTTP calls and records every
//! request it receives. An optional gate holds requests in flight until the
//! test releases them.

use crate::llm::adapters::transport_types::{ApiError, AsyncTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// One scripted reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeReply {
    /// 2xx with this body
    Body(String),
    /// Non-2xx status with this body
    Status { status: u16, body: String },
    /// Transport-level failure
    NetworkError(String),
}

/// A request seen by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body parsed as JSON (Null if it is not JSON)
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug)]
struct FakeState {
    replies: VecDeque<FakeReply>,
    fallback: FakeReply,
    requests: Vec<RecordedRequest>,
}

/// Fake transport for testing. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    gate: Option<Arc<Notify>>,
}

impl FakeTransport {
    /// Fake that answers every request with `response`
    pub fn new(response: &str) -> Self {
        Self::with_reply(FakeReply::Body(response.to_string()))
    }

    /// Fake that fails every request with a network error
    pub fn with_error(msg: &str) -> Self {
        Self::with_reply(FakeReply::NetworkError(msg.to_string()))
    }

    /// Fake that answers every request with a non-2xx status
    pub fn with_status(status: u16, body: &str) -> Self {
        Self::with_reply(FakeReply::Status {
            status,
            body: body.to_string(),
        })
    }

    fn with_reply(fallback: FakeReply) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                replies: VecDeque::new(),
                fallback,
                requests: Vec::new(),
            })),
            gate: None,
        }
    }

    /// Queue a reply used before the fallback
    pub fn then(self, reply: FakeReply) -> Self {
        self.state().replies.push_back(reply);
        self
    }

    /// Hold every request until `gate` is notified (one permit per request)
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AsyncTransport for FakeTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, ApiError> {
        {
            let mut state = self.state();
            state.requests.push(RecordedRequest {
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: body.to_string(),
            });
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = {
            let mut state = self.state();
            match state.replies.pop_front() {
                Some(reply) => reply,
                None => state.fallback.clone(),
            }
        };

        match reply {
            FakeReply::Body(body) => Ok(body),
            FakeReply::Status { status, body } => Err(ApiError::Http {
                status,
                message: crate::llm::adapters::transport_types::error_message_from_body(&body),
            }),
            FakeReply::NetworkError(msg) => Err(ApiError::Network(msg)),
        }
    }
}
