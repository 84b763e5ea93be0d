//! LLM integration: transport, request building and response validation
//!
//! One OpenAI-compatible chat-completions contract. The client sends the
//! correction request; the schema module decides whether the answer is
//! usable at all.

pub mod adapters;
pub mod client;
pub mod contracts;
pub mod schema;
pub mod types;

pub use adapters::{ApiError, AsyncTransport, FakeReply, FakeTransport, HttpTransport, Transport};
pub use client::{endpoint_url_for, LlmApiClient};
pub use contracts::{build_messages, system_prompt, RESPONSE_CONTRACT};
pub use schema::{check_bounds, parse_correction_response, CorrectionResponse, TextChange};
pub use types::{ConnectionReport, CorrectionRequest, LlmMessage, LlmRole};
