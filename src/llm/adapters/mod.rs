//! Transports for the chat-completions endpoint

pub mod transport;
pub mod transport_fake;
pub mod transport_http;
pub mod transport_types;

pub use transport::{
    ApiError, AsyncTransport, FakeReply, FakeTransport, HttpTransport, RecordedRequest, Transport,
};
