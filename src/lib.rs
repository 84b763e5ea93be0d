//! prosefix: LLM-backed grammar correction engine
//!
//! A document (or a selection of it) is sent to an OpenAI-compatible chat
//! endpoint together with a named prompt. The structured reply becomes a
//! correction card in the chat history whose changes can be applied,
//! dismissed and undone individually or as a group.

pub mod chat;
pub mod cli;
pub mod commands;
pub mod correction;
pub mod document;
pub mod error;
pub mod host;
pub mod llm;
pub mod session;
pub mod tasks;

pub use chat::{ChangeStatus, ChatAction, ChatMessage, ConversationHistory, CorrectionCard};
pub use commands::{CommandAction, CommandRegistry, CommandSpec};
pub use correction::{ApplyError, CorrectionPhase, CorrectionResult, CorrectionService};
pub use document::{Document, DocumentError};
pub use error::CorrectionError;
pub use host::{ConsoleHost, Host, HostEvent, NoticeLevel, RecordingHost};
pub use llm::{ApiError, CorrectionRequest, CorrectionResponse, LlmApiClient, TextChange};
pub use session::{ApplySummary, Session, SessionError, SessionState};
pub use tasks::{ActiveTask, OverlapError, TaskGuard, TaskId, TaskManager};

pub use prosefix_core::{ConfigManager, NamePromptPair, PromptManager, Settings, TextRange};
