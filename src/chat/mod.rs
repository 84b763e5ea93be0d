//! Chat panel model
//!
//! Session-scoped conversation history. Assistant messages that answer a
//! correction carry a card with one entry per suggested change; each entry
//! can be applied or dismissed on its own.

pub mod render;

pub use render::{render_card, render_history, render_message};

use crate::correction::apply::{ApplyError, ChangeLedger};
use crate::llm::{CorrectionRequest, CorrectionResponse, TextChange};
use chrono::{DateTime, Utc};
use prosefix_core::{char_len, TextRange};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Default bound on kept messages
pub const MAX_CHAT_MESSAGES: usize = 200;

/// Role in chat conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// State of one suggested change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    Pending,
    Applied,
    Dismissed,
    Failed(String),
}

impl ChangeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Dismissed => "dismissed",
            ChangeStatus::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub change: TextChange,
    pub status: ChangeStatus,
}

/// Actions offered next to a correction card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Apply { message: Uuid, change: usize },
    Dismiss { message: Uuid, change: usize },
    ApplyAll { message: Uuid },
    DismissAll { message: Uuid },
}

impl ChatAction {
    pub fn message_id(&self) -> Uuid {
        match *self {
            ChatAction::Apply { message, .. }
            | ChatAction::Dismiss { message, .. }
            | ChatAction::ApplyAll { message }
            | ChatAction::DismissAll { message } => message,
        }
    }
}

/// Correction payload attached to an assistant message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionCard {
    pub message_id: Uuid,
    pub prompt_name: String,
    pub document_id: String,
    pub is_selection: bool,
    /// Document offset of the submitted text
    pub base_offset: usize,
    /// Length in characters of the submitted text
    pub span_len: usize,
    /// Document version when the request was built
    pub document_version: u64,
    pub entries: Vec<ChangeEntry>,
    pub ledger: ChangeLedger,
}

impl CorrectionCard {
    pub fn new(
        message_id: Uuid,
        request: &CorrectionRequest,
        response: &CorrectionResponse,
        document_version: u64,
    ) -> Self {
        Self {
            message_id,
            prompt_name: request.prompt_name.clone(),
            document_id: request.document_id.clone(),
            is_selection: request.is_selection,
            base_offset: request.base_offset(),
            span_len: char_len(&request.text),
            document_version,
            entries: response
                .corrections
                .iter()
                .cloned()
                .map(|change| ChangeEntry {
                    change,
                    status: ChangeStatus::Pending,
                })
                .collect(),
            ledger: ChangeLedger::new(),
        }
    }

    /// Document span the request covered when it was sent
    pub fn submitted_range(&self) -> TextRange {
        TextRange::new(self.base_offset, self.base_offset + self.span_len)
    }

    pub fn pending(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == ChangeStatus::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count(&self, status: &ChangeStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.label() == status.label())
            .count()
    }

    pub fn dismiss(&mut self, index: usize) -> Result<(), ApplyError> {
        let entry = self.entry_mut(index)?;
        if entry.status != ChangeStatus::Pending {
            return Err(ApplyError::NotPending {
                index,
                status: entry.status.label().to_string(),
            });
        }
        entry.status = ChangeStatus::Dismissed;
        Ok(())
    }

    /// Back to pending after the document edit was undone
    pub fn revert(&mut self, index: usize) {
        self.ledger.forget(index);
        if let Some(entry) = self.entries.get_mut(index) {
            entry.status = ChangeStatus::Pending;
        }
    }

    /// Applied again after the document edit was redone
    pub fn reapply(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            self.ledger.record(
                index,
                entry.change.range(),
                char_len(&entry.change.corrected),
            );
            entry.status = ChangeStatus::Applied;
        }
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut ChangeEntry, ApplyError> {
        let message = self.message_id;
        self.entries
            .get_mut(index)
            .ok_or(ApplyError::UnknownChange { message, index })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub card: Option<CorrectionCard>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String, card: Option<CorrectionCard>, id: Uuid) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: Utc::now(),
            card,
        }
    }

    /// Actions the panel offers for this message
    pub fn actions(&self) -> Vec<ChatAction> {
        let Some(card) = &self.card else {
            return Vec::new();
        };
        let pending = card.pending();
        let mut actions = Vec::with_capacity(pending.len() * 2 + 2);
        for &change in &pending {
            actions.push(ChatAction::Apply {
                message: self.id,
                change,
            });
            actions.push(ChatAction::Dismiss {
                message: self.id,
                change,
            });
        }
        if pending.len() > 1 {
            actions.push(ChatAction::ApplyAll { message: self.id });
            actions.push(ChatAction::DismissAll { message: self.id });
        }
        actions
    }
}

/// Bounded, ordered chat history. Oldest messages are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: VecDeque<ChatMessage>,
    max_messages: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(MAX_CHAT_MESSAGES)
    }
}

impl ConversationHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ChatMessage::new(
            ChatRole::User,
            content.into(),
            None,
            Uuid::new_v4(),
        ))
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ChatMessage::new(
            ChatRole::Assistant,
            content.into(),
            None,
            Uuid::new_v4(),
        ))
    }

    /// Add the assistant answer to a correction
    pub fn push_correction(
        &mut self,
        request: &CorrectionRequest,
        response: &CorrectionResponse,
        document_version: u64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let card = CorrectionCard::new(id, request, response, document_version);
        let content = match response.len() {
            0 => format!("{}: no corrections needed.", request.prompt_name),
            1 => format!("{}: 1 suggested correction.", request.prompt_name),
            n => format!("{}: {} suggested corrections.", request.prompt_name, n),
        };
        self.push(ChatMessage::new(ChatRole::Assistant, content, Some(card), id))
    }

    fn push(&mut self, message: ChatMessage) -> Uuid {
        let id = message.id;
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn card(&self, id: Uuid) -> Option<&CorrectionCard> {
        self.get(id).and_then(|m| m.card.as_ref())
    }

    pub fn card_mut(&mut self, id: Uuid) -> Option<&mut CorrectionCard> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .and_then(|m| m.card.as_mut())
    }

    /// Most recent message that carries a correction card
    pub fn latest_card(&self) -> Option<&CorrectionCard> {
        self.messages.iter().rev().find_map(|m| m.card.as_ref())
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn set_max_messages(&mut self, max_messages: usize) {
        self.max_messages = max_messages.max(1);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }
}
