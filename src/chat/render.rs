//! Plain-text rendering of the chat panel

use crate::chat::{ChangeStatus, ChatMessage, ChatRole, ConversationHistory, CorrectionCard};
use std::fmt::Write;

fn status_marker(status: &ChangeStatus) -> &'static str {
    match status {
        ChangeStatus::Pending => "[ ]",
        ChangeStatus::Applied => "[x]",
        ChangeStatus::Dismissed => "[-]",
        ChangeStatus::Failed(_) => "[!]",
    }
}

/// One line per change: marker, index, position, replacement and reason
pub fn render_card(card: &CorrectionCard) -> String {
    let mut out = String::new();
    for (i, entry) in card.entries.iter().enumerate() {
        let change = &entry.change;
        let _ = writeln!(
            out,
            "  {} #{} {} \"{}\" -> \"{}\" ({})",
            status_marker(&entry.status),
            i,
            change.position,
            change.original,
            change.corrected,
            change.reason
        );
        if let ChangeStatus::Failed(reason) = &entry.status {
            let _ = writeln!(out, "      {}", reason);
        }
    }
    out
}

pub fn render_message(message: &ChatMessage) -> String {
    let prefix = match message.role {
        ChatRole::User => "You",
        ChatRole::Assistant => "Assistant",
    };
    let mut out = format!(
        "[{}] {}: {}\n",
        message.timestamp.format("%H:%M:%S"),
        prefix,
        message.content
    );
    if let Some(card) = &message.card {
        out.push_str(&render_card(card));
    }
    out
}

pub fn render_history(history: &ConversationHistory) -> String {
    history.messages().map(render_message).collect()
}
