//! Host editor collaborator
//!
//! The engine never renders UI itself. Everything it needs from the editor
//! (notices, opening the settings, showing the chat panel) goes through
//! this trait.

use crate::chat::{render_message, ChatMessage};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

pub trait Host: Send + Sync {
    /// Show a short notification
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Open the settings store for editing
    fn open_settings(&self, path: &Path);

    /// Bring the chat panel into view
    fn reveal_chat(&self);

    /// A message was added to the chat panel
    fn post_message(&self, message: &ChatMessage);
}

/// Host that writes to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHost {
    /// Echo chat messages to stdout
    pub echo_chat: bool,
}

impl Host for ConsoleHost {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => eprintln!("{}", message),
            NoticeLevel::Warning => eprintln!("warning: {}", message),
            NoticeLevel::Error => eprintln!("error: {}", message),
        }
    }

    fn open_settings(&self, path: &Path) {
        eprintln!("Settings file: {}", path.display());
    }

    fn reveal_chat(&self) {}

    fn post_message(&self, message: &ChatMessage) {
        if self.echo_chat {
            print!("{}", render_message(message));
        }
    }
}

/// Everything a `RecordingHost` was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Notice(NoticeLevel, String),
    OpenSettings(String),
    RevealChat,
    Message(String),
}

/// Host that records calls, for tests and headless use
#[derive(Debug, Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<HostEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.log().clone()
    }

    /// Notices at `level`, oldest first
    pub fn notices(&self, level: NoticeLevel) -> Vec<String> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Notice(l, msg) if *l == level => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl Host for RecordingHost {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.log().push(HostEvent::Notice(level, message.to_string()));
    }

    fn open_settings(&self, path: &Path) {
        self.log()
            .push(HostEvent::OpenSettings(path.display().to_string()));
    }

    fn reveal_chat(&self) {
        self.log().push(HostEvent::RevealChat);
    }

    fn post_message(&self, message: &ChatMessage) {
        self.log().push(HostEvent::Message(message.content.clone()));
    }
}
