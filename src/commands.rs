//! Command table
//!
//! Every command the host can bind (palette entries, buttons, keys) is an
//! explicit record: id, title and the action the session performs. Prompt
//! commands are regenerated whenever the prompt list changes.

use prosefix_core::NamePromptPair;

pub const OPEN_SETTINGS: &str = "prosefix.openSettings";
pub const REFRESH_PROMPTS: &str = "prosefix.refreshPrompts";
pub const PROCESS_DOCUMENT: &str = "prosefix.processDocument";
pub const SHOW_CHAT: &str = "prosefix.showChat";
pub const CLEAR_CHAT: &str = "prosefix.clearChat";
pub const TEST_CONNECTION: &str = "prosefix.testConnection";
/// Prefix of the per-prompt commands, followed by the prompt id
pub const PROMPT_PREFIX: &str = "prosefix.prompt.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    OpenSettings,
    RefreshPrompts,
    ProcessDocument,
    ShowChat,
    ClearChat,
    TestConnection,
    /// Correct the selection (or the document) with this prompt id
    CorrectWithPrompt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub id: String,
    pub title: String,
    pub action: CommandAction,
}

impl CommandSpec {
    fn new(id: &str, title: &str, action: CommandAction) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            action,
        }
    }

    pub fn is_prompt_command(&self) -> bool {
        matches!(self.action, CommandAction::CorrectWithPrompt(_))
    }
}

/// Command id for a prompt
pub fn prompt_command_id(prompt_id: &str) -> String {
    format!("{}{}", PROMPT_PREFIX, prompt_id)
}

#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// Built-in commands plus one per prompt
    pub fn new(prompts: &[NamePromptPair]) -> Self {
        let mut registry = Self {
            commands: builtin_commands(),
        };
        registry.refresh_prompt_commands(prompts);
        registry
    }

    /// Replace the per-prompt commands
    pub fn refresh_prompt_commands(&mut self, prompts: &[NamePromptPair]) {
        self.commands.retain(|c| !c.is_prompt_command());
        self.commands.extend(prompts.iter().map(|p| CommandSpec {
            id: prompt_command_id(&p.id),
            title: format!("Correct with {}", p.name),
            action: CommandAction::CorrectWithPrompt(p.id.clone()),
        }));
    }

    pub fn get(&self, id: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn builtin_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new(OPEN_SETTINGS, "Prosefix: Open Settings", CommandAction::OpenSettings),
        CommandSpec::new(
            REFRESH_PROMPTS,
            "Prosefix: Refresh Prompts",
            CommandAction::RefreshPrompts,
        ),
        CommandSpec::new(
            PROCESS_DOCUMENT,
            "Prosefix: Process Document",
            CommandAction::ProcessDocument,
        ),
        CommandSpec::new(SHOW_CHAT, "Prosefix: Show Chat", CommandAction::ShowChat),
        CommandSpec::new(CLEAR_CHAT, "Prosefix: Clear Chat", CommandAction::ClearChat),
        CommandSpec::new(
            TEST_CONNECTION,
            "Prosefix: Test API Connection",
            CommandAction::TestConnection,
        ),
    ]
}
