//! Session context
//!
//! Settings, prompts, the correction service with its task table, the chat
//! history, the document and the command table of one editor session live in
//! an explicitly constructed `Session`. Hosts call `init` when the session
//! starts and `dispose` when it ends.

use crate::chat::{ChatAction, ConversationHistory};
use crate::commands::{CommandAction, CommandRegistry};
use crate::correction::{apply_card_change, build_request, ApplyError, CorrectionPhase, CorrectionService};
use crate::document::{Document, EditTag};
use crate::error::CorrectionError;
use crate::host::{Host, NoticeLevel};
use crate::llm::{ApiError, ConnectionReport, LlmApiClient, Transport};
use prosefix_core::{
    ApiSettings, ConfigManager, NamePromptPair, PromptError, PromptManager, PromptPatch, TextRange,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Session has been disposed")]
    Disposed,

    #[error("Settings error: {0}")]
    Config(String),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::UnknownCommand(_) => "command",
            SessionError::Disposed => "session",
            SessionError::Config(_) => "configuration",
            SessionError::Correction(err) => err.kind(),
            SessionError::Apply(_) => "apply",
            SessionError::Prompt(_) => "prompt",
            SessionError::Api(err) => err.kind(),
        }
    }

    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            SessionError::Correction(err) => err.guidance(),
            SessionError::Api(err) => err.guidance(),
            _ => None,
        }
    }

    fn notice_level(&self) -> NoticeLevel {
        match self {
            SessionError::Correction(CorrectionError::Overlap(_))
            | SessionError::Correction(CorrectionError::EmptyText)
            | SessionError::Apply(_)
            | SessionError::Prompt(_) => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        }
    }
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        SessionError::Config(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Disposed,
}

/// Outcome of an apply-all action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub failed: usize,
}

pub struct Session {
    config: ConfigManager,
    prompts: PromptManager,
    service: CorrectionService,
    chat: ConversationHistory,
    document: Document,
    selection: Option<TextRange>,
    commands: CommandRegistry,
    host: Arc<dyn Host>,
    state: SessionState,
    last_outcome: Option<CorrectionPhase>,
    settings_dirty: bool,
}

impl Session {
    /// Start a session over `document` with the real HTTP transport
    pub fn init(config: ConfigManager, document: Document, host: Arc<dyn Host>) -> Self {
        let client = LlmApiClient::new(config.settings().api.clone());
        Self::init_with_client(config, document, host, client)
    }

    /// Start a session with a custom transport (for testing)
    pub fn init_with_transport(
        config: ConfigManager,
        document: Document,
        host: Arc<dyn Host>,
        transport: impl Into<Transport>,
    ) -> Self {
        let client = LlmApiClient::with_transport(config.settings().api.clone(), transport);
        Self::init_with_client(config, document, host, client)
    }

    fn init_with_client(
        mut config: ConfigManager,
        document: Document,
        host: Arc<dyn Host>,
        client: LlmApiClient,
    ) -> Self {
        let prompts = PromptManager::from_stored(config.settings().prompts.clone());
        config.set_prompts(prompts.list().to_vec());

        let chat = ConversationHistory::new(config.settings().chat.max_messages);
        let commands = CommandRegistry::new(prompts.list());

        let problems = client.validate_configuration();
        if !problems.is_empty() {
            warn!(problems = ?problems, "API settings incomplete");
        }
        info!(
            document = document.id(),
            prompts = prompts.len(),
            commands = commands.len(),
            "session initialized"
        );

        Self {
            config,
            prompts,
            service: CorrectionService::new(client),
            chat,
            document,
            selection: None,
            commands,
            host,
            state: SessionState::Active,
            last_outcome: None,
            settings_dirty: false,
        }
    }

    /// End the session: drop outstanding tasks and persist changed settings
    pub fn dispose(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Disposed {
            return Ok(());
        }
        self.state = SessionState::Disposed;

        let outstanding = self.service.tasks().clear();
        if outstanding > 0 {
            warn!(outstanding, "session disposed with corrections in flight");
        }
        if self.settings_dirty {
            self.save_settings_inner()?;
        }
        info!(document = self.document.id(), "session disposed");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Disposed => Err(SessionError::Disposed),
        }
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn prompts(&self) -> &PromptManager {
        &self.prompts
    }

    pub fn chat(&self) -> &ConversationHistory {
        &self.chat
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn service(&self) -> &CorrectionService {
        &self.service
    }

    pub fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Option<TextRange>) {
        self.selection = selection;
    }

    /// Terminal phase of the most recent correction
    pub fn last_outcome(&self) -> Option<CorrectionPhase> {
        self.last_outcome
    }

    pub fn settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    /// Surface an error to the host and the log
    fn report(&self, err: &SessionError) {
        error!(kind = err.kind(), error = %err, "session operation failed");
        let message = match err.guidance() {
            Some(guidance) => format!("{} {}", err, guidance),
            None => err.to_string(),
        };
        self.host.notify(err.notice_level(), &message);
    }

    fn reported<T>(&self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    // Commands

    /// Run the command registered under `id`
    pub async fn execute_command(&mut self, id: &str) -> Result<(), SessionError> {
        self.ensure_active()?;
        let action = match self.commands.get(id) {
            Some(spec) => spec.action.clone(),
            None => {
                let err = SessionError::UnknownCommand(id.to_string());
                self.report(&err);
                return Err(err);
            }
        };
        debug!(command = id, "executing command");

        match action {
            CommandAction::OpenSettings => {
                self.host.open_settings(self.config.config_path());
                Ok(())
            }
            CommandAction::RefreshPrompts => self.refresh_prompts().map(|_| ()),
            CommandAction::ProcessDocument => self.process_document().await.map(|_| ()),
            CommandAction::ShowChat => {
                self.host.reveal_chat();
                Ok(())
            }
            CommandAction::ClearChat => {
                self.clear_chat();
                Ok(())
            }
            CommandAction::TestConnection => self.test_connection().await.map(|_| ()),
            CommandAction::CorrectWithPrompt(prompt_id) => {
                self.correct_with_prompt(&prompt_id).await.map(|_| ())
            }
        }
    }

    /// Correct the current selection (or the whole document) with a prompt
    /// given by id or name. Returns the id of the assistant message.
    pub async fn correct_with_prompt(&mut self, prompt_key: &str) -> Result<Uuid, SessionError> {
        self.ensure_active()?;
        let result = self.run_correction(prompt_key, self.selection).await;
        self.reported(result)
    }

    /// Correct the whole document with the default prompt
    pub async fn process_document(&mut self) -> Result<Uuid, SessionError> {
        self.ensure_active()?;
        let result = match self.find_default_prompt() {
            Ok(prompt) => self.run_correction(&prompt.id, None).await,
            Err(err) => Err(err),
        };
        self.reported(result)
    }

    /// Prompt used by "process document": the configured default, else the first
    pub fn default_prompt(&self) -> Result<NamePromptPair, SessionError> {
        self.reported(self.find_default_prompt())
    }

    fn find_default_prompt(&self) -> Result<NamePromptPair, SessionError> {
        let configured = self.config.settings().default_prompt.as_deref();
        let prompt = match configured {
            Some(key) => self.prompts.resolve(key).ok(),
            None => None,
        }
        .or_else(|| self.prompts.list().first())
        .ok_or_else(|| PromptError::NotFound(configured.unwrap_or("default").to_string()))?;
        Ok(prompt.clone())
    }

    async fn run_correction(
        &mut self,
        prompt_key: &str,
        selection: Option<TextRange>,
    ) -> Result<Uuid, SessionError> {
        let prompt = self
            .prompts
            .resolve(prompt_key)
            .map_err(CorrectionError::from)?
            .clone();

        let request = build_request(
            self.document.id(),
            self.document.text(),
            selection,
            &prompt,
            &self.config.settings().api,
        )?;
        let sent_version = self.document.version();

        let scope = match request.selection_range {
            Some(range) => format!("selection {}", range),
            None => "document".to_string(),
        };
        let user_id = self
            .chat
            .push_user(format!("Correct {} with {}", scope, prompt.name));
        self.post(user_id);

        let mut outcome = CorrectionPhase::Idle;
        let result = self
            .service
            .correct_with_progress(request, |phase| {
                debug!(%phase, "correction phase");
                if phase.is_terminal() {
                    outcome = phase;
                }
            })
            .await;
        self.last_outcome = Some(outcome);

        match result {
            Ok(result) => {
                let id = self
                    .chat
                    .push_correction(&result.request, &result.response, sent_version);
                self.post(id);
                if result.response.is_empty() {
                    self.host
                        .notify(NoticeLevel::Info, "No corrections needed.");
                }
                Ok(id)
            }
            Err(err) => {
                let mut content = format!("Correction failed: {}", err);
                if let Some(guidance) = err.guidance() {
                    content.push('\n');
                    content.push_str(guidance);
                }
                let id = self.chat.push_assistant(content);
                self.post(id);
                Err(err.into())
            }
        }
    }

    fn post(&self, message_id: Uuid) {
        if let Some(message) = self.chat.get(message_id) {
            self.host.post_message(message);
        }
    }

    pub async fn test_connection(&mut self) -> Result<ConnectionReport, SessionError> {
        self.ensure_active()?;
        let result = self
            .service
            .client()
            .test_connection()
            .await
            .map_err(SessionError::from);
        if let Ok(report) = &result {
            self.host.notify(
                NoticeLevel::Info,
                &format!(
                    "Connected to {} ({}) in {} ms",
                    report.endpoint,
                    report.model,
                    report.latency.as_millis()
                ),
            );
        }
        self.reported(result)
    }

    pub fn clear_chat(&mut self) {
        self.chat.clear();
        debug!("chat cleared");
    }

    // Chat actions

    pub fn perform(&mut self, action: ChatAction) -> Result<(), SessionError> {
        match action {
            ChatAction::Apply { message, change } => self.apply_change(message, change),
            ChatAction::Dismiss { message, change } => self.dismiss_change(message, change),
            ChatAction::ApplyAll { message } => self.apply_all(message).map(|_| ()),
            ChatAction::DismissAll { message } => self.dismiss_all(message).map(|_| ()),
        }
    }

    /// Apply one change of a correction card as its own undo step
    pub fn apply_change(&mut self, message: Uuid, index: usize) -> Result<(), SessionError> {
        self.ensure_active()?;
        let result = self
            .apply_indices(message, &[index])
            .and_then(|(_, failures)| match failures.into_iter().next() {
                Some(err) => Err(err.into()),
                None => Ok(()),
            });
        self.reported(result)
    }

    /// Apply every pending change of a card as one undo step
    pub fn apply_all(&mut self, message: Uuid) -> Result<ApplySummary, SessionError> {
        self.ensure_active()?;
        let pending = match self.chat.card(message) {
            Some(card) => card.pending(),
            None => return self.reported(Err(ApplyError::UnknownMessage(message).into())),
        };
        let result = self.apply_indices(message, &pending).map(|(summary, _)| summary);
        if let Ok(summary) = &result {
            if summary.failed > 0 {
                self.host.notify(
                    NoticeLevel::Warning,
                    &format!(
                        "Applied {} of {} corrections; {} no longer match the document.",
                        summary.applied,
                        summary.applied + summary.failed,
                        summary.failed
                    ),
                );
            }
        }
        self.reported(result)
    }

    fn apply_indices(
        &mut self,
        message: Uuid,
        indices: &[usize],
    ) -> Result<(ApplySummary, Vec<ApplyError>), SessionError> {
        let card = self
            .chat
            .card_mut(message)
            .ok_or(ApplyError::UnknownMessage(message))?;

        let mut summary = ApplySummary::default();
        let mut applied = Vec::new();
        let mut failures = Vec::new();

        self.document.begin_group();
        for &index in indices {
            match apply_card_change(&mut self.document, card, index) {
                Ok(_) => {
                    applied.push(index);
                    summary.applied += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    failures.push(err);
                }
            }
        }
        self.document.end_group(Some(EditTag {
            message_id: message,
            changes: applied,
        }));

        info!(
            message = %message,
            applied = summary.applied,
            failed = summary.failed,
            "corrections applied"
        );
        Ok((summary, failures))
    }

    pub fn dismiss_change(&mut self, message: Uuid, index: usize) -> Result<(), SessionError> {
        self.ensure_active()?;
        let result = self
            .chat
            .card_mut(message)
            .ok_or(ApplyError::UnknownMessage(message))
            .and_then(|card| card.dismiss(index))
            .map_err(SessionError::from);
        self.reported(result)
    }

    /// Dismiss every pending change of a card. Returns how many were dismissed.
    pub fn dismiss_all(&mut self, message: Uuid) -> Result<usize, SessionError> {
        self.ensure_active()?;
        let result = match self.chat.card_mut(message) {
            Some(card) => {
                let pending = card.pending();
                pending
                    .iter()
                    .try_for_each(|&index| card.dismiss(index))
                    .map(|_| pending.len())
                    .map_err(SessionError::from)
            }
            None => Err(ApplyError::UnknownMessage(message).into()),
        };
        self.reported(result)
    }

    /// Undo the last document edit. Changes it applied go back to pending.
    pub fn undo(&mut self) -> bool {
        let Some(step) = self.document.undo() else {
            return false;
        };
        if let Some(tag) = step.tag {
            if let Some(card) = self.chat.card_mut(tag.message_id) {
                for &index in tag.changes.iter().rev() {
                    card.revert(index);
                }
            }
        }
        true
    }

    /// Redo the last undone edit. Its changes are marked applied again.
    pub fn redo(&mut self) -> bool {
        let Some(step) = self.document.redo() else {
            return false;
        };
        if let Some(tag) = step.tag {
            if let Some(card) = self.chat.card_mut(tag.message_id) {
                for &index in &tag.changes {
                    card.reapply(index);
                }
            }
        }
        true
    }

    // Prompts and settings

    /// Reload the settings file and rebuild prompts, commands and the client
    pub fn refresh_prompts(&mut self) -> Result<usize, SessionError> {
        self.ensure_active()?;
        let result = self.reload_settings();
        if let Ok(count) = &result {
            self.host
                .notify(NoticeLevel::Info, &format!("Loaded {} prompts.", count));
        }
        self.reported(result)
    }

    fn reload_settings(&mut self) -> Result<usize, SessionError> {
        if self.config.config_exists() {
            self.config.reload()?;
        }
        self.prompts = PromptManager::from_stored(self.config.settings().prompts.clone());
        self.config.set_prompts(self.prompts.list().to_vec());
        self.commands.refresh_prompt_commands(self.prompts.list());
        self.chat
            .set_max_messages(self.config.settings().chat.max_messages);
        let api = self.config.settings().api.clone();
        self.service.client_mut().update_settings(api);
        Ok(self.prompts.len())
    }

    pub fn add_prompt(
        &mut self,
        name: &str,
        prompt: &str,
        description: Option<&str>,
    ) -> Result<NamePromptPair, SessionError> {
        self.ensure_active()?;
        let result = self
            .prompts
            .add(name, prompt, description)
            .map(Clone::clone)
            .map_err(SessionError::from);
        self.after_prompt_change(result)
    }

    pub fn update_prompt(
        &mut self,
        key: &str,
        patch: PromptPatch,
    ) -> Result<NamePromptPair, SessionError> {
        self.ensure_active()?;
        let result = self
            .prompts
            .update(key, patch)
            .map(Clone::clone)
            .map_err(SessionError::from);
        self.after_prompt_change(result)
    }

    pub fn remove_prompt(&mut self, key: &str) -> Result<NamePromptPair, SessionError> {
        self.ensure_active()?;
        let result = self.prompts.remove(key).map_err(SessionError::from);
        self.after_prompt_change(result)
    }

    pub fn reset_prompts(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.prompts.reset_to_defaults();
        self.after_prompt_change(Ok(()))
    }

    pub fn import_prompts(&mut self, json: &str) -> Result<usize, SessionError> {
        self.ensure_active()?;
        let result = self.prompts.import_json(json).map_err(SessionError::from);
        self.after_prompt_change(result)
    }

    pub fn export_prompts(&self) -> Result<String, SessionError> {
        Ok(self.prompts.export_json()?)
    }

    fn after_prompt_change<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if result.is_ok() {
            self.config.set_prompts(self.prompts.list().to_vec());
            self.commands.refresh_prompt_commands(self.prompts.list());
            self.settings_dirty = true;
        }
        self.reported(result)
    }

    /// Replace the stored API settings. New requests use them with any
    /// environment overrides still on top.
    pub fn update_api_settings(&mut self, api: ApiSettings) {
        self.config.edit(|settings| settings.api = api);
        let effective = self.config.settings().api.clone();
        self.service.client_mut().update_settings(effective);
        self.settings_dirty = true;
    }

    /// Write the settings file now
    pub fn save_settings(&mut self) -> Result<(), SessionError> {
        let result = self.save_settings_inner();
        self.reported(result)
    }

    fn save_settings_inner(&mut self) -> Result<(), SessionError> {
        self.config.save_config()?;
        self.settings_dirty = false;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Active && self.settings_dirty {
            warn!("session dropped without dispose; unsaved settings discarded");
        }
    }
}
