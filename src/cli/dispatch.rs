//! CLI command dispatch
//!
//! The CLI plays the host editor: it builds a session over the input text,
//! runs one command and disposes the session.

use crate::cli::args::{Command, ConfigCommand, PromptsCommand};
use crate::document::Document;
use crate::host::ConsoleHost;
use crate::session::Session;
use anyhow::{bail, Context, Result};
use prosefix_core::{default_prompts, ConfigManager, PromptPatch, Settings};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Open the settings file named on the command line, or the default one
pub fn load_config(path: Option<&Path>) -> Result<ConfigManager> {
    match path {
        Some(path) => ConfigManager::with_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => ConfigManager::new().context("Failed to load settings"),
    }
}

/// Run one command against `config`
pub async fn run_command(command: Command, config: ConfigManager) -> Result<()> {
    match command {
        Command::Correct {
            prompt,
            file,
            selection,
            apply,
            output,
        } => {
            let apply = apply || output.is_some();
            let (id, text) = read_input(file.as_deref())?;
            let host = Arc::new(ConsoleHost { echo_chat: !apply });
            let mut session = Session::init(config, Document::new(id, text), host);
            session.set_selection(selection);

            let prompt_id = match prompt {
                Some(key) => key,
                None => session.default_prompt()?.id,
            };
            let message = session.correct_with_prompt(&prompt_id).await?;

            if apply {
                let summary = session.apply_all(message)?;
                info!(applied = summary.applied, failed = summary.failed, "applied corrections");
                eprintln!(
                    "Applied {} correction(s){}",
                    summary.applied,
                    if summary.failed > 0 {
                        format!(", {} skipped", summary.failed)
                    } else {
                        String::new()
                    }
                );
                match output {
                    Some(path) => std::fs::write(&path, session.document().text())
                        .with_context(|| format!("Failed to write {}", path.display()))?,
                    None => print!("{}", session.document().text()),
                }
            }
            session.dispose()?;
        }

        Command::Prompts { action } => {
            let mut session = headless_session(config);
            run_prompts(&mut session, action)?;
            session.dispose()?;
        }

        Command::Config { action } => run_config(action, config)?,

        Command::TestConnection => {
            let mut session = headless_session(config);
            let report = session.test_connection().await?;
            println!("Endpoint: {}", report.endpoint);
            println!("Model:    {}", report.model);
            println!("Latency:  {} ms", report.latency.as_millis());
            println!("Reply:    {}", report.reply);
            session.dispose()?;
        }

        Command::Commands => {
            let mut session = headless_session(config);
            for spec in session.commands().iter() {
                println!("{:<48} {}", spec.id, spec.title);
            }
            session.dispose()?;
        }
    }
    Ok(())
}

fn headless_session(config: ConfigManager) -> Session {
    Session::init(
        config,
        Document::new("untitled", ""),
        Arc::new(ConsoleHost::default()),
    )
}

fn read_input(file: Option<&Path>) -> Result<(String, String)> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((path.display().to_string(), text))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(("stdin".to_string(), text))
        }
    }
}

fn run_prompts(session: &mut Session, action: PromptsCommand) -> Result<()> {
    match action {
        PromptsCommand::List => {
            for prompt in session.prompts().list() {
                println!(
                    "{:<20} {}  {}",
                    prompt.name,
                    prompt.id,
                    prompt.description.as_deref().unwrap_or("")
                );
            }
        }
        PromptsCommand::Add {
            name,
            prompt,
            description,
        } => {
            let added = session.add_prompt(&name, &prompt, description.as_deref())?;
            println!("Added '{}' ({})", added.name, added.id);
        }
        PromptsCommand::Update {
            key,
            name,
            prompt,
            description,
        } => {
            let patch = PromptPatch {
                name,
                prompt,
                description: description.map(|d| Some(d).filter(|d| !d.trim().is_empty())),
            };
            let updated = session.update_prompt(&key, patch)?;
            println!("Updated '{}'", updated.name);
        }
        PromptsCommand::Remove { key } => {
            let removed = session.remove_prompt(&key)?;
            println!("Removed '{}'", removed.name);
        }
        PromptsCommand::Reset => {
            session.reset_prompts()?;
            println!("Restored {} default prompts", session.prompts().len());
        }
        PromptsCommand::Export => println!("{}", session.export_prompts()?),
        PromptsCommand::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let added = session.import_prompts(&json)?;
            println!("Imported {} prompt(s)", added);
        }
    }
    Ok(())
}

fn run_config(action: ConfigCommand, config: ConfigManager) -> Result<()> {
    match action {
        ConfigCommand::Path => println!("{}", config.config_path().display()),
        ConfigCommand::Show => {
            let mut settings = config.settings().clone();
            settings.api.api_key = mask_key(&settings.api.api_key);
            let masked = ConfigManager::in_memory(config.config_path(), settings);
            print!("{}", masked.render()?);
        }
        ConfigCommand::Init { force } => {
            if config.config_exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    config.config_path().display()
                );
            }
            let settings = Settings {
                prompts: default_prompts(),
                ..Settings::default()
            };
            ConfigManager::in_memory(config.config_path(), settings).save_config()?;
            println!("Wrote {}", config.config_path().display());
        }
        ConfigCommand::Validate => {
            let problems = config.validate();
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("  - {}", problem);
                }
                bail!(crate::error::CorrectionError::Configuration(problems));
            }
            println!("Settings OK");
        }
    }
    Ok(())
}

/// Hide all but the last four characters of a key
pub fn mask_key(key: &str) -> String {
    if key.is_empty() || key.starts_with("env:") {
        return key.to_string();
    }
    let count = key.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
