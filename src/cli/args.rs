//! CLI argument parsing
//!
//! ```text
//! prosefix [--config PATH] [--log-level LEVEL] [--log-dir DIR] <command>
//! ```

use clap::{Parser, Subcommand};
use prosefix_core::TextRange;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "prosefix")]
#[command(
    about = "Grammar, style and tone corrections from an OpenAI-compatible endpoint",
    version
)]
pub struct Args {
    /// Settings file (TOML, JSON or YAML by extension)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides the settings file)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write JSON logs to a daily rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Correct a file (or stdin) with a prompt
    Correct {
        /// Prompt name or id
        #[arg(short, long)]
        prompt: Option<String>,

        /// Input file; stdin when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Character range START..END to correct instead of the whole text
        #[arg(short, long, value_name = "START..END", value_parser = parse_range)]
        selection: Option<TextRange>,

        /// Apply every suggestion and print the corrected text
        #[arg(long)]
        apply: bool,

        /// Write the corrected text here instead of stdout (implies --apply)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage correction prompts
    Prompts {
        #[command(subcommand)]
        action: PromptsCommand,
    },

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Send a minimal request to the configured endpoint
    TestConnection,

    /// List the command table the engine exposes to a host
    Commands,
}

#[derive(Debug, Subcommand)]
pub enum PromptsCommand {
    /// List prompts
    List,

    /// Add a prompt
    Add {
        name: String,
        prompt: String,
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Update a prompt by name or id
    Update {
        key: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a prompt by name or id
    Remove { key: String },

    /// Replace all prompts with the built-in defaults
    Reset,

    /// Print prompts as JSON
    Export,

    /// Merge prompts from a JSON file
    Import { file: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the settings file location
    Path,

    /// Print the effective settings (API key masked)
    Show,

    /// Write a settings file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the API settings
    Validate,
}

fn parse_range(s: &str) -> Result<TextRange, String> {
    s.parse()
}
