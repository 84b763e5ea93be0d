//! prosefix CLI
//!
//! Runs one engine command per invocation:
//! - `correct` sends a file or stdin through a prompt and shows the suggestions
//! - `prompts` manages the named prompt set
//! - `config` inspects or creates the settings file
//! - `test-connection` and `commands` mirror the host command table

use clap::Parser;
use prosefix::cli::{self, Args};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let code = cli::run(args).await;
    ExitCode::from(code as u8)
}
