//! CLI module
//!
//! Provides:
//! - Argument parsing (clap)
//! - Logging setup
//! - Command dispatch through a `Session`

pub mod args;
pub mod dispatch;
pub mod logging;

pub use args::{Args, Command, ConfigCommand, PromptsCommand};
pub use dispatch::{load_config, run_command};
pub use logging::init_logging;

use crate::error::CorrectionError;
use crate::session::SessionError;

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_API_ERROR: i32 = 3;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Load settings, install logging, run the command and map the outcome to an exit code
pub async fn run(args: Args) -> ExitCode {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings().log_level.clone());
    let _guard = init_logging(&level, args.log_dir.as_deref());

    match run_command(args.command, config).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            // Session errors were already shown through the host
            if e.downcast_ref::<SessionError>().is_none() {
                eprintln!("Error: {:#}", e);
            }
            exit_code_for(&e)
        }
    }
}

/// Map an error to its exit code
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let kind = if let Some(err) = err.downcast_ref::<SessionError>() {
        err.kind()
    } else if let Some(err) = err.downcast_ref::<CorrectionError>() {
        err.kind()
    } else {
        return EXIT_FAILURE;
    };
    match kind {
        "configuration" => EXIT_CONFIG_ERROR,
        "network" | "http" | "schema" => EXIT_API_ERROR,
        _ => EXIT_FAILURE,
    }
}
