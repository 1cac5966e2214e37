//! devfixture - snapshot and restore a development database with its media

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

mod cli;
mod output;

use std::process;

use cli::{build_cli, run_command, CliArgs};
use output::OutputFormat;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse errors exit 2; help and version exit 0.
#[allow(clippy::exit)]
#[allow(clippy::print_stdout)]
fn parse_args() -> CliArgs {
    let json = std::env::args().any(|arg| arg == "--json");
    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) || !json
            {
                e.exit();
            }
            let body = serde_json::json!({
                "success": false,
                "error": {
                    "code": "INVALID_ARGUMENT",
                    "message": e.to_string(),
                    "exit_code": 2,
                }
            });
            println!("{body:#}");
            process::exit(2);
        }
    };

    match CliArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(err) => {
            output::print_failure("devfixture", &err, OutputFormat::from_json_flag(json));
            process::exit(2);
        }
    }
}

#[allow(clippy::exit)]
fn main() {
    let args = parse_args();
    init_tracing(args.log_level());

    let action = args.action.clone();
    let format = args.format;
    if let Err(err) = run_command(args) {
        tracing::debug!(error = ?err, "{action} failed");
        output::print_failure(&action, &err, format);
        process::exit(output::exit_code(&err));
    }
}
