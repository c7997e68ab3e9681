//! stacks CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success, or an outcome that needs no action (stack already exists,
//!   no updates to perform, stack already deleted)
//! - 1: Any other error, or a followed change that ended failed or rolled back

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod table;

use commands::{Cli, Commands};

/// Process exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
}

/// Log directives when `RUST_LOG` is unset.
const DEFAULT_LOG: &str = "stacks=info,warn";
const DEBUG_LOG: &str = "stacks=debug,warn";

/// `RUST_LOG` replaces the default directives; `--debug` always raises stacks to debug.
fn log_directives(debug: bool, rust_log: Option<&str>) -> String {
    let from_env = rust_log
        .map(str::trim)
        .filter(|directives| !directives.is_empty());
    match (from_env, debug) {
        (Some(directives), true) => format!("{},stacks=debug", directives),
        (Some(directives), false) => directives.to_string(),
        (None, true) => DEBUG_LOG.to_string(),
        (None, false) => DEFAULT_LOG.to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = log_directives(cli.global.debug, rust_log.as_deref());
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    tokio::select! {
        code = run(cli) => ExitCode::from(code),
        name = shutdown_signal() => {
            println!("Signal {} received. Stopping.", name);
            ExitCode::from(ExitCodes::SUCCESS)
        }
    }
}

async fn run(cli: Cli) -> u8 {
    let global = cli.global;
    let result = match cli.command {
        Commands::Create(args) => commands::deploy::execute_create(args, &global).await,
        Commands::Update(args) => commands::deploy::execute_update(args, &global).await,
        Commands::Delete(args) => commands::delete::execute(args, &global).await,
        Commands::Events(args) => commands::events::execute(args, &global).await,
        Commands::List(args) => commands::list::execute(args, &global).await,
        Commands::Outputs(args) => commands::outputs::execute(args, &global).await,
        Commands::Resources(args) => commands::resources::execute(args, &global).await,
        Commands::Config(args) => commands::config::execute(args, &global),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCodes::FAILURE
        }
    }
}

/// Resolve with the name of the first termination signal received.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    match wait_for_signal().await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!("Cannot listen for signals: {}", e);
            std::future::pending().await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    })
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(_) => std::future::pending().await,
    }
}
