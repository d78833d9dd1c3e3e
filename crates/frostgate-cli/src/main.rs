// frostgate-cli/src/main.rs
// ============================================================================
// Module: FrostGate CLI Entry Point
// Description: Process entry point wiring config, store, and server together.
// Purpose: Resolve configuration from the environment, open the decision
//          store, and run the HTTP server until it exits or fails to bind.
// Dependencies: clap, frostgate-config, frostgate-server, frostgate-store,
//               tokio
// ============================================================================

//! ## Overview
//! FrostGate Core has one mode of operation, so the CLI has no subcommand
//! enum: it parses a handful of `serve`-scoped flags, resolves the rest of
//! its configuration from `FG_*` environment variables (see
//! [`frostgate_config::resolve_from`]), and runs the server until the
//! process is signaled to stop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use frostgate_config::ConfigOverrides;
use frostgate_server::AppState;
use frostgate_server::audit::AuditSink;
use frostgate_server::audit::FileAuditSink;
use frostgate_server::audit::StderrAuditSink;
use frostgate_store::DecisionStore;
use frostgate_store::SqliteStoreConfig;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// FrostGate Core: a per-event security decision service.
#[derive(Parser, Debug)]
#[command(name = "frostgate", disable_help_subcommand = true)]
struct Cli {
    /// Override the resolved SQLite database path.
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
    /// Override the resolved HTTP bind address (e.g. `0.0.0.0:8080`).
    #[arg(long, value_name = "ADDR")]
    bind_addr: Option<String>,
    /// Force authentication on or off, overriding `FG_AUTH_ENABLED`/`FG_API_KEY`.
    #[arg(long, value_name = "BOOL")]
    auth_enabled: Option<bool>,
    /// Write audit events to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    audit_log: Option<PathBuf>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => emit_error(&message),
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides { auth_enabled: cli.auth_enabled };
    let (mut config, warnings) =
        frostgate_config::from_env(overrides).map_err(|err| format!("config error: {err}"))?;
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr;
    }
    if warnings.api_key_defaulted && config.is_prod() {
        write_stderr_line(
            "warning: FG_API_KEY unset in a prod environment; using the dev-only default",
        );
    }

    let store = DecisionStore::open(&SqliteStoreConfig::new(config.db_path.clone()))
        .map_err(|err| format!("store error: {err}"))?;

    let audit: Arc<dyn AuditSink> = match cli.audit_log {
        Some(path) => Arc::new(
            FileAuditSink::open(&path).map_err(|err| format!("audit log error: {err}"))?,
        ),
        None => Arc::new(StderrAuditSink),
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, store, audit);
    write_stderr_line(&format!("frostgate-core listening on {bind_addr}"));
    frostgate_server::serve(state).await.map_err(|err| format!("server error: {err}"))
}

/// Writes a line to stderr, ignoring write failures (there is nowhere left
/// to report them).
fn write_stderr_line(message: &str) {
    let _ = writeln!(std::io::stderr(), "{message}");
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    write_stderr_line(message);
    ExitCode::FAILURE
}
