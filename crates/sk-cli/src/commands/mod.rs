//! CLI commands module
//!
//! This module contains all CLI command implementations.

pub mod config;
pub mod request;
pub mod show;
pub mod sweep;
pub mod token;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use sk_core::session::SessionBackend;
use sk_core::store::{Dialect, SessionStore};
use sk_storage::FileSystemFallback;
use std::sync::Arc;

/// session-keeper - Cookie-bound server-side sessions
#[derive(Debug, Parser)]
#[command(name = "session-keeper")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SESSION_KEEPER_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one request through the session lifecycle
    Request(request::RequestArgs),

    /// Delete expired sessions
    Sweep(sweep::SweepArgs),

    /// Show a stored session
    Show(show::ShowArgs),

    /// Mint session identifiers
    Token(token::TokenArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(config::ConfigCommand),
}

/// Run the CLI application
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Request(args) => request::execute(args, &AppConfig::load_or_default(&config_path)?),
        Commands::Sweep(args) => sweep::execute(args, &AppConfig::load_or_default(&config_path)?),
        Commands::Show(args) => show::execute(args, &AppConfig::load_or_default(&config_path)?),
        Commands::Token(args) => token::execute(args),
        Commands::Config(cmd) => config::execute(cmd, &config_path),
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the shared session store for the configured database
pub(crate) fn open_store(app: &AppConfig) -> Result<Arc<SessionStore>> {
    if app.session.dialect != Dialect::Sqlite {
        bail!(
            "Dialect {:?} has no client here; only sqlite databases can be opened",
            app.session.dialect
        );
    }
    let path = app.database.resolved_path();
    let client = app
        .database
        .open()
        .with_context(|| format!("Failed to open session database {}", path.display()))?;
    Ok(Arc::new(SessionStore::from_config(Arc::new(client), &app.session)))
}

/// Open the file fallback for `server_name`
pub(crate) fn open_fallback(app: &AppConfig, server_name: &str) -> Result<FileSystemFallback> {
    FileSystemFallback::from_config(&app.session.tmp_directory, server_name)
        .context("Failed to prepare session directory")
}

/// Persistence backend for one request
pub(crate) fn open_backend(app: &AppConfig, server_name: &str) -> Result<SessionBackend> {
    if app.session.use_database {
        Ok(SessionBackend::Database(open_store(app)?))
    } else {
        Ok(SessionBackend::Files(Arc::new(open_fallback(app, server_name)?)))
    }
}
