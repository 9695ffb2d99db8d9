//! Sweep command
//!
//! Delete expired sessions outside of the request path.

use super::config::AppConfig;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Server name selecting the session directory when no database is used
    #[arg(long, default_value = "localhost")]
    pub server_name: String,
}

/// Execute the sweep command
pub fn execute(args: SweepArgs, app: &AppConfig) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    let removed = if app.session.use_database {
        let store = super::open_store(app)?;
        store.ensure_schema()?;
        store.sweep_expired(now)?
    } else {
        super::open_fallback(app, &args.server_name)?.sweep(now)?
    };

    println!(
        "{} Removed {} expired session{}",
        "✓".green(),
        removed,
        if removed == 1 { "" } else { "s" }
    );
    Ok(())
}
