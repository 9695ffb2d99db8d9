//! Show command
//!
//! Print a stored session.

use super::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, TimeZone};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use sk_core::store::FallbackStore;
use sk_core::types::{ip_from_u32, SessionId};

/// Arguments for the show command
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Session ID
    pub id: String,

    /// Server name selecting the session directory when no database is used
    #[arg(long, default_value = "localhost")]
    pub server_name: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the show command
pub fn execute(args: ShowArgs, app: &AppConfig) -> Result<()> {
    let sid = SessionId::from_string(args.id.trim()).context("Invalid session id")?;
    let now = chrono::Utc::now().timestamp();

    if !app.session.use_database {
        let fallback = super::open_fallback(app, &args.server_name)?;
        let state = fallback
            .load(&sid, now)?
            .ok_or_else(|| anyhow!("Session not found: {}", sid))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&json!({ "sid": sid, "state": state }))?);
        } else {
            println!("{}", sid.to_string().green());
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        return Ok(());
    }

    let store = super::open_store(app)?;
    store.ensure_schema()?;
    let record = store
        .load(&sid)?
        .ok_or_else(|| anyhow!("Session not found: {}", sid))?;
    let state = record.state();

    if args.json {
        let output = json!({
            "sid": record.sid,
            "user_id": record.user_id,
            "user_ip": ip_from_u32(record.user_ip),
            "session_start": record.started_at,
            "session_end": record.ends_at,
            "session_last": record.last_seen_at,
            "expired": record.is_expired(now),
            "state": state,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", record.sid.to_string().green());
    if !record.user_id.is_empty() {
        println!("  User: {}", record.user_id);
    }
    println!("  IP: {}", ip_from_u32(record.user_ip));
    println!("  Started: {}", format_time(record.started_at));
    println!("  Last seen: {}", format_time(record.last_seen_at));
    if record.is_expired(now) {
        println!("  Ends: {} {}", format_time(record.ends_at), "(expired)".red());
    } else {
        println!("  Ends: {}", format_time(record.ends_at));
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}

fn format_time(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|t: DateTime<Local>| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0).len(), 19);
        assert_eq!(format_time(i64::MAX), i64::MAX.to_string());
    }
}
