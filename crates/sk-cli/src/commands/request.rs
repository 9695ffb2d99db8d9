//! Request command
//!
//! Run one request through the session lifecycle: resolve the session from
//! the inbound cookie, apply the requested changes, and flush.

use super::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};
use sk_core::session::{DiagnosticsReport, SessionManager};
use sk_core::transport::{MemoryTransport, RequestContext};
use sk_core::types::NetworkIdentity;
use std::fs::OpenOptions;
use std::io::Write;

/// Arguments for the request command
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Inbound session cookie value
    #[arg(long)]
    pub cookie: Option<String>,

    /// Client IP address
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: String,

    /// Proxy address the request came through
    #[arg(long, default_value = "")]
    pub proxy: String,

    /// Server name the request was addressed to
    #[arg(long, default_value = "localhost")]
    pub server_name: String,

    /// Request arrived over HTTPS
    #[arg(long)]
    pub https: bool,

    /// Store a value in the session (key=value, value parsed as JSON when possible)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, Value)>,

    /// Mark the session as remembered
    #[arg(long)]
    pub remember: bool,

    /// Attach an authenticated user
    #[arg(long)]
    pub user_id: Option<String>,

    /// Append diagnostics to the configured log file
    #[arg(long)]
    pub log: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the request command
pub fn execute(args: RequestArgs, app: &AppConfig) -> Result<()> {
    let backend = super::open_backend(app, &args.server_name)?;
    let identity = if args.proxy.is_empty() {
        NetworkIdentity::direct(&args.ip)
    } else {
        NetworkIdentity::proxied(&args.ip, &args.proxy)
    };
    let context = RequestContext::new(&args.server_name, identity).encrypted(args.https);

    let mut manager = SessionManager::new(app.session.clone(), backend, context)?;
    let mut transport = MemoryTransport::new();
    if let Some(cookie) = &args.cookie {
        transport = transport.with_cookie(&app.session.session_name, cookie);
    }

    let sid = manager.init(&mut transport)?.clone();

    let flushed = {
        let mut session = manager.scoped();
        let state = session.state_mut();
        for (key, value) in args.set {
            state.insert_value(key, value);
        }
        if args.remember {
            state.set_remember(true);
        }
        if let Some(user_id) = args.user_id {
            state.set_user_id(user_id);
        }
        session.finish()
    };

    let report = manager.diagnostics();
    if args.log {
        append_log(&report).context("Failed to write session log")?;
    }

    if args.json {
        let output = json!({
            "session_id": sid,
            "persisted": flushed.is_ok(),
            "database": manager.is_database_backed(),
            "ttl": manager.ttl().as_secs(),
            "headers": transport.response_headers(),
            "state": manager.state(),
            "diagnostics": report.entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", "Session:".bold(), sid.to_string().green());
    for (name, value) in transport.response_headers() {
        println!("{}: {}", name.cyan(), value);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(manager.state())?);

    match flushed {
        Ok(()) => println!("{} Session saved", "✓".green()),
        Err(e) => eprintln!("{} Session not persisted: {}", "⚠".yellow(), e),
    }
    if !report.entries.is_empty() && !args.log {
        for entry in &report.entries {
            eprintln!("  {}", entry.dimmed());
        }
    }

    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, Value)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(anyhow!("empty key in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn append_log(report: &DiagnosticsReport) -> Result<()> {
    if report.entries.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report.destination)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    for entry in &report.entries {
        writeln!(file, "[{}] {}", stamp, entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("lang=en").unwrap(),
            ("lang".to_string(), Value::String("en".into()))
        );
        assert_eq!(
            parse_key_value("cart=[1,2]").unwrap(),
            ("cart".to_string(), json!([1, 2]))
        );
        assert_eq!(
            parse_key_value("expr=a=b").unwrap(),
            ("expr".to_string(), Value::String("a=b".into()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_append_log() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("session.log");
        let report = DiagnosticsReport {
            entries: vec!["Session INIT".into(), "Session ID: abc".into()],
            destination: destination.to_string_lossy().into_owned(),
        };

        append_log(&report).unwrap();
        append_log(&report).unwrap();

        let content = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.lines().all(|l| l.starts_with('[')));
    }
}
