//! Config command
//!
//! Manage session-keeper configuration.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use sk_core::config::SessionConfig;
use sk_storage::DatabaseConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show {
        /// Show as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file without confirmation
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration
    Validate,
}

/// Full CLI configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session manager options
    pub session: SessionConfig,
    /// SQLite database options
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid configuration TOML")?;
        config.session.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to load {}", path.display()))
    }
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => show_config(config_path, json),
        ConfigCommand::Init { force } => init_config(config_path, force),
        ConfigCommand::Validate => validate_config(config_path),
    }
}

/// Project-local configuration file
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".session-keeper/config.toml")
}

fn show_config(config_path: &Path, as_json: bool) -> Result<()> {
    use colored::Colorize;

    let config = AppConfig::load_or_default(config_path)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}", "Configuration:".bold().underline());
    if config_path.exists() {
        println!("{}", config_path.display().to_string().dimmed());
    } else {
        println!("{}", "(defaults, no configuration file)".dimmed());
    }
    println!();
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(config_path: &Path, force: bool) -> Result<()> {
    use colored::Colorize;

    if config_path.exists() {
        if !force {
            use dialoguer::Confirm;

            let confirmed = Confirm::new()
                .with_prompt(format!("Overwrite {}?", config_path.display()))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("Init cancelled.");
                return Ok(());
            }
        }

        let backup_path = format!(
            "{}.backup-{}",
            config_path.display(),
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );
        fs::copy(config_path, &backup_path)?;
        println!("{} Backed up to {}", "✓".green(), backup_path);
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = format!(
        "# session-keeper configuration\n\n{}",
        toml::to_string_pretty(&AppConfig::default())?
    );
    fs::write(config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green(),
        config_path.display()
    );
    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    use colored::Colorize;

    if !config_path.exists() {
        bail!("Configuration not found at {}", config_path.display());
    }

    let content = fs::read_to_string(config_path)?;
    match AppConfig::from_toml_str(&content) {
        Ok(config) => {
            println!("{} Configuration is valid", "✓".green());

            let table: toml::Value = toml::from_str(&content)?;
            for section in ["session", "database"] {
                if table.get(section).is_none() {
                    println!("{} [{}] section not found, using defaults", "⚠".yellow(), section);
                }
            }
            if !config.session.use_database && !config.session.tmp_directory.enabled {
                println!(
                    "{} Database disabled; sessions go to {}",
                    "⚠".yellow(),
                    sk_storage::default_save_path().display()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            bail!("Configuration is invalid")
        }
    }
}
