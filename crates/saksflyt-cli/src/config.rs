//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use saksflyt_domain::{Aktor, BehandlingId, Rolle, Tilgangskontroll};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file; relative paths resolve against the config directory
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Default tracing filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Who may act on cases
    #[serde(default)]
    pub tilgang: TilgangConfig,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

/// Role lists by actor ident.
///
/// Every beslutter may also work cases as a saksbehandler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilgangConfig {
    /// Case workers
    #[serde(default)]
    pub saksbehandlere: BTreeSet<String>,

    /// Controllers
    #[serde(default)]
    pub besluttere: BTreeSet<String>,
}

impl Tilgangskontroll for TilgangConfig {
    fn roller(&self, _behandling: BehandlingId, aktor: &Aktor) -> BTreeSet<Rolle> {
        let mut roller = BTreeSet::new();
        if self.besluttere.contains(aktor.ident()) {
            roller.insert(Rolle::Beslutter);
            roller.insert(Rolle::Saksbehandler);
        }
        if self.saksbehandlere.contains(aktor.ident()) {
            roller.insert(Rolle::Saksbehandler);
        }
        roller
    }
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".saksflyt").join("config.toml"))
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Database file for a config loaded from `config_path`.
    pub fn database_file(&self, config_path: &Path) -> PathBuf {
        if self.database_path.is_absolute() || self.database_path.as_os_str() == ":memory:" {
            return self.database_path.clone();
        }
        match config_path.parent() {
            Some(dir) => dir.join(&self.database_path),
            None => self.database_path.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_filter: default_log_filter(),
            settings: Settings::default(),
            tilgang: TilgangConfig::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("saksflyt.db")
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
