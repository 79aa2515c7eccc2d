//! Init command implementation.

use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use saksflyt_store::SqliteStore;
use std::path::Path;
use tracing::info;

/// Execute the init command.
///
/// Writes the default configuration if none exists and creates the schema.
pub fn execute_init(config: &Config, config_path: &Path, formatter: &Formatter) -> Result<()> {
    if !config_path.exists() {
        config.save_to(config_path)?;
        println!("{}", formatter.success(&format!("Wrote {}", config_path.display())));
    }

    let database = config.database_file(config_path);
    SqliteStore::new(&database)?;
    info!(database = %database.display(), "Schema initialized");
    println!("{}", formatter.success(&format!("Database ready at {}", database.display())));

    if config.tilgang.saksbehandlere.is_empty() && config.tilgang.besluttere.is_empty() {
        println!(
            "{}",
            formatter.warning("No actors configured; add them under [tilgang] in the config file")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;

    #[test]
    fn test_init_creates_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        execute_init(&Config::default(), &config_path, &formatter).unwrap();

        assert!(config_path.exists());
        assert!(dir.path().join("saksflyt.db").exists());

        // Running again leaves the existing setup alone
        execute_init(&Config::default(), &config_path, &formatter).unwrap();
    }
}
