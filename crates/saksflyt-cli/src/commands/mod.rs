//! Command implementations.

pub mod answer;
pub mod demo;
pub mod init;
pub mod label;
pub mod log;
pub mod show;
pub mod transition;

pub use self::answer::execute_answer;
pub use self::demo::execute_demo;
pub use self::init::execute_init;
pub use self::label::execute_label;
pub use self::log::execute_log;
pub use self::show::{execute_list, execute_show};
pub use self::transition::execute_transition;

use crate::error::{CliError, Result};
use saksflyt_domain::{Oppgave, OppgaveId, OppgaveRepository};
use saksflyt_store::SqliteStore;

/// Load an oppgave by its id as typed on the command line.
pub(crate) fn load_oppgave(store: &SqliteStore, raw: &str) -> Result<Oppgave> {
    let id = OppgaveId::from_string(raw.trim())
        .map_err(|e| CliError::InvalidInput(format!("Invalid oppgave ID '{}': {}", raw, e)))?;
    store
        .load(id)?
        .ok_or_else(|| CliError::InvalidInput(format!("No oppgave with ID {}", id)))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::TilgangConfig;
    use saksflyt_store::SqliteStore;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    pub const SAKSBEHANDLER: &str = "Z111111";
    pub const BESLUTTER: &str = "Z222222";

    pub fn store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("saksflyt.db")).unwrap();
        (dir, store)
    }

    pub fn tilgang() -> TilgangConfig {
        TilgangConfig {
            saksbehandlere: BTreeSet::from([SAKSBEHANDLER.to_string()]),
            besluttere: BTreeSet::from([BESLUTTER.to_string()]),
        }
    }
}
