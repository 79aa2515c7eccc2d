//! Label command implementation.

use crate::cli::LabelArgs;
use crate::commands::load_oppgave;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use saksflyt_domain::OppgaveRepository;
use saksflyt_store::SqliteStore;

/// Execute the label command.
pub fn execute_label(args: LabelArgs, store: &mut SqliteStore, formatter: &Formatter) -> Result<()> {
    let label = args.label.trim();
    if label.is_empty() {
        return Err(CliError::InvalidInput("Label must not be empty".to_string()));
    }

    let mut oppgave = load_oppgave(store, &args.oppgave)?;
    let changed = if args.remove {
        oppgave.remove_label(label)
    } else {
        oppgave.add_label(label)
    };

    if !changed {
        println!("{}", formatter.info("Labels unchanged"));
        return Ok(());
    }

    store.save(&mut oppgave)?;
    let verb = if args.remove { "Removed" } else { "Added" };
    println!("{}", formatter.success(&format!("{} label '{}'", verb, label)));
    Ok(())
}
