//! Log command implementation.

use crate::cli::OppgaveArgs;
use crate::commands::load_oppgave;
use crate::error::Result;
use crate::output::Formatter;
use saksflyt_store::SqliteStore;

/// Execute the log command.
pub fn execute_log(args: OppgaveArgs, store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    let oppgave = load_oppgave(store, &args.oppgave)?;
    println!("{}", formatter.format_logg(&oppgave)?);
    Ok(())
}
