//! Show and list command implementations.

use crate::cli::OppgaveArgs;
use crate::commands::load_oppgave;
use crate::error::Result;
use crate::output::Formatter;
use saksflyt_domain::OppgaveRepository;
use saksflyt_store::SqliteStore;

/// Execute the show command.
pub fn execute_show(args: OppgaveArgs, store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    let oppgave = load_oppgave(store, &args.oppgave)?;
    println!("{}", formatter.format_oppgave(&oppgave)?);
    Ok(())
}

/// Execute the list command.
pub fn execute_list(store: &SqliteStore, formatter: &Formatter) -> Result<()> {
    let oppgaver = store
        .list()?
        .into_iter()
        .filter_map(|id| store.load(id).transpose())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    println!("{}", formatter.format_oppgaver(&oppgaver)?);
    Ok(())
}
