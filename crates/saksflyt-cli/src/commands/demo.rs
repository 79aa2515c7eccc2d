//! Demo command implementation.

use crate::cli::DemoArgs;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::output::Formatter;
use chrono::Utc;
use saksflyt_domain::{Behandling, DomainError, Oppgave, OppgaveRepository, Sporing, StegGraf};
use saksflyt_store::SqliteStore;

/// The example case: `eligible` depends on `age`, which depends on `income`.
///
/// `income` comes pre-filled from a source questionnaire.
pub fn demo_behandling(person: &str) -> std::result::Result<Behandling, DomainError> {
    let mut graf = StegGraf::new();
    let eligible = graf.add_step::<bool>("eligible")?;
    let age = graf.add_step::<bool>("age")?;
    let income = graf.add_step::<i64>("income")?;
    graf.add_dependency(eligible, age)?;
    graf.add_dependency(age, income)?;

    graf.answer_typed(
        income,
        1000,
        Sporing::kilde(Utc::now(), r#"{"skjema":"soknad","felt":"inntekt","verdi":1000}"#),
    )?;

    Behandling::new(person, graf, [eligible.id()])
}

/// Execute the demo command.
pub fn execute_demo(args: DemoArgs, store: &mut SqliteStore, formatter: &Formatter) -> Result<()> {
    let mut oppgave = Oppgave::opprett(demo_behandling(&args.person)?, Utc::now());
    oppgave.add_label("demo");
    store.save(&mut oppgave)?;

    if formatter.format() == OutputFormat::Table {
        println!("{}", formatter.success(&format!("Created oppgave {}", oppgave.id())));
        println!();
    }
    match formatter.format() {
        OutputFormat::Quiet => println!("{}", oppgave.id()),
        _ => println!("{}", formatter.format_oppgave(&oppgave)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::store;
    use saksflyt_domain::OppgaveTilstand;
    use std::collections::BTreeSet;

    #[test]
    fn test_demo_case_shape() {
        let behandling = demo_behandling("12345678901").unwrap();
        let graf = behandling.graf();
        let eligible = graf.step_by_key("eligible").unwrap().id();
        let age = graf.step_by_key("age").unwrap().id();

        assert_eq!(behandling.all_steps().len(), 3);
        assert_eq!(behandling.frontier(), BTreeSet::from([eligible, age]));
    }

    #[test]
    fn test_demo_is_persisted() {
        let (_dir, mut store) = store();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_demo(DemoArgs { person: "01010112345".into() }, &mut store, &formatter).unwrap();

        let ids = store.list().unwrap();
        assert_eq!(ids.len(), 1);
        let oppgave = store.load(ids[0]).unwrap().unwrap();
        assert_eq!(oppgave.tilstand(), OppgaveTilstand::KlarTilBehandling);
        assert!(oppgave.emneknagger().contains("demo"));
        assert_eq!(oppgave.behandling().person_ident(), "01010112345");
    }
}
