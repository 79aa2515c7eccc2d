//! Answer command implementation.

use crate::cli::AnswerArgs;
use crate::commands::load_oppgave;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use chrono::Utc;
use saksflyt_domain::{Aktor, OppgaveRepository, Sporing};
use saksflyt_store::SqliteStore;

/// Execute the answer command.
///
/// The value is parsed according to the step's declared type and recorded
/// with manual provenance.
pub fn execute_answer(args: AnswerArgs, store: &mut SqliteStore, formatter: &Formatter) -> Result<()> {
    if args.reason.trim().is_empty() {
        return Err(CliError::InvalidInput("A reason is required".to_string()));
    }

    let mut oppgave = load_oppgave(store, &args.oppgave)?;
    let steg = oppgave
        .behandling()
        .graf()
        .step_by_key(&args.key)
        .ok_or_else(|| CliError::InvalidInput(format!("No step with key '{}'", args.key)))?;
    let id = steg.id();
    let verdi = steg
        .svar()
        .svartype()
        .parse_value(&args.value)
        .map_err(CliError::InvalidInput)?;

    let sporing = Sporing::manuell(Utc::now(), Aktor::new(args.actor), args.reason);
    let outcome = oppgave.answer(id, verdi, sporing)?;
    store.save(&mut oppgave)?;

    println!("{}", formatter.format_answer(&oppgave, &args.key, &outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DemoArgs;
    use crate::commands::demo::execute_demo;
    use crate::commands::testing::{store, SAKSBEHANDLER};
    use crate::config::OutputFormat;
    use saksflyt_domain::{DomainError, Verdi};

    fn answer(id: &str, key: &str, value: &str) -> AnswerArgs {
        AnswerArgs {
            oppgave: id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            actor: SAKSBEHANDLER.to_string(),
            reason: "Opplyst i samtale".to_string(),
        }
    }

    #[test]
    fn test_reanswer_invalidates_dependents() {
        let (_dir, mut store) = store();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_demo(DemoArgs { person: "1".into() }, &mut store, &formatter).unwrap();
        let id = store.list().unwrap()[0].to_string();

        execute_answer(answer(&id, "age", "ja"), &mut store, &formatter).unwrap();
        execute_answer(answer(&id, "eligible", "true"), &mut store, &formatter).unwrap();
        assert!(load_oppgave(&store, &id).unwrap().behandling().frontier().is_empty());

        execute_answer(answer(&id, "income", "2000"), &mut store, &formatter).unwrap();
        let oppgave = load_oppgave(&store, &id).unwrap();
        let graf = oppgave.behandling().graf();
        assert_eq!(oppgave.behandling().frontier().len(), 2);
        assert_eq!(
            graf.step_by_key("income").unwrap().svar().verdi(),
            Some(&Verdi::Heltall(2000))
        );
        match graf.step_by_key("income").unwrap().svar().sporing() {
            Sporing::Manuell { utfort_av, .. } => assert_eq!(utfort_av.ident(), SAKSBEHANDLER),
            other => panic!("expected manual provenance, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let (_dir, mut store) = store();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_demo(DemoArgs { person: "1".into() }, &mut store, &formatter).unwrap();
        let id = store.list().unwrap()[0].to_string();

        let err = execute_answer(answer(&id, "income", "mye"), &mut store, &formatter).unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));

        let err = execute_answer(answer(&id, "ukjent", "1"), &mut store, &formatter).unwrap_err();
        assert!(err.to_string().contains("ukjent"));
    }

    #[test]
    fn test_closed_case_rejects_answers() {
        let (_dir, mut store) = store();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_demo(DemoArgs { person: "1".into() }, &mut store, &formatter).unwrap();
        let id = store.list().unwrap()[0].to_string();

        let mut oppgave = load_oppgave(&store, &id).unwrap();
        oppgave
            .handle(
                saksflyt_domain::OppgaveHendelse::new(saksflyt_domain::OppgaveKommando::Avbryt {
                    aarsak: "FEILREGISTRERT".into(),
                }),
                &crate::commands::testing::tilgang(),
            )
            .unwrap();
        store.save(&mut oppgave).unwrap();

        let err = execute_answer(answer(&id, "age", "nei"), &mut store, &formatter).unwrap_err();
        assert!(matches!(err, CliError::Domain(DomainError::CaseClosed(_))));
    }
}
