//! Task command implementation (assign, send to control, approve, ...).

use crate::commands::load_oppgave;
use crate::error::Result;
use crate::output::Formatter;
use chrono::Utc;
use saksflyt_domain::{OppgaveHendelse, OppgaveKommando, OppgaveRepository, Tilgangskontroll};
use saksflyt_store::SqliteStore;
use tracing::warn;

/// Execute one task command against a stored oppgave.
///
/// Access is re-checked first: a case worker who lost their role has the
/// assignment withdrawn, and that change is saved even if the command fails.
pub fn execute_transition(
    oppgave: &str,
    kommando: OppgaveKommando,
    store: &mut SqliteStore,
    tilgang: &dyn Tilgangskontroll,
    formatter: &Formatter,
) -> Result<()> {
    let mut oppgave = load_oppgave(store, oppgave)?;

    if oppgave.revalider_tilgang(tilgang, Utc::now())?.is_some() {
        warn!(oppgave = %oppgave.id(), "Assignment withdrawn after access change");
        store.save(&mut oppgave)?;
        println!(
            "{}",
            formatter.warning("Assigned case worker lost access; the oppgave was put back")
        );
    }

    let utfall = oppgave.handle(OppgaveHendelse::new(kommando), tilgang)?;
    store.save(&mut oppgave)?;

    println!("{}", formatter.format_utfall(&oppgave, utfall)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{AnswerArgs, DemoArgs};
    use crate::commands::answer::execute_answer;
    use crate::commands::demo::execute_demo;
    use crate::commands::testing::{store, tilgang, BESLUTTER, SAKSBEHANDLER};
    use crate::config::OutputFormat;
    use crate::error::CliError;
    use saksflyt_domain::{Aktor, BehandlingTilstand, DomainError, HendelseType, OppgaveTilstand};

    fn setup() -> (tempfile::TempDir, SqliteStore, String, Formatter) {
        let (dir, mut store) = store();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_demo(DemoArgs { person: "1".into() }, &mut store, &formatter).unwrap();
        let id = store.list().unwrap()[0].to_string();
        (dir, store, id, formatter)
    }

    fn answer_all(store: &mut SqliteStore, id: &str, formatter: &Formatter) {
        for (key, value) in [("age", "ja"), ("eligible", "ja")] {
            let args = AnswerArgs {
                oppgave: id.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                actor: SAKSBEHANDLER.to_string(),
                reason: "ok".to_string(),
            };
            execute_answer(args, store, formatter).unwrap();
        }
    }

    fn tildel(ident: &str) -> OppgaveKommando {
        OppgaveKommando::Tildel { saksbehandler: Aktor::new(ident) }
    }

    fn tildel_kontroll(ident: &str) -> OppgaveKommando {
        OppgaveKommando::TildelKontroll { beslutter: Aktor::new(ident) }
    }

    #[test]
    fn test_full_two_step_flow() {
        let (_dir, mut store, id, f) = setup();
        let t = tilgang();

        execute_transition(&id, tildel(SAKSBEHANDLER), &mut store, &t, &f).unwrap();
        answer_all(&mut store, &id, &f);
        execute_transition(&id, OppgaveKommando::SendTilKontroll, &mut store, &t, &f).unwrap();
        execute_transition(&id, tildel_kontroll(BESLUTTER), &mut store, &t, &f).unwrap();
        execute_transition(&id, OppgaveKommando::Godkjenn, &mut store, &t, &f).unwrap();

        let oppgave = load_oppgave(&store, &id).unwrap();
        assert_eq!(oppgave.tilstand(), OppgaveTilstand::FerdigBehandlet);
        assert_eq!(oppgave.behandling().tilstand(), BehandlingTilstand::FerdigBehandlet);
        assert_eq!(oppgave.logg().siste().unwrap().hendelse, HendelseType::Godkjent);
    }

    #[test]
    fn test_send_to_control_with_open_steps_fails() {
        let (_dir, mut store, id, f) = setup();
        let t = tilgang();
        execute_transition(&id, tildel(SAKSBEHANDLER), &mut store, &t, &f).unwrap();

        let err = execute_transition(&id, OppgaveKommando::SendTilKontroll, &mut store, &t, &f)
            .unwrap_err();
        assert!(matches!(err, CliError::Domain(DomainError::OpenFrontier(2))));
        assert_eq!(
            load_oppgave(&store, &id).unwrap().tilstand(),
            OppgaveTilstand::UnderBehandling
        );
    }

    #[test]
    fn test_proposer_cannot_control() {
        let (_dir, mut store, id, f) = setup();
        let t = tilgang();
        execute_transition(&id, tildel(BESLUTTER), &mut store, &t, &f).unwrap();
        answer_all(&mut store, &id, &f);
        execute_transition(&id, OppgaveKommando::SendTilKontroll, &mut store, &t, &f).unwrap();

        let err = execute_transition(&id, tildel_kontroll(BESLUTTER), &mut store, &t, &f)
            .unwrap_err();
        assert!(matches!(err, CliError::Domain(DomainError::DualControlViolation(_))));
    }

    #[test]
    fn test_lost_access_puts_oppgave_back() {
        let (_dir, mut store, id, f) = setup();
        execute_transition(&id, tildel(SAKSBEHANDLER), &mut store, &tilgang(), &f).unwrap();

        let mut redusert = tilgang();
        redusert.saksbehandlere.clear();
        let err = execute_transition(&id, OppgaveKommando::SendTilKontroll, &mut store, &redusert, &f)
            .unwrap_err();
        assert!(matches!(err, CliError::Domain(DomainError::IllegalTransition { .. })));

        let oppgave = load_oppgave(&store, &id).unwrap();
        assert_eq!(oppgave.tilstand(), OppgaveTilstand::KlarTilBehandling);
        assert_eq!(oppgave.tildelt(), None);
        assert_eq!(oppgave.logg().siste().unwrap().hendelse, HendelseType::LagtTilbake);
    }

    #[test]
    fn test_cancel_records_reason() {
        let (_dir, mut store, id, f) = setup();
        let kommando = OppgaveKommando::Avbryt { aarsak: "DUPLIKAT".into() };
        execute_transition(&id, kommando, &mut store, &tilgang(), &f).unwrap();

        let oppgave = load_oppgave(&store, &id).unwrap();
        assert_eq!(oppgave.tilstand(), OppgaveTilstand::Avbrutt);
        assert_eq!(oppgave.logg().siste().unwrap().aarsak.as_deref(), Some("DUPLIKAT"));
    }
}
