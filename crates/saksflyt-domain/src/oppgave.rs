//! Oppgave: the work item wrapping a Behandling
//!
//! ## Transitions
//!
//! | From | Event | To |
//! |------|-------|----|
//! | OPPRETTET | klargjør (graph built) | KLAR_TIL_BEHANDLING |
//! | KLAR_TIL_BEHANDLING | tildel | UNDER_BEHANDLING |
//! | UNDER_BEHANDLING | send til kontroll (empty frontier) | KLAR_TIL_KONTROLL |
//! | UNDER_BEHANDLING | legg tilbake | KLAR_TIL_BEHANDLING |
//! | KLAR_TIL_KONTROLL | tildel kontroll (beslutter, not the proposer) | UNDER_KONTROLL |
//! | UNDER_KONTROLL | godkjenn | FERDIG_BEHANDLET |
//! | UNDER_KONTROLL | send tilbake | KLAR_TIL_BEHANDLING |
//! | any non-terminal | avbryt | AVBRUTT |
//!
//! Every other (tilstand, event) pair is an `IllegalTransition` and changes nothing.

use crate::behandling::{Behandling, BehandlingHendelse};
use crate::error::DomainError;
use crate::graph::AnswerOutcome;
use crate::ids::{HendelseId, OppgaveId, StegId};
use crate::sporing::Sporing;
use crate::svar::Verdi;
use crate::tilgang::{Aktor, Rolle, Tilgangskontroll};
use crate::tilstandslogg::{TilstandEndring, Tilstandslogg};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Operational state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OppgaveTilstand {
    /// Created, graph not yet ready
    Opprettet,
    /// Waiting for a case worker
    KlarTilBehandling,
    /// Assigned to a case worker
    UnderBehandling,
    /// Proposal waiting for a controller
    KlarTilKontroll,
    /// Assigned to a controller
    UnderKontroll,
    /// Approved (terminal)
    FerdigBehandlet,
    /// Cancelled (terminal)
    Avbrutt,
}

impl OppgaveTilstand {
    /// All states, in lifecycle order
    pub const ALL: [OppgaveTilstand; 7] = [
        OppgaveTilstand::Opprettet,
        OppgaveTilstand::KlarTilBehandling,
        OppgaveTilstand::UnderBehandling,
        OppgaveTilstand::KlarTilKontroll,
        OppgaveTilstand::UnderKontroll,
        OppgaveTilstand::FerdigBehandlet,
        OppgaveTilstand::Avbrutt,
    ];

    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            OppgaveTilstand::Opprettet => "OPPRETTET",
            OppgaveTilstand::KlarTilBehandling => "KLAR_TIL_BEHANDLING",
            OppgaveTilstand::UnderBehandling => "UNDER_BEHANDLING",
            OppgaveTilstand::KlarTilKontroll => "KLAR_TIL_KONTROLL",
            OppgaveTilstand::UnderKontroll => "UNDER_KONTROLL",
            OppgaveTilstand::FerdigBehandlet => "FERDIG_BEHANDLET",
            OppgaveTilstand::Avbrutt => "AVBRUTT",
        }
    }

    /// Parse a storage name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, OppgaveTilstand::FerdigBehandlet | OppgaveTilstand::Avbrutt)
    }
}

/// Kind of event recorded in the tilstand log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HendelseType {
    /// Task created
    Opprettet,
    /// Graph built, task ready
    Klargjort,
    /// Assigned to a case worker
    Tildelt,
    /// Proposal sent to control
    SendtTilKontroll,
    /// Assigned to a controller
    KontrollTildelt,
    /// Approved
    Godkjent,
    /// Rejected back for rework
    SendtTilbake,
    /// Cancelled
    Avbrutt,
    /// Assignment withdrawn
    LagtTilbake,
}

impl HendelseType {
    const ALL: [HendelseType; 9] = [
        HendelseType::Opprettet,
        HendelseType::Klargjort,
        HendelseType::Tildelt,
        HendelseType::SendtTilKontroll,
        HendelseType::KontrollTildelt,
        HendelseType::Godkjent,
        HendelseType::SendtTilbake,
        HendelseType::Avbrutt,
        HendelseType::LagtTilbake,
    ];

    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            HendelseType::Opprettet => "OPPRETTET",
            HendelseType::Klargjort => "KLARGJORT",
            HendelseType::Tildelt => "TILDELT",
            HendelseType::SendtTilKontroll => "SENDT_TIL_KONTROLL",
            HendelseType::KontrollTildelt => "KONTROLL_TILDELT",
            HendelseType::Godkjent => "GODKJENT",
            HendelseType::SendtTilbake => "SENDT_TILBAKE",
            HendelseType::Avbrutt => "AVBRUTT",
            HendelseType::LagtTilbake => "LAGT_TILBAKE",
        }
    }

    /// Parse a storage name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Commands accepted by [`Oppgave::handle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OppgaveKommando {
    /// The Behandling's initial graph is fully constructed
    Klargjor,
    /// "tildel": assign to a case worker
    Tildel {
        /// Case worker taking the task
        saksbehandler: Aktor,
    },
    /// "send til kontroll"
    SendTilKontroll,
    /// "tildel kontroll": assign to a controller
    TildelKontroll {
        /// Controller taking the task
        beslutter: Aktor,
    },
    /// "godkjenn"
    Godkjenn,
    /// "send tilbake": reject back for rework
    SendTilbake,
    /// "avbryt"
    Avbryt {
        /// Reason code
        aarsak: String,
    },
    /// "legg tilbake": withdraw the assignment
    LeggTilbake,
}

impl OppgaveKommando {
    /// Log event kind for this command
    pub fn hendelse_type(&self) -> HendelseType {
        match self {
            OppgaveKommando::Klargjor => HendelseType::Klargjort,
            OppgaveKommando::Tildel { .. } => HendelseType::Tildelt,
            OppgaveKommando::SendTilKontroll => HendelseType::SendtTilKontroll,
            OppgaveKommando::TildelKontroll { .. } => HendelseType::KontrollTildelt,
            OppgaveKommando::Godkjenn => HendelseType::Godkjent,
            OppgaveKommando::SendTilbake => HendelseType::SendtTilbake,
            OppgaveKommando::Avbryt { .. } => HendelseType::Avbrutt,
            OppgaveKommando::LeggTilbake => HendelseType::LagtTilbake,
        }
    }
}

/// An inbound command with its delivery id and time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OppgaveHendelse {
    /// Globally unique event id; redelivery reuses it
    pub id: HendelseId,
    /// When the event happened
    pub tidspunkt: DateTime<Utc>,
    /// What to do
    pub kommando: OppgaveKommando,
}

impl OppgaveHendelse {
    /// Wrap a command with a fresh id and the current time
    pub fn new(kommando: OppgaveKommando) -> Self {
        Self {
            id: HendelseId::new(),
            tidspunkt: Utc::now(),
            kommando,
        }
    }
}

/// Result of [`Oppgave::handle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utfall {
    /// The transition was applied
    Endret {
        /// Previous tilstand
        fra: OppgaveTilstand,
        /// New tilstand
        til: OppgaveTilstand,
    },
    /// Event id already handled; nothing changed
    Duplikat,
}

/// Stored parts of an Oppgave
#[derive(Debug, Clone)]
pub struct OppgaveParts {
    /// Task id
    pub id: OppgaveId,
    /// Wrapped case
    pub behandling: Behandling,
    /// Current tilstand
    pub tilstand: OppgaveTilstand,
    /// Assigned actor
    pub tildelt: Option<Aktor>,
    /// Classification labels
    pub emneknagger: BTreeSet<String>,
    /// Transition log
    pub logg: Tilstandslogg,
    /// Event ids already applied
    pub behandlede_hendelser: BTreeSet<HendelseId>,
    /// Creation time
    pub opprettet: DateTime<Utc>,
}

/// Validated transition, applied only after every check passed
struct Overgang {
    til: OppgaveTilstand,
    tildelt: Option<Aktor>,
    utfort_av: Option<Aktor>,
    aarsak: Option<String>,
    vedtak: bool,
}

impl Overgang {
    fn til(til: OppgaveTilstand, tildelt: Option<Aktor>, utfort_av: Option<Aktor>) -> Self {
        Self {
            til,
            tildelt,
            utfort_av,
            aarsak: None,
            vedtak: false,
        }
    }
}

/// A work item: one Behandling plus assignment and operational tilstand
#[derive(Debug, Clone)]
pub struct Oppgave {
    id: OppgaveId,
    behandling: Behandling,
    tilstand: OppgaveTilstand,
    tildelt: Option<Aktor>,
    emneknagger: BTreeSet<String>,
    logg: Tilstandslogg,
    behandlede_hendelser: BTreeSet<HendelseId>,
    opprettet: DateTime<Utc>,
}

impl Oppgave {
    /// A task in `OPPRETTET`
    pub fn new(behandling: Behandling, tidspunkt: DateTime<Utc>) -> Self {
        let logg = Tilstandslogg::start(TilstandEndring {
            tidspunkt,
            tilstand: OppgaveTilstand::Opprettet,
            hendelse: HendelseType::Opprettet,
            utfort_av: None,
            aarsak: None,
        });
        Self {
            id: OppgaveId::new(),
            behandling,
            tilstand: OppgaveTilstand::Opprettet,
            tildelt: None,
            emneknagger: BTreeSet::new(),
            logg,
            behandlede_hendelser: BTreeSet::new(),
            opprettet: tidspunkt,
        }
    }

    /// A task for a Behandling whose graph is already built
    ///
    /// Moves straight on to `KLAR_TIL_BEHANDLING`; both steps are logged.
    pub fn opprett(behandling: Behandling, tidspunkt: DateTime<Utc>) -> Self {
        let mut oppgave = Self::new(behandling, tidspunkt);
        oppgave.apply(
            Overgang::til(OppgaveTilstand::KlarTilBehandling, None, None),
            HendelseType::Klargjort,
            tidspunkt,
        );
        oppgave
    }

    /// Rebuild a task from stored parts
    ///
    /// The last log entry must match the stored tilstand.
    pub fn from_parts(parts: OppgaveParts) -> Result<Self, DomainError> {
        let logged = parts.logg.siste().map(|e| e.tilstand);
        if logged != Some(parts.tilstand) {
            return Err(DomainError::InconsistentLog {
                tilstand: parts.tilstand,
                logged,
            });
        }

        Ok(Self {
            id: parts.id,
            behandling: parts.behandling,
            tilstand: parts.tilstand,
            tildelt: parts.tildelt,
            emneknagger: parts.emneknagger,
            logg: parts.logg,
            behandlede_hendelser: parts.behandlede_hendelser,
            opprettet: parts.opprettet,
        })
    }

    /// Task id
    pub fn id(&self) -> OppgaveId {
        self.id
    }

    /// Wrapped case
    pub fn behandling(&self) -> &Behandling {
        &self.behandling
    }

    /// Mutable access for persistence bookkeeping
    pub fn behandling_mut(&mut self) -> &mut Behandling {
        &mut self.behandling
    }

    /// Current tilstand
    pub fn tilstand(&self) -> OppgaveTilstand {
        self.tilstand
    }

    /// Assigned actor
    pub fn tildelt(&self) -> Option<&Aktor> {
        self.tildelt.as_ref()
    }

    /// Classification labels
    pub fn emneknagger(&self) -> &BTreeSet<String> {
        &self.emneknagger
    }

    /// Transition log
    pub fn logg(&self) -> &Tilstandslogg {
        &self.logg
    }

    /// Event ids already applied
    pub fn behandlede_hendelser(&self) -> &BTreeSet<HendelseId> {
        &self.behandlede_hendelser
    }

    /// Creation time
    pub fn opprettet(&self) -> DateTime<Utc> {
        self.opprettet
    }

    /// Add a label; returns `false` if already present
    pub fn add_label(&mut self, label: impl Into<String>) -> bool {
        self.emneknagger.insert(label.into())
    }

    /// Remove a label; returns `false` if absent
    pub fn remove_label(&mut self, label: &str) -> bool {
        self.emneknagger.remove(label)
    }

    /// Answer a step in the wrapped case
    ///
    /// Rejected once the task is terminal.
    pub fn answer(
        &mut self,
        steg: StegId,
        verdi: Verdi,
        sporing: Sporing,
    ) -> Result<AnswerOutcome, DomainError> {
        if self.tilstand.is_terminal() {
            let key = self
                .behandling
                .graf()
                .step(steg)
                .map(|s| s.key().to_string())
                .unwrap_or_else(|| steg.to_string());
            return Err(DomainError::CaseClosed(key));
        }
        self.behandling.answer(steg, verdi, sporing)
    }

    /// Apply one command
    ///
    /// A redelivered event id is a no-op. On error nothing changes: neither
    /// tilstand, assignment, nor the log.
    pub fn handle(
        &mut self,
        hendelse: OppgaveHendelse,
        tilgang: &dyn Tilgangskontroll,
    ) -> Result<Utfall, DomainError> {
        if self.behandlede_hendelser.contains(&hendelse.id) {
            info!(oppgave = %self.id, hendelse = %hendelse.id, "Duplicate event ignored");
            return Ok(Utfall::Duplikat);
        }

        let fra = self.tilstand;
        let overgang = self.plan(&hendelse.kommando, tilgang).inspect_err(|e| {
            warn!(oppgave = %self.id, tilstand = fra.as_str(), "Command rejected: {}", e);
        })?;

        if overgang.vedtak {
            self.behandling.handle(BehandlingHendelse::VedtakFattet)?;
        }

        let til = overgang.til;
        self.apply(overgang, hendelse.kommando.hendelse_type(), hendelse.tidspunkt);
        self.behandlede_hendelser.insert(hendelse.id);

        info!(
            oppgave = %self.id,
            from = fra.as_str(),
            to = til.as_str(),
            "Oppgave transition"
        );
        Ok(Utfall::Endret { fra, til })
    }

    /// Withdraw the assignment if the assigned case worker lost access
    pub fn revalider_tilgang(
        &mut self,
        tilgang: &dyn Tilgangskontroll,
        tidspunkt: DateTime<Utc>,
    ) -> Result<Option<Utfall>, DomainError> {
        let mistet = match (&self.tilstand, &self.tildelt) {
            (OppgaveTilstand::UnderBehandling, Some(aktor)) => {
                !tilgang.har_rolle(self.behandling.id(), aktor, Rolle::Saksbehandler)
            }
            _ => false,
        };
        if !mistet {
            return Ok(None);
        }

        let hendelse = OppgaveHendelse {
            id: HendelseId::new(),
            tidspunkt,
            kommando: OppgaveKommando::LeggTilbake,
        };
        self.handle(hendelse, tilgang).map(Some)
    }

    fn plan(
        &self,
        kommando: &OppgaveKommando,
        tilgang: &dyn Tilgangskontroll,
    ) -> Result<Overgang, DomainError> {
        use OppgaveKommando as K;
        use OppgaveTilstand as T;

        match (self.tilstand, kommando) {
            (T::Opprettet, K::Klargjor) => Ok(Overgang::til(T::KlarTilBehandling, None, None)),

            (T::KlarTilBehandling, K::Tildel { saksbehandler }) => {
                self.krev_ledig()?;
                self.krev_rolle(tilgang, saksbehandler, Rolle::Saksbehandler)?;
                Ok(Overgang::til(
                    T::UnderBehandling,
                    Some(saksbehandler.clone()),
                    Some(saksbehandler.clone()),
                ))
            }

            (T::UnderBehandling, K::SendTilKontroll) => {
                self.krev_ferdig_graf()?;
                Ok(Overgang::til(T::KlarTilKontroll, None, self.tildelt.clone()))
            }

            (T::UnderBehandling, K::LeggTilbake) => {
                Ok(Overgang::til(T::KlarTilBehandling, None, self.tildelt.clone()))
            }

            (T::KlarTilKontroll, K::TildelKontroll { beslutter }) => {
                self.krev_ledig()?;
                self.krev_rolle(tilgang, beslutter, Rolle::Beslutter)?;
                if self.logg.siste_saksbehandler() == Some(beslutter) {
                    return Err(DomainError::DualControlViolation(beslutter.clone()));
                }
                Ok(Overgang::til(
                    T::UnderKontroll,
                    Some(beslutter.clone()),
                    Some(beslutter.clone()),
                ))
            }

            (T::UnderKontroll, K::Godkjenn) => {
                self.krev_ferdig_graf()?;
                let mut overgang =
                    Overgang::til(T::FerdigBehandlet, self.tildelt.clone(), self.tildelt.clone());
                overgang.vedtak = true;
                Ok(overgang)
            }

            (T::UnderKontroll, K::SendTilbake) => {
                Ok(Overgang::til(T::KlarTilBehandling, None, self.tildelt.clone()))
            }

            (fra, K::Avbryt { aarsak }) if !fra.is_terminal() => {
                let mut overgang = Overgang::til(T::Avbrutt, None, None);
                overgang.aarsak = Some(aarsak.clone());
                Ok(overgang)
            }

            (fra, kommando) => Err(DomainError::IllegalTransition {
                from: fra,
                event: kommando.hendelse_type(),
            }),
        }
    }

    fn krev_ledig(&self) -> Result<(), DomainError> {
        match &self.tildelt {
            Some(aktor) => Err(DomainError::DuplicateAssignment(aktor.clone())),
            None => Ok(()),
        }
    }

    fn krev_rolle(
        &self,
        tilgang: &dyn Tilgangskontroll,
        aktor: &Aktor,
        rolle: Rolle,
    ) -> Result<(), DomainError> {
        if tilgang.har_rolle(self.behandling.id(), aktor, rolle) {
            Ok(())
        } else {
            Err(DomainError::MissingRole {
                aktor: aktor.clone(),
                rolle,
            })
        }
    }

    fn krev_ferdig_graf(&self) -> Result<(), DomainError> {
        match self.behandling.frontier().len() {
            0 => Ok(()),
            open => Err(DomainError::OpenFrontier(open)),
        }
    }

    fn apply(&mut self, overgang: Overgang, hendelse: HendelseType, tidspunkt: DateTime<Utc>) {
        self.tilstand = overgang.til;
        self.tildelt = overgang.tildelt;
        self.logg.push(TilstandEndring {
            tidspunkt,
            tilstand: overgang.til,
            hendelse,
            utfort_av: overgang.utfort_av,
            aarsak: overgang.aarsak,
        });
    }
}
