//! Append-only audit trail of Oppgave transitions

use crate::oppgave::{HendelseType, OppgaveTilstand};
use crate::tilgang::Aktor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilstandEndring {
    /// When the transition happened
    pub tidspunkt: DateTime<Utc>,
    /// Resulting tilstand
    pub tilstand: OppgaveTilstand,
    /// Triggering event
    pub hendelse: HendelseType,
    /// Actor the event was performed by or assigned to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utfort_av: Option<Aktor>,
    /// Reason code (cancellation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aarsak: Option<String>,
}

/// Transition log; entries are only ever appended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tilstandslogg(Vec<TilstandEndring>);

impl Tilstandslogg {
    /// Log with a single initial entry
    pub fn start(endring: TilstandEndring) -> Self {
        Self(vec![endring])
    }

    /// Rebuild a log from stored entries in order
    pub fn from_entries(entries: Vec<TilstandEndring>) -> Self {
        Self(entries)
    }

    pub(crate) fn push(&mut self, endring: TilstandEndring) {
        self.0.push(endring);
    }

    /// Most recent entry
    pub fn siste(&self) -> Option<&TilstandEndring> {
        self.0.last()
    }

    /// Entries, oldest first
    pub fn entries(&self) -> &[TilstandEndring] {
        &self.0
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Actor on the most recent `UnderBehandling` entry (the proposer)
    pub fn siste_saksbehandler(&self) -> Option<&Aktor> {
        self.0
            .iter()
            .rev()
            .find(|e| e.tilstand == OppgaveTilstand::UnderBehandling)
            .and_then(|e| e.utfort_av.as_ref())
    }
}
