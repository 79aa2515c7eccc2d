//! Behandling: a case owning a step graph and a coarse tilstand

use crate::error::DomainError;
use crate::graph::{AnswerOutcome, StegGraf};
use crate::ids::{BehandlingId, StegId};
use crate::sporing::Sporing;
use crate::steg::StegRef;
use crate::svar::{SvarVerdi, Verdi};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Coarse case state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehandlingTilstand {
    /// Initial state; steps may be answered
    UnderBehandling,
    /// Terminal; the graph is frozen
    FerdigBehandlet,
}

impl BehandlingTilstand {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            BehandlingTilstand::UnderBehandling => "UNDER_BEHANDLING",
            BehandlingTilstand::FerdigBehandlet => "FERDIG_BEHANDLET",
        }
    }

    /// Parse a storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNDER_BEHANDLING" => Some(BehandlingTilstand::UnderBehandling),
            "FERDIG_BEHANDLET" => Some(BehandlingTilstand::FerdigBehandlet),
            _ => None,
        }
    }
}

/// Explicit events that may move a Behandling forward
///
/// Answering a step is never one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehandlingHendelse {
    /// A decision was reached and approved
    VedtakFattet,
}

/// Per-case state machine, injected at construction
pub trait BehandlingFlyt: fmt::Debug + Send + Sync {
    /// Target state for `hendelse` from `fra`, or `None` if not allowed
    fn neste(&self, fra: BehandlingTilstand, hendelse: BehandlingHendelse)
        -> Option<BehandlingTilstand>;
}

/// "Under behandling -> Ferdig behandlet"
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTrinnsFlyt;

impl BehandlingFlyt for ToTrinnsFlyt {
    fn neste(
        &self,
        fra: BehandlingTilstand,
        hendelse: BehandlingHendelse,
    ) -> Option<BehandlingTilstand> {
        match (fra, hendelse) {
            (BehandlingTilstand::UnderBehandling, BehandlingHendelse::VedtakFattet) => {
                Some(BehandlingTilstand::FerdigBehandlet)
            }
            (BehandlingTilstand::FerdigBehandlet, _) => None,
        }
    }
}

/// A case: the person it concerns, its step graph and its tilstand
#[derive(Debug, Clone)]
pub struct Behandling {
    id: BehandlingId,
    person_ident: String,
    graf: StegGraf,
    roots: BTreeSet<StegId>,
    tilstand: BehandlingTilstand,
    flyt: Arc<dyn BehandlingFlyt>,
    version: u64,
}

impl Behandling {
    /// A fresh case over a fully built graph, using [`ToTrinnsFlyt`]
    pub fn new(
        person_ident: impl Into<String>,
        graf: StegGraf,
        roots: impl IntoIterator<Item = StegId>,
    ) -> Result<Self, DomainError> {
        Self::with_flyt(person_ident, graf, roots, Arc::new(ToTrinnsFlyt))
    }

    /// A fresh case with a custom state machine
    pub fn with_flyt(
        person_ident: impl Into<String>,
        graf: StegGraf,
        roots: impl IntoIterator<Item = StegId>,
        flyt: Arc<dyn BehandlingFlyt>,
    ) -> Result<Self, DomainError> {
        Self::rehydrate(
            BehandlingId::new(),
            person_ident,
            graf,
            roots,
            BehandlingTilstand::UnderBehandling,
            flyt,
            0,
        )
    }

    /// Rebuild a case from stored parts
    pub fn rehydrate(
        id: BehandlingId,
        person_ident: impl Into<String>,
        graf: StegGraf,
        roots: impl IntoIterator<Item = StegId>,
        tilstand: BehandlingTilstand,
        flyt: Arc<dyn BehandlingFlyt>,
        version: u64,
    ) -> Result<Self, DomainError> {
        let roots: BTreeSet<StegId> = roots.into_iter().collect();
        if let Some(missing) = roots.iter().find(|id| graf.step(**id).is_none()) {
            return Err(DomainError::UnknownStep(*missing));
        }

        Ok(Self {
            id,
            person_ident: person_ident.into(),
            graf,
            roots,
            tilstand,
            flyt,
            version,
        })
    }

    /// Case id
    pub fn id(&self) -> BehandlingId {
        self.id
    }

    /// The person the case concerns
    pub fn person_ident(&self) -> &str {
        &self.person_ident
    }

    /// The step graph
    pub fn graf(&self) -> &StegGraf {
        &self.graf
    }

    /// Root steps
    pub fn roots(&self) -> &BTreeSet<StegId> {
        &self.roots
    }

    /// Current tilstand
    pub fn tilstand(&self) -> BehandlingTilstand {
        self.tilstand
    }

    /// Version last read from or written to storage
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record the version storage now holds
    pub fn mark_persisted(&mut self, version: u64) {
        self.version = version;
    }

    /// Every step reachable from the roots
    pub fn all_steps(&self) -> BTreeSet<StegId> {
        match self.graf.all_steps_from(self.roots.iter().copied()) {
            Ok(steps) => steps,
            Err(e) => unreachable!("roots are checked against the graph at construction: {e}"),
        }
    }

    /// Unanswered steps reachable from the roots
    pub fn frontier(&self) -> BTreeSet<StegId> {
        match self.graf.frontier_from(self.roots.iter().copied()) {
            Ok(steps) => steps,
            Err(e) => unreachable!("roots are checked against the graph at construction: {e}"),
        }
    }

    /// Answer a step; rejected once the case is closed
    pub fn answer(
        &mut self,
        steg: StegId,
        verdi: Verdi,
        sporing: Sporing,
    ) -> Result<AnswerOutcome, DomainError> {
        if self.tilstand == BehandlingTilstand::FerdigBehandlet {
            let key = self
                .graf
                .step(steg)
                .map(|s| s.key().to_string())
                .unwrap_or_else(|| steg.to_string());
            return Err(DomainError::CaseClosed(key));
        }
        self.graf.answer(steg, verdi, sporing)
    }

    /// Answer a step through its typed handle
    pub fn answer_typed<T: SvarVerdi>(
        &mut self,
        steg: StegRef<T>,
        verdi: T,
        sporing: Sporing,
    ) -> Result<AnswerOutcome, DomainError> {
        self.answer(steg.id(), verdi.into_verdi(), sporing)
    }

    /// Apply an explicit tilstand event
    pub fn handle(&mut self, hendelse: BehandlingHendelse) -> Result<BehandlingTilstand, DomainError> {
        let neste = self
            .flyt
            .neste(self.tilstand, hendelse)
            .ok_or(DomainError::IllegalBehandlingTransition { from: self.tilstand })?;

        info!(
            behandling = %self.id,
            from = self.tilstand.as_str(),
            to = neste.as_str(),
            "Behandling transition"
        );
        self.tilstand = neste;
        Ok(neste)
    }
}
