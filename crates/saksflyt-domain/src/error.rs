//! Error types for domain operations
//!
//! Every variant is a local, synchronous failure returned to the immediate
//! caller. None of them leave a partial mutation behind.

use crate::behandling::BehandlingTilstand;
use crate::ids::StegId;
use crate::oppgave::{HendelseType, OppgaveTilstand};
use crate::svar::Svartype;
use crate::tilgang::{Aktor, Rolle};
use thiserror::Error;

/// Errors raised by the step graph, Behandling and Oppgave state machines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Step id not present in the graph
    #[error("Unknown step: {0}")]
    UnknownStep(StegId),

    /// Answer value disagrees with the step's declared type
    #[error("Type mismatch on step '{key}': declared {declared}, got {actual}")]
    TypeMismatch {
        /// Logical key of the step
        key: String,
        /// Declared answer type
        declared: Svartype,
        /// Type of the offered value
        actual: Svartype,
    },

    /// Value cannot be held by a step (a non-finite decimal)
    #[error("Step '{key}' cannot hold the value {verdi}")]
    InvalidValue {
        /// Logical key of the step
        key: String,
        /// Offered value, as text
        verdi: String,
    },

    /// An answered value was offered without provenance
    #[error("Step '{0}' cannot be answered without provenance")]
    MissingProvenance(String),

    /// Logical key already used in this graph
    #[error("Duplicate step key: {0}")]
    DuplicateKey(String),

    /// Step id already used in this graph
    #[error("Duplicate step id: {0}")]
    DuplicateStep(StegId),

    /// Edge would make the graph cyclic (or is a self-reference)
    #[error("Dependency {parent} -> {child} would create a cycle")]
    Cycle {
        /// Depending step
        parent: StegId,
        /// Step depended on
        child: StegId,
    },

    /// Oppgave command not valid from the current tilstand
    #[error("Illegal transition: {event:?} from {from:?}")]
    IllegalTransition {
        /// Current tilstand
        from: OppgaveTilstand,
        /// Rejected event
        event: HendelseType,
    },

    /// Behandling event not valid from the current tilstand
    #[error("Illegal behandling transition from {from:?}")]
    IllegalBehandlingTransition {
        /// Current tilstand
        from: BehandlingTilstand,
    },

    /// Oppgave already carries an actor
    #[error("Oppgave is already assigned to {0}")]
    DuplicateAssignment(Aktor),

    /// Actor lacks the role the command requires
    #[error("{aktor} lacks role {rolle:?}")]
    MissingRole {
        /// Acting actor
        aktor: Aktor,
        /// Required role
        rolle: Rolle,
    },

    /// Controller is the actor who produced the proposal
    #[error("{0} cannot control their own proposal")]
    DualControlViolation(Aktor),

    /// Unanswered steps remain where a complete graph is required
    #[error("{0} step(s) are still unanswered")]
    OpenFrontier(usize),

    /// Stored tilstand disagrees with the last log entry
    #[error("Oppgave tilstand {tilstand:?} does not match last log entry {logged:?}")]
    InconsistentLog {
        /// Stored tilstand
        tilstand: OppgaveTilstand,
        /// Tilstand on the last log entry
        logged: Option<OppgaveTilstand>,
    },

    /// Step answered after the Behandling reached its terminal state
    #[error("Behandling is closed; step '{0}' cannot be answered")]
    CaseClosed(String),
}
