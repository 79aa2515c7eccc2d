//! Saksflyt Domain Layer
//!
//! Core case-processing model for welfare-benefit cases. A case
//! (Behandling) is decomposed into a directed acyclic graph of steps, each
//! holding one typed answer. The crate is pure: no I/O, no clocks except
//! where a caller asks for "now".
//!
//! ## Key Concepts
//!
//! - **Steg**: one node in the decision graph, holding a typed **Svar**
//! - **Sporing**: why an answer holds its value (none, manual, sourced)
//! - **StegGraf**: arena of steps; traversal, frontier and invalidation
//! - **Behandling**: the case; owns the graph and a coarse tilstand
//! - **Oppgave**: the work item; assignment, dual control and audit log
//!
//! ## Invalidation
//!
//! Answering a step resets every step that depends on it, directly or
//! transitively, to unanswered:
//!
//! ```
//! use chrono::Utc;
//! use saksflyt_domain::{Sporing, StegGraf};
//!
//! let mut graf = StegGraf::new();
//! let eligible = graf.add_step::<bool>("eligible").unwrap();
//! let income = graf.add_step::<i64>("income").unwrap();
//! graf.add_dependency(eligible, income).unwrap();
//!
//! let sporing = Sporing::manuell(Utc::now(), "Z111111".into(), "checked");
//! graf.answer_typed(income, 1000, sporing.clone()).unwrap();
//! graf.answer_typed(eligible, true, sporing.clone()).unwrap();
//! assert!(graf.frontier(eligible.id()).unwrap().is_empty());
//!
//! graf.answer_typed(income, 2000, sporing).unwrap();
//! assert_eq!(graf.frontier(eligible.id()).unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod behandling;
pub mod error;
pub mod graph;
pub mod ids;
pub mod oppgave;
pub mod sporing;
pub mod steg;
pub mod svar;
pub mod tilgang;
pub mod tilstandslogg;
pub mod traits;

// Re-exports for convenience
pub use behandling::{Behandling, BehandlingFlyt, BehandlingHendelse, BehandlingTilstand, ToTrinnsFlyt};
pub use error::DomainError;
pub use graph::{AnswerOutcome, StegGraf};
pub use ids::{BehandlingId, HendelseId, OppgaveId, StegId};
pub use oppgave::{
    HendelseType, Oppgave, OppgaveHendelse, OppgaveKommando, OppgaveParts, OppgaveTilstand, Utfall,
};
pub use sporing::Sporing;
pub use steg::{Steg, StegRef};
pub use svar::{Svar, SvarVerdi, Svartype, Verdi};
pub use tilgang::{Aktor, Rolle, Tilgangskontroll};
pub use tilstandslogg::{TilstandEndring, Tilstandslogg};
pub use traits::OppgaveRepository;
