//! Trait definitions for external interactions
//!
//! These traits define the boundary between domain logic and storage.
//! Implementations live in other crates.

use crate::ids::OppgaveId;
use crate::oppgave::Oppgave;

/// Trait for storing and retrieving tasks with their full case graph
///
/// Implemented by the infrastructure layer (saksflyt-store). One call to
/// `save` persists one event's worth of changes atomically.
pub trait OppgaveRepository {
    /// Error type for store operations
    type Error;

    /// Persist the task, its Behandling and the whole step graph
    fn save(&mut self, oppgave: &mut Oppgave) -> Result<(), Self::Error>;

    /// Load a task by id
    fn load(&self, id: OppgaveId) -> Result<Option<Oppgave>, Self::Error>;

    /// Ids of all stored tasks
    fn list(&self) -> Result<Vec<OppgaveId>, Self::Error>;
}
