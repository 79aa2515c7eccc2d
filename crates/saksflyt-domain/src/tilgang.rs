//! Actors, roles and the access-control seam

use crate::ids::BehandlingId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A case worker or controller, identified by their NAV ident
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aktor(String);

impl Aktor {
    /// Create an actor from an ident
    pub fn new(ident: impl Into<String>) -> Self {
        Self(ident.into())
    }

    /// The ident
    pub fn ident(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Aktor {
    fn from(ident: &str) -> Self {
        Self::new(ident)
    }
}

impl fmt::Display for Aktor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability an actor may hold on a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rolle {
    /// May be assigned a task and propose a decision
    Saksbehandler,
    /// May control and approve another actor's proposal
    Beslutter,
}

/// Access-control collaborator
///
/// Implemented outside the domain (policy service, config file). Any
/// closure `Fn(BehandlingId, &Aktor) -> BTreeSet<Rolle>` qualifies.
pub trait Tilgangskontroll {
    /// Roles `aktor` holds on the given case
    fn roller(&self, behandling: BehandlingId, aktor: &Aktor) -> BTreeSet<Rolle>;

    /// Whether `aktor` holds `rolle` on the given case
    fn har_rolle(&self, behandling: BehandlingId, aktor: &Aktor, rolle: Rolle) -> bool {
        self.roller(behandling, aktor).contains(&rolle)
    }
}

impl<F> Tilgangskontroll for F
where
    F: Fn(BehandlingId, &Aktor) -> BTreeSet<Rolle>,
{
    fn roller(&self, behandling: BehandlingId, aktor: &Aktor) -> BTreeSet<Rolle> {
        self(behandling, aktor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_access_control() {
        let tilgang = |_: BehandlingId, aktor: &Aktor| {
            if aktor.ident() == "Z222222" {
                BTreeSet::from([Rolle::Saksbehandler, Rolle::Beslutter])
            } else {
                BTreeSet::from([Rolle::Saksbehandler])
            }
        };

        let id = BehandlingId::new();
        assert!(tilgang.har_rolle(id, &"Z222222".into(), Rolle::Beslutter));
        assert!(!tilgang.har_rolle(id, &"Z111111".into(), Rolle::Beslutter));
        assert!(tilgang.har_rolle(id, &"Z111111".into(), Rolle::Saksbehandler));
    }
}
