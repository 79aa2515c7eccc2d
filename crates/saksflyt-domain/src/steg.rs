//! Steg: one node in a case's decision dependency graph

use crate::ids::StegId;
use crate::svar::{Svar, SvarVerdi, Svartype};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// A step holding one answer and its outgoing "depends-on" edges
///
/// Edges are stored as ids into the owning [`crate::StegGraf`], so a child
/// shared by several parents is one node, not a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Steg {
    id: StegId,
    key: String,
    svar: Svar,
    depends_on: BTreeSet<StegId>,
}

impl Steg {
    /// A new, unanswered step with no edges
    pub fn new(key: impl Into<String>, svartype: Svartype) -> Self {
        Self::with_svar(StegId::new(), key, Svar::ubesvart(svartype))
    }

    /// A step with a known id and answer (rehydration)
    pub fn with_svar(id: StegId, key: impl Into<String>, svar: Svar) -> Self {
        Self {
            id,
            key: key.into(),
            svar,
            depends_on: BTreeSet::new(),
        }
    }

    /// Identity
    pub fn id(&self) -> StegId {
        self.id
    }

    /// Human-readable logical key, e.g. "vilkår1"
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current answer
    pub fn svar(&self) -> &Svar {
        &self.svar
    }

    /// Ids of the steps this one depends on
    pub fn depends_on(&self) -> &BTreeSet<StegId> {
        &self.depends_on
    }

    /// Whether the answer holds a value
    pub fn er_besvart(&self) -> bool {
        self.svar.er_besvart()
    }

    pub(crate) fn replace_svar(&mut self, svar: Svar) {
        self.svar = svar;
    }

    pub(crate) fn add_edge(&mut self, child: StegId) -> bool {
        self.depends_on.insert(child)
    }
}

/// Typed handle to a step
///
/// Returned by [`crate::StegGraf::add_step`]; answering through it is
/// checked at compile time.
pub struct StegRef<T> {
    id: StegId,
    _type: PhantomData<fn() -> T>,
}

impl<T: SvarVerdi> StegRef<T> {
    pub(crate) fn new(id: StegId) -> Self {
        Self {
            id,
            _type: PhantomData,
        }
    }

    /// Untyped id of the step
    pub fn id(&self) -> StegId {
        self.id
    }
}

impl<T> Clone for StegRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StegRef<T> {}

impl<T> fmt::Debug for StegRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StegRef").field(&self.id).finish()
    }
}

impl<T> PartialEq for StegRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for StegRef<T> {}

impl<T> From<StegRef<T>> for StegId {
    fn from(r: StegRef<T>) -> Self {
        r.id
    }
}
