//! Step graph engine: traversal, frontier and answer invalidation
//!
//! Steps live in an arena keyed by [`StegId`]; edges are ids, never owning
//! references. A child shared by two parents (a diamond) is therefore one
//! node, and every walk dedupes by id.
//!
//! ```text
//!   eligible ──► age ──► income
//!      │                   ▲
//!      └───────────────────┘
//! ```
//!
//! Answering `income` invalidates every step that reaches it through
//! depends-on edges (`age` and `eligible` above), computed from an inverse
//! edge index built once per answer.

use crate::error::DomainError;
use crate::ids::StegId;
use crate::sporing::Sporing;
use crate::steg::{Steg, StegRef};
use crate::svar::{Svar, SvarVerdi, Svartype, Verdi};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of [`StegGraf::answer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Same value and provenance as before; nothing changed
    Unchanged,

    /// The answer was stored
    Answered {
        /// Previously answered ancestors that were reset to unanswered
        invalidated: BTreeSet<StegId>,
    },
}

impl AnswerOutcome {
    /// Steps reset by this answer (empty when unchanged)
    pub fn invalidated(&self) -> BTreeSet<StegId> {
        match self {
            AnswerOutcome::Unchanged => BTreeSet::new(),
            AnswerOutcome::Answered { invalidated } => invalidated.clone(),
        }
    }
}

/// Arena of steps forming a directed acyclic dependency graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StegGraf {
    steps: BTreeMap<StegId, Steg>,
    keys: BTreeMap<String, StegId>,
}

impl StegGraf {
    /// An empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new, unanswered step with a typed handle
    pub fn add_step<T: SvarVerdi>(&mut self, key: &str) -> Result<StegRef<T>, DomainError> {
        let id = self.add_untyped_step(key, T::SVARTYPE)?;
        Ok(StegRef::new(id))
    }

    /// Add a new, unanswered step whose type is only known at runtime
    pub fn add_untyped_step(&mut self, key: &str, svartype: Svartype) -> Result<StegId, DomainError> {
        let steg = Steg::new(key, svartype);
        let id = steg.id();
        self.insert(steg)?;
        Ok(id)
    }

    /// Insert a node with a known id and answer and no edges
    ///
    /// Used when rebuilding a graph from storage; edges are attached
    /// afterwards with [`StegGraf::add_dependency`].
    pub fn insert_node(&mut self, id: StegId, key: &str, svar: Svar) -> Result<(), DomainError> {
        self.insert(Steg::with_svar(id, key, svar))
    }

    fn insert(&mut self, steg: Steg) -> Result<(), DomainError> {
        if self.steps.contains_key(&steg.id()) {
            return Err(DomainError::DuplicateStep(steg.id()));
        }
        if self.keys.contains_key(steg.key()) {
            return Err(DomainError::DuplicateKey(steg.key().to_string()));
        }
        self.keys.insert(steg.key().to_string(), steg.id());
        self.steps.insert(steg.id(), steg);
        Ok(())
    }

    /// Record that `parent` depends on `child`
    ///
    /// Rejects unknown endpoints, self-references and any edge that would
    /// close a cycle. Returns `false` if the edge already existed.
    pub fn add_dependency(
        &mut self,
        parent: impl Into<StegId>,
        child: impl Into<StegId>,
    ) -> Result<bool, DomainError> {
        let (parent, child) = (parent.into(), child.into());
        if !self.steps.contains_key(&child) {
            return Err(DomainError::UnknownStep(child));
        }
        if parent == child || self.all_steps(child)?.contains(&parent) {
            return Err(DomainError::Cycle { parent, child });
        }

        let steg = self
            .steps
            .get_mut(&parent)
            .ok_or(DomainError::UnknownStep(parent))?;
        Ok(steg.add_edge(child))
    }

    /// Lookup one step by id
    pub fn step(&self, id: StegId) -> Option<&Steg> {
        self.steps.get(&id)
    }

    /// Lookup one step by logical key
    pub fn step_by_key(&self, key: &str) -> Option<&Steg> {
        self.keys.get(key).and_then(|id| self.steps.get(id))
    }

    /// Iterate all steps in id order
    pub fn steps(&self) -> impl Iterator<Item = &Steg> {
        self.steps.values()
    }

    /// Iterate all (parent, child) edges
    pub fn edges(&self) -> impl Iterator<Item = (StegId, StegId)> + '_ {
        self.steps
            .values()
            .flat_map(|s| s.depends_on().iter().map(move |child| (s.id(), *child)))
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Typed value of a step, if answered
    pub fn verdi<T: SvarVerdi>(&self, steg: StegRef<T>) -> Option<T> {
        self.step(steg.id()).and_then(|s| s.svar().get::<T>())
    }

    /// `start` plus every step reachable from it through depends-on edges
    pub fn all_steps(&self, start: StegId) -> Result<BTreeSet<StegId>, DomainError> {
        self.all_steps_from([start])
    }

    /// Union of [`StegGraf::all_steps`] over several starting points
    pub fn all_steps_from(
        &self,
        starts: impl IntoIterator<Item = StegId>,
    ) -> Result<BTreeSet<StegId>, DomainError> {
        let starts: Vec<StegId> = starts.into_iter().collect();
        if let Some(missing) = starts.iter().find(|id| !self.steps.contains_key(id)) {
            return Err(DomainError::UnknownStep(*missing));
        }

        Ok(walk(starts, |id| {
            self.steps
                .get(&id)
                .into_iter()
                .flat_map(|s| s.depends_on().iter().copied())
        }))
    }

    /// Unanswered steps among [`StegGraf::all_steps`]
    ///
    /// Empty means the subgraph rooted at `start` is fully answered.
    pub fn frontier(&self, start: StegId) -> Result<BTreeSet<StegId>, DomainError> {
        self.frontier_from([start])
    }

    /// Union of [`StegGraf::frontier`] over several starting points
    pub fn frontier_from(
        &self,
        starts: impl IntoIterator<Item = StegId>,
    ) -> Result<BTreeSet<StegId>, DomainError> {
        Ok(self
            .all_steps_from(starts)?
            .into_iter()
            .filter(|id| self.steps.get(id).is_some_and(|s| !s.er_besvart()))
            .collect())
    }

    /// Inverse of depends-on: child -> steps that depend on it directly
    pub fn dependents_index(&self) -> BTreeMap<StegId, BTreeSet<StegId>> {
        let mut index: BTreeMap<StegId, BTreeSet<StegId>> = BTreeMap::new();
        for (parent, child) in self.edges() {
            index.entry(child).or_default().insert(parent);
        }
        index
    }

    /// Every step that depends on `id`, directly or transitively
    pub fn ancestors(&self, id: StegId) -> Result<BTreeSet<StegId>, DomainError> {
        if !self.steps.contains_key(&id) {
            return Err(DomainError::UnknownStep(id));
        }
        let index = self.dependents_index();
        let parents_of = |n: StegId| index.get(&n).into_iter().flatten().copied();

        Ok(walk(parents_of(id), parents_of))
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

    /// Answer a step and invalidate everything that depends on it
    ///
    /// Fails without mutation if the value's type differs from the declared
    /// type, a decimal is not finite or the provenance is [`Sporing::Ingen`].
    /// `-0.0` is stored as `0.0`. Re-answering with the same value and
    /// provenance is a no-op. Same value with new provenance
    /// replaces the provenance only; a new value resets every ancestor to
    /// unanswered.
    pub fn answer(
        &mut self,
        id: StegId,
        verdi: Verdi,
        sporing: Sporing,
    ) -> Result<AnswerOutcome, DomainError> {
        let steg = self.steps.get(&id).ok_or(DomainError::UnknownStep(id))?;
        let declared = steg.svar().svartype();
        if verdi.svartype() != declared {
            return Err(DomainError::TypeMismatch {
                key: steg.key().to_string(),
                declared,
                actual: verdi.svartype(),
            });
        }
        let rendered = verdi.to_string();
        let verdi = verdi.normalisert().ok_or_else(|| DomainError::InvalidValue {
            key: steg.key().to_string(),
            verdi: rendered,
        })?;

        let same_value = steg.svar().verdi() == Some(&verdi);
        if same_value && steg.svar().sporing() == &sporing {
            debug!(step = %steg.key(), "Identical answer, nothing to do");
            return Ok(AnswerOutcome::Unchanged);
        }

        let key = steg.key().to_string();
        let svar = Svar::besvart(declared, verdi, sporing)
            .ok_or_else(|| DomainError::MissingProvenance(key.clone()))?;

        let invalidated = if same_value {
            BTreeSet::new()
        } else {
            let ancestors = self.ancestors(id)?;
            self.invalidate(&ancestors)
        };

        if let Some(steg) = self.steps.get_mut(&id) {
            steg.replace_svar(svar);
        }

        debug!(
            step = %key,
            invalidated = invalidated.len(),
            "Step answered"
        );
        Ok(AnswerOutcome::Answered { invalidated })
    }

    /// Reset every step in `ids` to unanswered, returning those that held a value
    fn invalidate(&mut self, ids: &BTreeSet<StegId>) -> BTreeSet<StegId> {
        let mut cleared = BTreeSet::new();
        for id in ids {
            let Some(steg) = self.steps.get_mut(id) else {
                unreachable!("ancestor {id} is not part of the graph it was computed from");
            };
            if steg.er_besvart() {
                cleared.insert(*id);
                debug!(step = %steg.key(), "Invalidating dependent answer");
            }
            let svartype = steg.svar().svartype();
            steg.replace_svar(Svar::ubesvart(svartype));
        }
        cleared
    }
}

/// Visited-set guarded depth-first walk
fn walk<F, I>(starts: impl IntoIterator<Item = StegId>, mut neighbours: F) -> BTreeSet<StegId>
where
    F: FnMut(StegId) -> I,
    I: IntoIterator<Item = StegId>,
{
    let mut visited = BTreeSet::new();
    let mut stack: Vec<StegId> = starts.into_iter().collect();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        stack.extend(neighbours(id).into_iter().filter(|n| !visited.contains(n)));
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn manuell(begrunnelse: &str) -> Sporing {
        Sporing::manuell(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            "Z111111".into(),
            begrunnelse,
        )
    }

    /// eligible(A) -> age(B) -> income(C)
    fn chain() -> (StegGraf, StegRef<bool>, StegRef<bool>, StegRef<i64>) {
        let mut graf = StegGraf::new();
        let a = graf.add_step::<bool>("eligible").unwrap();
        let b = graf.add_step::<bool>("age").unwrap();
        let c = graf.add_step::<i64>("income").unwrap();
        graf.add_dependency(a, b).unwrap();
        graf.add_dependency(b, c).unwrap();
        (graf, a, b, c)
    }

    #[test]
    fn test_example_scenario() {
        let (mut graf, a, b, c) = chain();

        graf.answer_typed(c, 1000, manuell("inntekt")).unwrap();
        graf.answer_typed(b, true, manuell("alder")).unwrap();
        graf.answer_typed(a, true, manuell("vilkår")).unwrap();
        assert!(graf.frontier(a.id()).unwrap().is_empty());

        let outcome = graf.answer_typed(c, 2000, manuell("ny inntekt")).unwrap();

        let expected = BTreeSet::from([a.id(), b.id()]);
        assert_eq!(graf.frontier(a.id()).unwrap(), expected);
        assert_eq!(outcome.invalidated(), expected);
        assert_eq!(graf.verdi(c), Some(2000));
        assert_eq!(graf.step(a.id()).unwrap().svar().sporing(), &Sporing::Ingen);
    }

    #[test]
    fn test_sibling_branch_untouched() {
        let mut graf = StegGraf::new();
        let root = graf.add_step::<bool>("root").unwrap();
        let left = graf.add_step::<bool>("left").unwrap();
        let right = graf.add_step::<bool>("right").unwrap();
        let leaf = graf.add_step::<i64>("leaf").unwrap();
        graf.add_dependency(root, left).unwrap();
        graf.add_dependency(root, right).unwrap();
        graf.add_dependency(left, leaf).unwrap();

        graf.answer_typed(right, true, manuell("r")).unwrap();
        graf.answer_typed(left, true, manuell("l")).unwrap();
        graf.answer_typed(leaf, 5, manuell("leaf")).unwrap();

        assert_eq!(graf.verdi(right), Some(true));
        assert_eq!(graf.verdi(left), None);
    }

    #[test]
    fn test_diamond_shares_child() {
        let mut graf = StegGraf::new();
        let a = graf.add_step::<bool>("a").unwrap();
        let b = graf.add_step::<bool>("b").unwrap();
        let c = graf.add_step::<i64>("c").unwrap();
        graf.add_dependency(a, c).unwrap();
        graf.add_dependency(b, c).unwrap();

        graf.answer_typed(a, true, manuell("a")).unwrap();
        graf.answer_typed(b, true, manuell("b")).unwrap();
        let outcome = graf.answer_typed(c, 1, manuell("c")).unwrap();

        assert_eq!(outcome.invalidated(), BTreeSet::from([a.id(), b.id()]));
        assert!(graf.all_steps(a.id()).unwrap().contains(&c.id()));
        assert!(graf.all_steps(b.id()).unwrap().contains(&c.id()));
        assert_eq!(graf.len(), 3);
        assert_eq!(graf.dependents_index()[&c.id()].len(), 2);
    }

    #[test]
    fn test_all_steps_counts_shared_child_once() {
        let mut graf = StegGraf::new();
        let top = graf.add_step::<bool>("top").unwrap();
        let a = graf.add_step::<bool>("a").unwrap();
        let b = graf.add_step::<bool>("b").unwrap();
        let shared = graf.add_step::<i64>("shared").unwrap();
        graf.add_dependency(top, a).unwrap();
        graf.add_dependency(top, b).unwrap();
        graf.add_dependency(a, shared).unwrap();
        graf.add_dependency(b, shared).unwrap();

        assert_eq!(graf.all_steps(top.id()).unwrap().len(), 4);
    }

    #[test]
    fn test_type_mismatch_leaves_graph_untouched() {
        let (mut graf, a, b, c) = chain();
        graf.answer_typed(b, true, manuell("b")).unwrap();
        let before = graf.clone();

        let err = graf
            .answer(c.id(), Verdi::Tekst("tusen".into()), manuell("c"))
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::TypeMismatch { declared: Svartype::Heltall, actual: Svartype::Tekst, .. }
        ));
        assert_eq!(graf, before);
        assert_eq!(graf.verdi(a), None);
    }

    #[test]
    fn test_missing_provenance_rejected() {
        let (mut graf, _, _, c) = chain();
        let err = graf.answer(c.id(), Verdi::Heltall(1), Sporing::Ingen).unwrap_err();
        assert_eq!(err, DomainError::MissingProvenance("income".into()));
        assert_eq!(graf.verdi(c), None);
    }

    #[test]
    fn test_non_finite_decimal_rejected() {
        let mut graf = StegGraf::new();
        let sats = graf.add_step::<f64>("sats").unwrap();
        let top = graf.add_step::<bool>("top").unwrap();
        graf.add_dependency(top, sats).unwrap();
        graf.answer_typed(top, true, manuell("top")).unwrap();
        let before = graf.clone();

        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = graf.answer_typed(sats, v, manuell("sats")).unwrap_err();
            assert!(matches!(err, DomainError::InvalidValue { ref key, .. } if key == "sats"));
        }
        assert_eq!(graf, before);
    }

    #[test]
    fn test_negative_zero_reanswer_is_noop() {
        let mut graf = StegGraf::new();
        let sats = graf.add_step::<f64>("sats").unwrap();
        graf.answer_typed(sats, -0.0, manuell("sats")).unwrap();

        let stored = graf.verdi(sats).unwrap();
        assert!(stored == 0.0 && stored.is_sign_positive());
        assert_eq!(graf.answer_typed(sats, 0.0, manuell("sats")).unwrap(), AnswerOutcome::Unchanged);
        assert_eq!(graf.answer_typed(sats, -0.0, manuell("sats")).unwrap(), AnswerOutcome::Unchanged);
    }

    #[test]
    fn test_identical_reanswer_is_noop() {
        let (mut graf, a, _, c) = chain();
        graf.answer_typed(c, 1000, manuell("c")).unwrap();
        graf.answer_typed(a, true, manuell("a")).unwrap();

        let outcome = graf.answer_typed(c, 1000, manuell("c")).unwrap();

        assert_eq!(outcome, AnswerOutcome::Unchanged);
        assert_eq!(graf.verdi(a), Some(true));
    }

    #[test]
    fn test_new_provenance_same_value_keeps_ancestors() {
        let (mut graf, a, _, c) = chain();
        graf.answer_typed(c, 1000, manuell("c")).unwrap();
        graf.answer_typed(a, true, manuell("a")).unwrap();

        let kilde = Sporing::kilde(Utc::now(), r#"{"inntekt":1000}"#);
        let outcome = graf.answer_typed(c, 1000, kilde.clone()).unwrap();

        assert!(outcome.invalidated().is_empty());
        assert_eq!(graf.verdi(a), Some(true));
        assert_eq!(graf.step(c.id()).unwrap().svar().sporing(), &kilde);
    }

    #[test]
    fn test_cycle_rejected() {
        let (mut graf, a, _, c) = chain();
        let err = graf.add_dependency(c, a).unwrap_err();
        assert_eq!(err, DomainError::Cycle { parent: c.id(), child: a.id() });
    }

    #[test]
    fn test_self_reference_rejected() {
        let (mut graf, a, _, _) = chain();
        assert!(matches!(graf.add_dependency(a, a), Err(DomainError::Cycle { .. })));
    }

    #[test]
    fn test_duplicate_edge_and_key() {
        let (mut graf, a, b, _) = chain();
        assert!(!graf.add_dependency(a, b).unwrap());
        assert_eq!(
            graf.add_step::<bool>("age").unwrap_err(),
            DomainError::DuplicateKey("age".into())
        );
    }

    #[test]
    fn test_unknown_step() {
        let (graf, _, _, _) = chain();
        let ghost = StegId::new();
        assert_eq!(graf.all_steps(ghost).unwrap_err(), DomainError::UnknownStep(ghost));
        assert_eq!(graf.ancestors(ghost).unwrap_err(), DomainError::UnknownStep(ghost));
    }

    #[test]
    fn test_step_by_key() {
        let (graf, _, b, _) = chain();
        assert_eq!(graf.step_by_key("age").map(Steg::id), Some(b.id()));
        assert!(graf.step_by_key("missing").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    const NODES: usize = 10;

    /// Graph over `NODES` integer steps; edges point from higher to lower
    /// index so any generated edge set is acyclic.
    fn build(edges: &[(usize, usize)], answered: &[bool]) -> (StegGraf, Vec<StegId>) {
        let mut graf = StegGraf::new();
        let ids: Vec<StegId> = (0..NODES)
            .map(|i| graf.add_untyped_step(&format!("s{i}"), Svartype::Heltall).unwrap())
            .collect();
        for &(x, y) in edges {
            if x != y {
                graf.add_dependency(ids[x.max(y)], ids[x.min(y)]).unwrap();
            }
        }
        for (i, _) in answered.iter().enumerate().filter(|(_, a)| **a) {
            let sporing = Sporing::kilde(Utc::now(), "{}");
            graf.insert_answer_for_test(ids[i], Verdi::Heltall(i as i64), sporing);
        }
        (graf, ids)
    }

    impl StegGraf {
        fn insert_answer_for_test(&mut self, id: StegId, verdi: Verdi, sporing: Sporing) {
            let steg = self.steps.get_mut(&id).unwrap();
            let svar = Svar::besvart(steg.svar().svartype(), verdi, sporing).unwrap();
            steg.replace_svar(svar);
        }
    }

    fn edges() -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0..NODES, 0..NODES), 0..30)
    }

    proptest! {
        /// Property: all_steps is closed under depends-on and a fixed point
        #[test]
        fn test_reachability_closure(edges in edges(), start in 0..NODES) {
            let (graf, ids) = build(&edges, &[]);
            let reached = graf.all_steps(ids[start]).unwrap();

            for id in &reached {
                for child in graf.step(*id).unwrap().depends_on() {
                    prop_assert!(reached.contains(child));
                }
            }
            prop_assert_eq!(graf.all_steps_from(reached.iter().copied()).unwrap(), reached);
        }

        /// Property: frontier is empty iff every reachable step is answered
        #[test]
        fn test_frontier_correctness(
            edges in edges(),
            answered in prop::collection::vec(any::<bool>(), NODES),
            start in 0..NODES,
        ) {
            let (graf, ids) = build(&edges, &answered);
            let frontier = graf.frontier(ids[start]).unwrap();
            let all_answered = graf
                .all_steps(ids[start])
                .unwrap()
                .iter()
                .all(|id| graf.step(*id).unwrap().er_besvart());

            prop_assert_eq!(frontier.is_empty(), all_answered);
        }

        /// Property: answering twice equals answering once
        #[test]
        fn test_idempotent_reanswer(
            edges in edges(),
            answered in prop::collection::vec(any::<bool>(), NODES),
            target in 0..NODES,
            value in any::<i64>(),
        ) {
            let (mut once, ids) = build(&edges, &answered);
            let sporing = Sporing::manuell(Utc::now(), "Z1".into(), "prop");

            once.answer(ids[target], Verdi::Heltall(value), sporing.clone()).unwrap();
            let mut twice = once.clone();
            let second = twice.answer(ids[target], Verdi::Heltall(value), sporing).unwrap();

            prop_assert_eq!(second, AnswerOutcome::Unchanged);
            prop_assert_eq!(once, twice);
        }

        /// Property: after answering, no ancestor holds a value
        #[test]
        fn test_ancestors_invalidated(
            edges in edges(),
            target in 0..NODES,
        ) {
            let answered = vec![true; NODES];
            let (mut graf, ids) = build(&edges, &answered);
            let ancestors = graf.ancestors(ids[target]).unwrap();
            let sporing = Sporing::manuell(Utc::now(), "Z1".into(), "prop");

            graf.answer(ids[target], Verdi::Heltall(-1), sporing).unwrap();

            for id in &ancestors {
                prop_assert!(!graf.step(*id).unwrap().er_besvart());
            }
            for id in ids.iter().filter(|id| !ancestors.contains(id)) {
                prop_assert!(graf.step(*id).unwrap().er_besvart());
            }
        }
    }
}
