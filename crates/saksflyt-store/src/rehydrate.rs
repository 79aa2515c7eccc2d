//! Rebuild a step graph from its rows
//!
//! Two passes: every node is created first, then edges are wired by id.
//! Shared children therefore come back as one node, and an edge naming a
//! step that has no row is reported instead of silently dropped.

use crate::rows::GrafRader;
use crate::StoreError;
use saksflyt_domain::{Sporing, StegGraf, StegId, Svar};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A rebuilt graph and the steps flagged as roots
#[derive(Debug, Clone)]
pub struct RehydratedGraf {
    /// Rebuilt graph
    pub graf: StegGraf,
    /// Steps stored with the root flag
    pub roots: BTreeSet<StegId>,
}

/// Rebuild a graph; cycles and duplicate ids surface as domain errors
pub fn rehydrate(rader: GrafRader) -> Result<RehydratedGraf, StoreError> {
    let mut sporing_by_steg: BTreeMap<StegId, Sporing> = BTreeMap::new();
    for rad in &rader.sporing {
        if sporing_by_steg.insert(rad.steg_id, rad.to_sporing()?).is_some() {
            return Err(StoreError::InvalidData(format!(
                "Step {} has more than one provenance row",
                rad.steg_id
            )));
        }
    }

    let mut graf = StegGraf::new();
    let mut roots = BTreeSet::new();

    for rad in &rader.steg {
        let sporing = sporing_by_steg.remove(&rad.id).unwrap_or(Sporing::Ingen);
        let svar = match rad.verdi()? {
            Some(verdi) => Svar::besvart(rad.svartype, verdi, sporing).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "Answered step '{}' has no usable provenance",
                    rad.noekkel
                ))
            })?,
            None if sporing.is_ingen() => Svar::ubesvart(rad.svartype),
            None => {
                return Err(StoreError::InvalidData(format!(
                    "Unanswered step '{}' carries provenance",
                    rad.noekkel
                )))
            }
        };

        graf.insert_node(rad.id, &rad.noekkel, svar)?;
        if rad.rot {
            roots.insert(rad.id);
        }
    }

    if let Some(orphan) = sporing_by_steg.keys().next() {
        return Err(StoreError::InvalidData(format!(
            "Provenance row for missing step {}",
            orphan
        )));
    }

    for kant in &rader.kanter {
        if graf.step(kant.parent_id).is_none() || graf.step(kant.child_id).is_none() {
            return Err(StoreError::DanglingReference {
                parent: kant.parent_id,
                child: kant.child_id,
            });
        }
        graf.add_dependency(kant.parent_id, kant.child_id)?;
    }

    debug!(
        steps = graf.len(),
        edges = rader.kanter.len(),
        roots = roots.len(),
        "Rehydrated step graph"
    );
    Ok(RehydratedGraf { graf, roots })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::rows::dehydrate;
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use saksflyt_domain::{BehandlingId, Svartype, Verdi};

    const NODES: usize = 10;

    const TYPES: [Svartype; 5] = [
        Svartype::Boolsk,
        Svartype::Heltall,
        Svartype::Desimal,
        Svartype::Dato,
        Svartype::Tekst,
    ];

    /// Seed for one answer: value material and provenance kind
    #[derive(Debug, Clone)]
    struct Svarfroe {
        heltall: i64,
        desimal: f64,
        dager: i32,
        kilde: bool,
    }

    fn svarfroe() -> impl Strategy<Value = Svarfroe> {
        (any::<i64>(), -1.0e12..1.0e12f64, 1..800_000i32, any::<bool>()).prop_map(
            |(heltall, desimal, dager, kilde)| Svarfroe { heltall, desimal, dager, kilde },
        )
    }

    fn verdi(svartype: Svartype, froe: &Svarfroe) -> Verdi {
        match svartype {
            Svartype::Boolsk => Verdi::Boolsk(froe.heltall % 2 == 0),
            Svartype::Heltall => Verdi::Heltall(froe.heltall),
            Svartype::Desimal => Verdi::Desimal(froe.desimal),
            Svartype::Dato => Verdi::Dato(
                NaiveDate::from_num_days_from_ce_opt(froe.dager).unwrap(),
            ),
            Svartype::Tekst => Verdi::Tekst(format!("søknad {}", froe.heltall)),
        }
    }

    fn sporing(froe: &Svarfroe) -> Sporing {
        let tidspunkt = Utc
            .timestamp_opt(1_700_000_000 + i64::from(froe.dager), froe.dager.unsigned_abs())
            .unwrap();
        if froe.kilde {
            Sporing::kilde(tidspunkt, format!(r#"{{"felt":{}}}"#, froe.heltall))
        } else {
            Sporing::manuell(tidspunkt, "Z111111".into(), format!("vurdert {}", froe.dager))
        }
    }

    /// Edges point from higher to lower index, so answering in index order
    /// never invalidates an earlier answer.
    fn build(
        edges: &[(usize, usize)],
        answers: &[Option<Svarfroe>],
    ) -> (StegGraf, Vec<StegId>) {
        let mut graf = StegGraf::new();
        let ids: Vec<StegId> = (0..NODES)
            .map(|i| graf.add_untyped_step(&format!("s{i}"), TYPES[i % TYPES.len()]).unwrap())
            .collect();
        for &(x, y) in edges {
            if x != y {
                graf.add_dependency(ids[x.max(y)], ids[x.min(y)]).unwrap();
            }
        }
        for (i, froe) in answers.iter().enumerate() {
            if let Some(froe) = froe {
                let svartype = TYPES[i % TYPES.len()];
                graf.answer(ids[i], verdi(svartype, froe), sporing(froe)).unwrap();
            }
        }
        (graf, ids)
    }

    proptest! {
        /// Property: rehydrate(dehydrate(g)) == g, roots included
        #[test]
        fn test_round_trip_fidelity(
            edges in prop::collection::vec((0..NODES, 0..NODES), 0..30),
            answers in prop::collection::vec(prop::option::of(svarfroe()), NODES),
            root_flags in prop::collection::vec(any::<bool>(), NODES),
        ) {
            let (graf, ids) = build(&edges, &answers);
            let roots: BTreeSet<StegId> = ids
                .iter()
                .zip(&root_flags)
                .filter(|(_, rot)| **rot)
                .map(|(id, _)| *id)
                .collect();

            let rebuilt = rehydrate(dehydrate(BehandlingId::new(), &graf, &roots)).unwrap();

            prop_assert_eq!(&rebuilt.roots, &roots);
            prop_assert_eq!(&rebuilt.graf, &graf);
            for id in &ids {
                prop_assert_eq!(
                    rebuilt.graf.all_steps(*id).unwrap(),
                    graf.all_steps(*id).unwrap()
                );
            }
        }
    }
}
