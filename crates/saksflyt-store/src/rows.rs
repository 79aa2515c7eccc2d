//! Flat row model for a step graph
//!
//! A graph is stored as three row sets: one row per step, one provenance
//! row per step and one row per dependency edge. Converting between the
//! graph and its rows is pure; see [`dehydrate`] and
//! [`crate::rehydrate::rehydrate`].

use crate::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use saksflyt_domain::{Aktor, BehandlingId, Sporing, Steg, StegGraf, StegId, Svartype, Verdi};
use std::collections::BTreeSet;

/// Whether a step row carries a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StegTilstand {
    /// No value columns are set
    IkkeBesvart,
    /// Exactly the column matching the declared type is set
    Besvart,
}

impl StegTilstand {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            StegTilstand::IkkeBesvart => "IKKE_BESVART",
            StegTilstand::Besvart => "BESVART",
        }
    }

    /// Parse a storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IKKE_BESVART" => Some(StegTilstand::IkkeBesvart),
            "BESVART" => Some(StegTilstand::Besvart),
            _ => None,
        }
    }
}

/// One step
#[derive(Debug, Clone, PartialEq)]
pub struct StegRad {
    /// Owning case
    pub behandling_id: BehandlingId,
    /// Step id
    pub id: StegId,
    /// Logical key
    pub noekkel: String,
    /// Declared answer type
    pub svartype: Svartype,
    /// Value of a boolean step
    pub verdi_boolsk: Option<bool>,
    /// Value of an integer step
    pub verdi_heltall: Option<i64>,
    /// Value of a decimal step
    pub verdi_desimal: Option<f64>,
    /// Value of a date step
    pub verdi_dato: Option<NaiveDate>,
    /// Value of a text step
    pub verdi_tekst: Option<String>,
    /// Answered or not
    pub tilstand: StegTilstand,
    /// Step is one of the Behandling's roots
    pub rot: bool,
}

impl StegRad {
    /// Flatten a step
    pub fn from_steg(behandling_id: BehandlingId, steg: &Steg, rot: bool) -> Self {
        let mut rad = Self {
            behandling_id,
            id: steg.id(),
            noekkel: steg.key().to_string(),
            svartype: steg.svar().svartype(),
            verdi_boolsk: None,
            verdi_heltall: None,
            verdi_desimal: None,
            verdi_dato: None,
            verdi_tekst: None,
            tilstand: StegTilstand::IkkeBesvart,
            rot,
        };

        if let Some(verdi) = steg.svar().verdi() {
            rad.tilstand = StegTilstand::Besvart;
            match verdi {
                Verdi::Boolsk(v) => rad.verdi_boolsk = Some(*v),
                Verdi::Heltall(v) => rad.verdi_heltall = Some(*v),
                Verdi::Desimal(v) => rad.verdi_desimal = Some(*v),
                Verdi::Dato(v) => rad.verdi_dato = Some(*v),
                Verdi::Tekst(v) => rad.verdi_tekst = Some(v.clone()),
            }
        }
        rad
    }

    fn columns_set(&self) -> usize {
        [
            self.verdi_boolsk.is_some(),
            self.verdi_heltall.is_some(),
            self.verdi_desimal.is_some(),
            self.verdi_dato.is_some(),
            self.verdi_tekst.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// The stored value, checked against the declared type and row tilstand
    pub fn verdi(&self) -> Result<Option<Verdi>, StoreError> {
        let verdi = match self.svartype {
            Svartype::Boolsk => self.verdi_boolsk.map(Verdi::Boolsk),
            Svartype::Heltall => self.verdi_heltall.map(Verdi::Heltall),
            Svartype::Desimal => self.verdi_desimal.map(Verdi::Desimal),
            Svartype::Dato => self.verdi_dato.map(Verdi::Dato),
            Svartype::Tekst => self.verdi_tekst.clone().map(Verdi::Tekst),
        };

        let expected_columns = match self.tilstand {
            StegTilstand::IkkeBesvart => 0,
            StegTilstand::Besvart => 1,
        };
        if self.columns_set() != expected_columns
            || verdi.is_some() != (self.tilstand == StegTilstand::Besvart)
        {
            return Err(StoreError::InvalidData(format!(
                "Step '{}' ({}) is {} but has {} value column(s) set",
                self.noekkel,
                self.svartype,
                self.tilstand.as_str(),
                self.columns_set()
            )));
        }
        Ok(verdi)
    }
}

/// Provenance of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SporingRad {
    /// Owning case
    pub behandling_id: BehandlingId,
    /// Step the provenance belongs to
    pub steg_id: StegId,
    /// `ingen`, `manuell` or `kilde`
    pub kind: String,
    /// Set for manual and sourced provenance
    pub tidspunkt: Option<DateTime<Utc>>,
    /// Manual only
    pub utfort_av: Option<String>,
    /// Manual only
    pub begrunnelse: Option<String>,
    /// Sourced only
    pub kildedata: Option<String>,
}

impl SporingRad {
    /// Flatten a provenance record
    pub fn from_sporing(behandling_id: BehandlingId, steg_id: StegId, sporing: &Sporing) -> Self {
        let mut rad = Self {
            behandling_id,
            steg_id,
            kind: sporing.kind().to_string(),
            tidspunkt: sporing.tidspunkt(),
            utfort_av: None,
            begrunnelse: None,
            kildedata: None,
        };
        match sporing {
            Sporing::Ingen => {}
            Sporing::Manuell {
                utfort_av,
                begrunnelse,
                ..
            } => {
                rad.utfort_av = Some(utfort_av.ident().to_string());
                rad.begrunnelse = Some(begrunnelse.clone());
            }
            Sporing::Kilde { kildedata, .. } => {
                rad.kildedata = Some(kildedata.clone());
            }
        }
        rad
    }

    /// Rebuild the provenance record
    pub fn to_sporing(&self) -> Result<Sporing, StoreError> {
        let missing = |column: &str| {
            StoreError::InvalidData(format!(
                "Provenance '{}' of step {} is missing {}",
                self.kind, self.steg_id, column
            ))
        };

        match self.kind.as_str() {
            "ingen" => Ok(Sporing::Ingen),
            "manuell" => Ok(Sporing::Manuell {
                tidspunkt: self.tidspunkt.ok_or_else(|| missing("tidspunkt"))?,
                utfort_av: Aktor::new(self.utfort_av.clone().ok_or_else(|| missing("utfort_av"))?),
                begrunnelse: self.begrunnelse.clone().ok_or_else(|| missing("begrunnelse"))?,
            }),
            "kilde" => Ok(Sporing::Kilde {
                tidspunkt: self.tidspunkt.ok_or_else(|| missing("tidspunkt"))?,
                kildedata: self.kildedata.clone().ok_or_else(|| missing("kildedata"))?,
            }),
            other => Err(StoreError::InvalidData(format!(
                "Unknown provenance type '{}' on step {}",
                other, self.steg_id
            ))),
        }
    }
}

/// One dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KantRad {
    /// Owning case
    pub behandling_id: BehandlingId,
    /// Depending step
    pub parent_id: StegId,
    /// Step depended on
    pub child_id: StegId,
}

/// All rows of one graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrafRader {
    /// Step rows
    pub steg: Vec<StegRad>,
    /// Provenance rows
    pub sporing: Vec<SporingRad>,
    /// Edge rows
    pub kanter: Vec<KantRad>,
}

/// Flatten a graph into rows
///
/// Every node appears exactly once no matter how many parents share it.
pub fn dehydrate(
    behandling_id: BehandlingId,
    graf: &StegGraf,
    roots: &BTreeSet<StegId>,
) -> GrafRader {
    let mut rader = GrafRader::default();
    for steg in graf.steps() {
        rader
            .steg
            .push(StegRad::from_steg(behandling_id, steg, roots.contains(&steg.id())));
        rader
            .sporing
            .push(SporingRad::from_sporing(behandling_id, steg.id(), steg.svar().sporing()));
    }
    rader.kanter = graf
        .edges()
        .map(|(parent_id, child_id)| KantRad {
            behandling_id,
            parent_id,
            child_id,
        })
        .collect();
    rader
}
