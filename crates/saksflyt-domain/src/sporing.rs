//! Provenance tracking for answers

use crate::tilgang::Aktor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an answer holds its current value
///
/// Closed set: a value is absent, typed in by a case worker, or copied from
/// a source questionnaire snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Sporing {
    /// Never answered (or invalidated)
    Ingen,

    /// Entered by a case worker
    Manuell {
        /// When the answer was given
        tidspunkt: DateTime<Utc>,
        /// Who gave it
        utfort_av: Aktor,
        /// Justification text
        begrunnelse: String,
    },

    /// Copied verbatim from an external questionnaire
    Kilde {
        /// When the snapshot was taken
        tidspunkt: DateTime<Utc>,
        /// Raw source payload
        kildedata: String,
    },
}

impl Sporing {
    /// Manual provenance
    pub fn manuell(
        tidspunkt: DateTime<Utc>,
        utfort_av: Aktor,
        begrunnelse: impl Into<String>,
    ) -> Self {
        Sporing::Manuell {
            tidspunkt,
            utfort_av,
            begrunnelse: begrunnelse.into(),
        }
    }

    /// Provenance for an answer copied from a source payload
    pub fn kilde(tidspunkt: DateTime<Utc>, kildedata: impl Into<String>) -> Self {
        Sporing::Kilde {
            tidspunkt,
            kildedata: kildedata.into(),
        }
    }

    /// Storage discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Sporing::Ingen => "ingen",
            Sporing::Manuell { .. } => "manuell",
            Sporing::Kilde { .. } => "kilde",
        }
    }

    /// Whether this is [`Sporing::Ingen`]
    pub fn is_ingen(&self) -> bool {
        matches!(self, Sporing::Ingen)
    }

    /// When the answer was recorded
    pub fn tidspunkt(&self) -> Option<DateTime<Utc>> {
        match self {
            Sporing::Ingen => None,
            Sporing::Manuell { tidspunkt, .. } | Sporing::Kilde { tidspunkt, .. } => {
                Some(*tidspunkt)
            }
        }
    }
}
