//! Svar: the typed, nullable answer slot held by each step

use crate::sporing::Sporing;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime type tag of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Svartype {
    /// Yes/no
    Boolsk,
    /// Whole number (amounts in øre, counts)
    Heltall,
    /// Decimal number
    Desimal,
    /// Calendar date
    Dato,
    /// Free text
    Tekst,
}

impl Svartype {
    /// Storage name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Svartype::Boolsk => "boolsk",
            Svartype::Heltall => "heltall",
            Svartype::Desimal => "desimal",
            Svartype::Dato => "dato",
            Svartype::Tekst => "tekst",
        }
    }

    /// Parse a storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boolsk" => Some(Svartype::Boolsk),
            "heltall" => Some(Svartype::Heltall),
            "desimal" => Some(Svartype::Desimal),
            "dato" => Some(Svartype::Dato),
            "tekst" => Some(Svartype::Tekst),
            _ => None,
        }
    }

    /// Parse user input into a value of this type
    pub fn parse_value(&self, raw: &str) -> Result<Verdi, String> {
        let raw = raw.trim();
        match self {
            Svartype::Boolsk => match raw.to_lowercase().as_str() {
                "true" | "ja" => Ok(Verdi::Boolsk(true)),
                "false" | "nei" => Ok(Verdi::Boolsk(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            Svartype::Heltall => raw
                .parse()
                .map(Verdi::Heltall)
                .map_err(|e| format!("'{}' is not an integer: {}", raw, e)),
            Svartype::Desimal => raw
                .parse()
                .map_err(|e| format!("'{}' is not a decimal: {}", raw, e))
                .and_then(|v| {
                    Verdi::Desimal(v)
                        .normalisert()
                        .ok_or_else(|| format!("'{}' is not a finite decimal", raw))
                }),
            Svartype::Dato => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Verdi::Dato)
                .map_err(|e| format!("'{}' is not a date (YYYY-MM-DD): {}", raw, e)),
            Svartype::Tekst => Ok(Verdi::Tekst(raw.to_string())),
        }
    }
}

impl fmt::Display for Svartype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete answer value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Verdi {
    /// Yes/no
    Boolsk(bool),
    /// Whole number
    Heltall(i64),
    /// Decimal number
    Desimal(f64),
    /// Calendar date
    Dato(NaiveDate),
    /// Free text
    Tekst(String),
}

impl Verdi {
    /// Type tag of this value
    pub fn svartype(&self) -> Svartype {
        match self {
            Verdi::Boolsk(_) => Svartype::Boolsk,
            Verdi::Heltall(_) => Svartype::Heltall,
            Verdi::Desimal(_) => Svartype::Desimal,
            Verdi::Dato(_) => Svartype::Dato,
            Verdi::Tekst(_) => Svartype::Tekst,
        }
    }

    /// Canonical form of the value, or `None` if it cannot be held by a step
    ///
    /// Decimals must be finite, and `-0.0` becomes `0.0`.
    pub fn normalisert(self) -> Option<Verdi> {
        match self {
            Verdi::Desimal(v) if !v.is_finite() => None,
            Verdi::Desimal(v) if v == 0.0 => Some(Verdi::Desimal(0.0)),
            other => Some(other),
        }
    }
}

impl fmt::Display for Verdi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdi::Boolsk(v) => write!(f, "{}", v),
            Verdi::Heltall(v) => write!(f, "{}", v),
            Verdi::Desimal(v) => write!(f, "{}", v),
            Verdi::Dato(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Verdi::Tekst(v) => f.write_str(v),
        }
    }
}

/// Rust types that can be held by a step
///
/// Lets typed handles ([`crate::StegRef`]) carry their answer type at compile time.
pub trait SvarVerdi: Sized {
    /// Type tag for this Rust type
    const SVARTYPE: Svartype;

    /// Wrap into the runtime value
    fn into_verdi(self) -> Verdi;

    /// Unwrap a runtime value of the matching type
    fn from_verdi(verdi: &Verdi) -> Option<Self>;
}

impl SvarVerdi for bool {
    const SVARTYPE: Svartype = Svartype::Boolsk;

    fn into_verdi(self) -> Verdi {
        Verdi::Boolsk(self)
    }

    fn from_verdi(verdi: &Verdi) -> Option<Self> {
        match verdi {
            Verdi::Boolsk(v) => Some(*v),
            _ => None,
        }
    }
}

impl SvarVerdi for i64 {
    const SVARTYPE: Svartype = Svartype::Heltall;

    fn into_verdi(self) -> Verdi {
        Verdi::Heltall(self)
    }

    fn from_verdi(verdi: &Verdi) -> Option<Self> {
        match verdi {
            Verdi::Heltall(v) => Some(*v),
            _ => None,
        }
    }
}

impl SvarVerdi for f64 {
    const SVARTYPE: Svartype = Svartype::Desimal;

    fn into_verdi(self) -> Verdi {
        Verdi::Desimal(self)
    }

    fn from_verdi(verdi: &Verdi) -> Option<Self> {
        match verdi {
            Verdi::Desimal(v) => Some(*v),
            _ => None,
        }
    }
}

impl SvarVerdi for NaiveDate {
    const SVARTYPE: Svartype = Svartype::Dato;

    fn into_verdi(self) -> Verdi {
        Verdi::Dato(self)
    }

    fn from_verdi(verdi: &Verdi) -> Option<Self> {
        match verdi {
            Verdi::Dato(v) => Some(*v),
            _ => None,
        }
    }
}

impl SvarVerdi for String {
    const SVARTYPE: Svartype = Svartype::Tekst;

    fn into_verdi(self) -> Verdi {
        Verdi::Tekst(self)
    }

    fn from_verdi(verdi: &Verdi) -> Option<Self> {
        match verdi {
            Verdi::Tekst(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// The answer held by one step
///
/// `verdi` is `None` exactly when the step is unanswered, and only an
/// unanswered svar may carry [`Sporing::Ingen`]. The declared type is fixed
/// at construction. A svar is never edited in place: answering or
/// invalidating a step replaces it with a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Svar {
    svartype: Svartype,
    verdi: Option<Verdi>,
    sporing: Sporing,
}

impl Svar {
    /// An unanswered svar of the given type
    pub fn ubesvart(svartype: Svartype) -> Self {
        Self {
            svartype,
            verdi: None,
            sporing: Sporing::Ingen,
        }
    }

    /// An answered svar
    ///
    /// Returns `None` if the value's type differs from `svartype`, the value
    /// is not storable (see [`Verdi::normalisert`]) or the provenance is
    /// [`Sporing::Ingen`]; callers map that to their own error.
    pub fn besvart(svartype: Svartype, verdi: Verdi, sporing: Sporing) -> Option<Self> {
        if verdi.svartype() != svartype || sporing.is_ingen() {
            return None;
        }
        let verdi = verdi.normalisert()?;
        Some(Self {
            svartype,
            verdi: Some(verdi),
            sporing,
        })
    }

    /// Declared type
    pub fn svartype(&self) -> Svartype {
        self.svartype
    }

    /// Current value, if answered
    pub fn verdi(&self) -> Option<&Verdi> {
        self.verdi.as_ref()
    }

    /// Why the svar holds its value
    pub fn sporing(&self) -> &Sporing {
        &self.sporing
    }

    /// Whether a value is present
    pub fn er_besvart(&self) -> bool {
        self.verdi.is_some()
    }

    /// Typed view of the value
    pub fn get<T: SvarVerdi>(&self) -> Option<T> {
        self.verdi.as_ref().and_then(T::from_verdi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn manuell() -> Sporing {
        Sporing::manuell(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            "Z111111".into(),
            "Sjekket mot a-ordningen",
        )
    }

    #[test]
    fn test_ubesvart_has_no_provenance() {
        let svar = Svar::ubesvart(Svartype::Heltall);
        assert!(!svar.er_besvart());
        assert_eq!(svar.sporing(), &Sporing::Ingen);
        assert_eq!(svar.svartype(), Svartype::Heltall);
    }

    #[test]
    fn test_besvart_rejects_wrong_type() {
        assert!(Svar::besvart(Svartype::Heltall, Verdi::Boolsk(true), manuell()).is_none());
    }

    #[test]
    fn test_besvart_rejects_missing_provenance() {
        assert!(Svar::besvart(Svartype::Heltall, Verdi::Heltall(1), Sporing::Ingen).is_none());
    }

    #[test]
    fn test_typed_get() {
        let svar = Svar::besvart(Svartype::Heltall, Verdi::Heltall(1000), manuell()).unwrap();
        assert_eq!(svar.get::<i64>(), Some(1000));
        assert_eq!(svar.get::<bool>(), None);
    }

    #[test]
    fn test_besvart_rejects_non_finite_decimal() {
        assert!(Svar::besvart(Svartype::Desimal, Verdi::Desimal(f64::NAN), manuell()).is_none());
        assert!(Svar::besvart(Svartype::Desimal, Verdi::Desimal(f64::INFINITY), manuell()).is_none());
    }

    #[test]
    fn test_negative_zero_normalised() {
        let svar = Svar::besvart(Svartype::Desimal, Verdi::Desimal(-0.0), manuell()).unwrap();
        let v = svar.get::<f64>().unwrap();
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn test_parse_value_rejects_non_finite_decimal() {
        for raw in ["NaN", "nan", "inf", "-inf", "infinity"] {
            assert!(Svartype::Desimal.parse_value(raw).is_err(), "accepted {raw}");
        }
        assert_eq!(Svartype::Desimal.parse_value("12.5"), Ok(Verdi::Desimal(12.5)));
        match Svartype::Desimal.parse_value("-0") {
            Ok(Verdi::Desimal(v)) => assert!(v == 0.0 && v.is_sign_positive()),
            other => panic!("expected positive zero, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_value_per_type() {
        assert_eq!(Svartype::Boolsk.parse_value("ja"), Ok(Verdi::Boolsk(true)));
        assert_eq!(Svartype::Heltall.parse_value(" 2000 "), Ok(Verdi::Heltall(2000)));
        assert_eq!(
            Svartype::Dato.parse_value("2024-02-29"),
            Ok(Verdi::Dato(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert!(Svartype::Dato.parse_value("2023-02-29").is_err());
        assert!(Svartype::Heltall.parse_value("tusen").is_err());
    }

    #[test]
    fn test_svartype_names_roundtrip() {
        for t in [
            Svartype::Boolsk,
            Svartype::Heltall,
            Svartype::Desimal,
            Svartype::Dato,
            Svartype::Tekst,
        ] {
            assert_eq!(Svartype::parse(t.as_str()), Some(t));
        }
        assert_eq!(Svartype::parse("json"), None);
    }
}
