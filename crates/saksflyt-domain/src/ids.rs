//! Identifiers for steps, cases and tasks
//!
//! All identifiers are UUIDv7 values:
//! - Chronological sortability (a graph built in one pass lists in creation order)
//! - 128-bit uniqueness without coordination
//! - Canonical 8-4-4-4-12 string form in storage and on the wire

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u128);

        impl $name {
            /// Generate a new UUIDv7-based identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().as_u128())
            }

            /// Create an identifier from a raw u128 value
            ///
            /// This is primarily for storage layer deserialization.
            pub fn from_value(value: u128) -> Self {
                Self(value)
            }

            /// Parse an identifier from its canonical UUID string
            pub fn from_string(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s)
                    .map(|u| Self(u.as_u128()))
                    .map_err(|e| format!("Invalid {} '{}': {}", stringify!($name), s, e))
            }

            /// Get the raw u128 value
            pub fn value(&self) -> u128 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", uuid::Uuid::from_u128(self.0))
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_string(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

uuid_id!(
    /// Identity of one step node. Two distinct nodes never share a `StegId`.
    StegId
);

uuid_id!(
    /// Identity of a case (behandling)
    BehandlingId
);

uuid_id!(
    /// Identity of a work item (oppgave)
    OppgaveId
);

uuid_id!(
    /// Identity of an inbound event, used to drop redelivered commands
    HendelseId
);


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: ordering matches u128 ordering
        #[test]
        fn test_ordering_property(a: u128, b: u128) {
            prop_assert_eq!(StegId::from_value(a) < StegId::from_value(b), a < b);
        }

        /// Property: round-trip through the string form preserves the id
        #[test]
        fn test_string_roundtrip(value: u128) {
            let id = StegId::from_value(value);
            match StegId::from_string(&id.to_string()) {
                Ok(parsed) => prop_assert_eq!(id, parsed),
                Err(e) => return Err(TestCaseError::fail(e)),
            }
        }
    }
}
