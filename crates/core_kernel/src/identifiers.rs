//! Strongly-typed identifiers for ledger entities
//!
//! Newtype wrappers around UUIDs keep a customer id from being passed where
//! a shop id is expected. Every identifier renders as `PREFIX-uuid`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when an identifier string cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {kind} identifier '{input}'")]
pub struct IdParseError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Display prefix, e.g. `CUS` in `CUS-<uuid>`
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Uuid::parse_str(raw).map(Self).map_err(|_| IdParseError {
                    kind: stringify!($name),
                    input: s.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Credit domain
define_id!(CustomerId, "CUS");
define_id!(ShopId, "SHP");
define_id!(CreditEntryId, "CRD");
define_id!(InvoiceId, "INV");
define_id!(InvoiceLineItemId, "INVL");
define_id!(PosTransactionId, "POS");

// Recurrence domain
define_id!(ObligationId, "OBL");
define_id!(OccurrenceId, "OCC");
define_id!(ExpenseCategoryId, "ECAT");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_id_display() {
        let id = CustomerId::new();
        assert!(id.to_string().starts_with("CUS-"));
    }

    #[test]
    fn test_id_parsing_with_and_without_prefix() {
        let original = ObligationId::new();
        let parsed: ObligationId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);

        let bare: ObligationId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, bare);
    }

    #[test]
    fn test_invalid_id_reports_kind() {
        let err = "CRD-not-a-uuid".parse::<CreditEntryId>().unwrap_err();
        assert_eq!(err.kind, "CreditEntryId");
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let entry_id = CreditEntryId::from(uuid);
        let back: Uuid = entry_id.into();
        assert_eq!(uuid, back);
    }
}
