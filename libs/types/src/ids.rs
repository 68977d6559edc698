//! Unique identifier types for exchange entities
//!
//! All IDs are UUID v7 newtypes: time-sortable, so chronological queries and
//! journal replay keep their natural order.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new id with the current timestamp embedded.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
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
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an order.
    OrderId
);

uuid_id!(
    /// Unique identifier for a trade.
    ///
    /// Doubles as the idempotency key for settlement replay.
    TradeId
);

uuid_id!(
    /// Unique identifier for a user. `Ord` is load-bearing: multi-wallet
    /// operations lock wallets in ascending user-id order.
    UserId
);

uuid_id!(
    /// Unique identifier for a binary contract (one YES or NO share class).
    ContractId
);

uuid_id!(
    /// Unique identifier for the parent market of a contract pair.
    MarketId
);

uuid_id!(
    /// Unique identifier for a ledger journal entry.
    EntryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(OrderId::new(), OrderId::new());
        assert_ne!(TradeId::new(), TradeId::new());
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn id_serialization_roundtrip() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn uuid_v7_ids_sort_by_creation_time() {
        let a = EntryId::new();
        let b = EntryId::new();
        assert!(a <= b);
    }
}
