//! # Identifiers
//!
//! Strongly typed identifiers for every aggregate. Document ids are opaque
//! strings (the stores are document databases); intent and event ids are
//! UUIDs generated by this system.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

document_id!(
    /// Identifier of a registered user.
    UserId
);

document_id!(
    /// Identifier of a study group.
    GroupId
);

document_id!(
    /// Identifier of a contest.
    ContestId
);

/// Identifier of a score intent (saga record).
///
/// Doubles as the idempotency token for every aggregate update the intent
/// drives, and as the event id of the resulting `submission.accepted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(Uuid);

impl IntentId {
    /// Generate a fresh intent id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which a single score delta is applied at most once.
///
/// Stores record the keys they have applied alongside the document, so a
/// replayed delta with the same key is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(String);

impl OperationKey {
    /// Build a key from an arbitrary activity identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IntentId> for OperationKey {
    fn from(id: IntentId) -> Self {
        Self(format!("intent:{id}"))
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(UserId::generate(), UserId::generate());
        assert_ne!(IntentId::generate(), IntentId::generate());
    }

    #[test]
    fn test_ids_order_lexicographically() {
        let mut ids = vec![UserId::new("u3"), UserId::new("u1"), UserId::new("u2")];
        ids.sort();
        assert_eq!(ids, vec![UserId::new("u1"), UserId::new("u2"), UserId::new("u3")]);
    }

    #[test]
    fn test_operation_key_from_intent_is_stable() {
        let intent = IntentId::generate();
        assert_eq!(OperationKey::from(intent), OperationKey::from(intent));
        assert!(OperationKey::from(intent).as_str().starts_with("intent:"));
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = ContestId::new("c-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c-42\"");
    }
}
