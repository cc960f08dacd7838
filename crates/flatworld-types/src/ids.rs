//! Type-safe identifier wrappers.
//!
//! Identifiers are plain sequence numbers handed out by the owner of the
//! collection they index into. A scene assigns entity ids in strictly
//! increasing order, so ordering ids is the same as ordering by insertion.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a `u64` sequence number.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the raw sequence number.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Handle of an entity inside the scene that owns it.
    EntityId
}
