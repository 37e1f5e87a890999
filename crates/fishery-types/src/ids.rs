//! Type-safe identifier wrappers.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. Entities that take
//! part in deterministic dispatch (fishers, species, pools, intents) use
//! small sequential integers so that ordering never depends on wall-clock
//! or random state. The run identifier is the only UUID: it tags log
//! output and never influences simulation order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around a sequential integer index.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl $name {
            /// Create an identifier from its raw index.
            pub const fn new(index: $inner) -> Self {
                Self(index)
            }

            /// Return the raw index value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(index: $inner) -> Self {
                Self(index)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_index! {
    /// Identifier for a fisher (an economic agent) in the population.
    FisherId(u32)
}

define_index! {
    /// Stable small index identifying a fish species.
    SpeciesId(u16)
}

define_index! {
    /// Handle into the central quota-pool table.
    ///
    /// Two regulations holding the same `PoolId` share one pool: consuming
    /// quota through either is visible through both.
    PoolId(u32)
}

define_index! {
    /// Identifier for one regulation factory context.
    ///
    /// Every pool and every quota regulation created by the same factory
    /// carries the same scheme, so yearly resets and rescaling can find
    /// exactly the pools that belong to one configured regulation.
    SchemeId(u32)
}

define_index! {
    /// Identifier for a trade intent resting on an order book.
    IntentId(u64)
}

/// Unique identifier for one simulation run, used to correlate log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new run identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
