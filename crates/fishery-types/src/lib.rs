//! Shared type definitions for the fishery simulation.
//!
//! This crate is the single source of truth for the identifiers, enums and
//! small value types used across the workspace. It has no behaviour of its
//! own beyond trivial derivations.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe index wrappers for fishers, species, pools,
//!   schemes and trade intents, plus the run identifier
//! - [`enums`] -- Phases, interval policies, regulation kinds, trade sides
//!   and pricing policies
//! - [`structs`] -- Sale ceilings and the species roster

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{IntervalPolicy, Phase, PricingPolicy, RegulationKind, TradeSide};
pub use ids::{FisherId, IntentId, PoolId, RunId, SchemeId, SpeciesId};
pub use structs::{Ceiling, Species, SpeciesList};
