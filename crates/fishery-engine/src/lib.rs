//! Fishery simulation engine.
//!
//! Builds a fisher population under one configured regulation regime and
//! drives it through the phase-ordered scheduler from `fishery-core`.
//!
//! # Modules
//!
//! - [`model`] -- [`FishState`], the model every action mutates.
//! - [`fisher`] -- Fishers and their daily landing action.
//! - [`trader`] -- Quota request/offer heuristic for ITQ fishers.
//! - [`summary`] -- Yearly data gathering.
//! - [`simulation`] -- Scenario wiring and the run entry points.
//! - [`error`] -- [`EngineError`].
//!
//! [`FishState`]: model::FishState
//! [`EngineError`]: error::EngineError

pub mod error;
pub mod fisher;
pub mod model;
pub mod simulation;
pub mod summary;
pub mod trader;

pub use error::EngineError;
pub use fisher::Fisher;
pub use model::FishState;
pub use simulation::Simulation;
pub use summary::{SpeciesYear, TradeTally, YearlySummary, YearlySummaryCollector};
pub use trader::TradingParams;
