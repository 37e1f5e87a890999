//! Error types for the fishery engine.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during scenario construction and simulation execution.

use fishery_types::FisherId;

/// Top-level error for the fishery engine.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: fishery_core::config::ConfigError,
    },

    /// Simulation clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: fishery_core::clock::ClockError,
    },

    /// Scheduler start, registration or stepping failed.
    #[error("schedule error: {source}")]
    Schedule {
        /// The underlying scheduler error.
        #[from]
        source: fishery_core::ScheduleError,
    },

    /// A startable failed to start.
    #[error("startup error: {source}")]
    Action {
        /// The underlying action error.
        #[from]
        source: fishery_core::ActionError,
    },

    /// Regulation construction or quota bookkeeping failed.
    #[error("quota error: {source}")]
    Quota {
        /// The underlying quota error.
        #[from]
        source: fishery_quota::QuotaError,
    },

    /// Market settlement failed.
    #[error("market error: {source}")]
    Market {
        /// The underlying market error.
        #[from]
        source: fishery_market::MarketError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: fishery_core::runner::RunnerError,
    },

    /// More species were configured than a species index can hold.
    #[error("too many species: {count}")]
    TooManySpecies {
        /// Number of configured species.
        count: usize,
    },

    /// No live fisher has this id.
    #[error("unknown fisher {fisher}")]
    UnknownFisher {
        /// The fisher.
        fisher: FisherId,
    },

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow in {what}")]
    Overflow {
        /// The operation that overflowed.
        what: &'static str,
    },
}

impl From<EngineError> for fishery_core::ActionError {
    fn from(err: EngineError) -> Self {
        Self::other(err)
    }
}
