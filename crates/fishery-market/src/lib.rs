//! Market settlement for the fishery simulation.
//!
//! [`sell_fish`] is the only path by which landed catch turns into money
//! and quota is consumed: it asks the fisher's regulation how much may be
//! sold, clamps the sale to that ceiling, pays for what was sold and then
//! charges it against the regulation's pools.
//!
//! Prices are fixed per species ([`FixedPriceMarket`]). Daily and yearly
//! landing counters are kept per market and reset by [`CounterReset`].

pub mod market;

pub use market::{
    CounterReset, FixedPriceMarket, LandingCounters, MarketMap, MarketModel, SaleOutcome,
    sell_fish,
};

use fishery_core::ActionError;
use fishery_quota::QuotaError;
use fishery_types::SpeciesId;

/// Errors raised while settling a sale.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The regulation's pools could not be read or charged.
    #[error("quota error: {source}")]
    Quota {
        /// The underlying quota error.
        #[from]
        source: QuotaError,
    },

    /// No market trades this species.
    #[error("no market for species {species}")]
    UnknownSpecies {
        /// The species.
        species: SpeciesId,
    },

    /// A negative price was configured.
    #[error("price for species {species} must be non-negative")]
    NegativePrice {
        /// The species.
        species: SpeciesId,
    },

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow in {what}")]
    Overflow {
        /// The operation that overflowed.
        what: &'static str,
    },
}

impl From<MarketError> for ActionError {
    fn from(err: MarketError) -> Self {
        Self::other(err)
    }
}
