//! Quota pools, regulations and transferable-quota trading for the fishery
//! simulation.
//!
//! A regulation is the only authority a fisher consults before selling a
//! catch. Every limited regulation delegates to one or more pools in the
//! central [`QuotaPoolTable`]; the table is the only place quota lives.
//!
//! # Architecture
//!
//! - [`pool`] -- The [`QuotaPoolTable`] arena and its checked arithmetic.
//! - [`regulation`] -- The [`Regulation`] tagged union: Anarchy, mono quota,
//!   multi-species quota map.
//! - [`factory`] -- [`RegulationFactory`]: turns a scenario's regulation
//!   section into regulations, deciding per kind whether pools are shared.
//! - [`scaler`] -- Yearly [`Scaler`] (IQ/ITQ even division) and
//!   [`YearlyReset`] (TAC refill).
//! - [`order_book`] -- Per-species [`OrderBook`] and the [`ItqMarket`] that
//!   clears them daily.
//! - [`conservation`] -- Trade conservation verification.
//! - [`model`] -- [`QuotaModel`], the seam between this crate and the host
//!   model.
//!
//! # Pool sharing
//!
//! | Kind | Pool per `apply` |
//! |------|------------------|
//! | `anarchy` | none |
//! | `mono_tac` | the same shared pool every time |
//! | `mono_iq` | a fresh pool holding the full yearly quota |
//! | `tac` | the same shared per-species pools every time |
//! | `iq`, `itq` | fresh per-species pools, rescaled yearly |

pub mod conservation;
pub mod factory;
pub mod model;
pub mod order_book;
pub mod pool;
pub mod regulation;
pub mod scaler;

// Re-export primary types at crate root.
pub use conservation::{ConservationResult, QuotaTotals};
pub use factory::RegulationFactory;
pub use model::{QuotaModel, QuotaState};
pub use order_book::{
    DailyCounters, ItqMarket, OrderBook, OrderBookConfig, RejectReason, SubmitOutcome,
    TradeIntent, TradeRecord,
};
pub use pool::{QuotaPool, QuotaPoolTable};
pub use regulation::{QuotaMode, Regulation};
pub use scaler::{ScaleOutcome, Scaler, YearlyReset};

use std::collections::BTreeMap;

use fishery_core::{ActionError, ScheduleError};
use fishery_types::{PoolId, RegulationKind, SchemeId, SpeciesId};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by quota bookkeeping and regulation construction.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// A pool handle that the table never issued.
    #[error("unknown quota pool {pool}")]
    UnknownPool {
        /// The offending handle.
        pool: PoolId,
    },

    /// A yearly quota below zero.
    #[error("yearly quota must be non-negative, got {quota}")]
    NegativeQuota {
        /// The invalid quota.
        quota: Decimal,
    },

    /// A multi-species regulation configured without any quotas.
    #[error("{kind:?} regulation requires a non-empty yearly_quotas map")]
    EmptyQuotaMap {
        /// The configured kind.
        kind: RegulationKind,
    },

    /// A single-species regulation configured without a quota.
    #[error("{kind:?} regulation requires yearly_quota")]
    MissingYearlyQuota {
        /// The configured kind.
        kind: RegulationKind,
    },

    /// A lot size of zero or less.
    #[error("lot size for {species} must be positive, got {lot}")]
    NonPositiveLot {
        /// Species name as configured, or `default`.
        species: String,
        /// The invalid lot.
        lot: Decimal,
    },

    /// An operation that the configured kind does not support.
    #[error("{operation} is not supported by {kind:?} regulations")]
    Unsupported {
        /// The configured kind.
        kind: RegulationKind,
        /// What was attempted.
        operation: &'static str,
    },

    /// A regulation asked to act on a species it has no pool for.
    #[error("no quota pool for species {species}")]
    NoPoolForSpecies {
        /// The species.
        species: SpeciesId,
    },

    /// A transfer larger than the source pool's remaining quota.
    #[error("pool {pool} holds {available}, cannot transfer {requested}")]
    InsufficientQuota {
        /// The source pool.
        pool: PoolId,
        /// Amount asked for.
        requested: Decimal,
        /// Amount available.
        available: Decimal,
    },

    /// Checked arithmetic overflowed.
    #[error("arithmetic overflow in {what}")]
    Overflow {
        /// The operation that overflowed.
        what: &'static str,
    },

    /// A clearing changed the total quota of a species.
    #[error("{0}")]
    ConservationViolated(Box<QuotaAnomaly>),

    /// Registering a scheduled action failed.
    #[error("scheduling failed: {source}")]
    Schedule {
        /// The underlying scheduler error.
        #[from]
        source: ScheduleError,
    },
}

impl From<QuotaError> for ActionError {
    fn from(err: QuotaError) -> Self {
        Self::other(err)
    }
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation detected around an order-book clearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaAnomaly {
    /// The step of the clearing.
    pub step: u64,
    /// The scheme whose pools were checked.
    pub scheme: SchemeId,
    /// Per-species `((yearly, remaining) before, (yearly, remaining) after)`
    /// for every species whose totals moved.
    pub imbalances: BTreeMap<SpeciesId, ((Decimal, Decimal), (Decimal, Decimal))>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for QuotaAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
