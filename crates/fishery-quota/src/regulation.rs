//! Regulations: what a fisher may sell, and what a sale costs in quota.
//!
//! [`Regulation`] is a closed tagged union. Every variant answers the same
//! two questions through the same two operations:
//!
//! - [`Regulation::max_biomass_sellable`]: how much of a species may be
//!   sold right now, as a [`Ceiling`].
//! - [`Regulation::react_to_sale`]: record a completed sale against the
//!   bound pool(s), clamping at zero.
//!
//! A regulation holds pool handles, never quota. It is cheap to clone, and
//! a clone shares pools with the original.

use std::collections::BTreeMap;

use fishery_types::{Ceiling, PoolId, RegulationKind, SchemeId, SpeciesId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::QuotaError;
use crate::pool::QuotaPoolTable;

/// How a multi-species quota map was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaMode {
    /// One pool per species shared by every fisher.
    Tac,
    /// Pools per fisher holding an even share of the aggregate.
    Iq,
    /// [`QuotaMode::Iq`] pools that may be traded.
    Itq,
}

impl QuotaMode {
    /// The mode a multi-species regulation kind builds, if any.
    pub const fn from_kind(kind: RegulationKind) -> Option<Self> {
        match kind {
            RegulationKind::Tac => Some(Self::Tac),
            RegulationKind::Iq => Some(Self::Iq),
            RegulationKind::Itq => Some(Self::Itq),
            RegulationKind::Anarchy | RegulationKind::MonoTac | RegulationKind::MonoIq => None,
        }
    }

    /// Whether every fisher gets a private share.
    pub const fn is_individual(self) -> bool {
        matches!(self, Self::Iq | Self::Itq)
    }
}

/// The regulation bound to one fisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regulation {
    /// No limits at all.
    Anarchy,
    /// A single pool constraining every species landed.
    MonoQuota {
        /// Factory context.
        scheme: SchemeId,
        /// The pool.
        pool: PoolId,
    },
    /// One pool per constrained species. Species missing from `pools`
    /// are unconstrained.
    MultiQuota {
        /// Factory context.
        scheme: SchemeId,
        /// How the pools were built.
        mode: QuotaMode,
        /// `species -> pool`.
        pools: BTreeMap<SpeciesId, PoolId>,
    },
}

impl Regulation {
    /// The factory context, or `None` for Anarchy.
    pub const fn scheme(&self) -> Option<SchemeId> {
        match self {
            Self::Anarchy => None,
            Self::MonoQuota { scheme, .. } | Self::MultiQuota { scheme, .. } => Some(*scheme),
        }
    }

    /// The multi-species mode, if any.
    pub const fn mode(&self) -> Option<QuotaMode> {
        match self {
            Self::MultiQuota { mode, .. } => Some(*mode),
            Self::Anarchy | Self::MonoQuota { .. } => None,
        }
    }

    /// Whether quota under this regulation may be traded.
    pub const fn is_tradable(&self) -> bool {
        matches!(self.mode(), Some(QuotaMode::Itq))
    }

    /// The pool that constrains `species`, if any.
    pub fn pool_for(&self, species: SpeciesId) -> Option<PoolId> {
        match self {
            Self::Anarchy => None,
            Self::MonoQuota { pool, .. } => Some(*pool),
            Self::MultiQuota { pools, .. } => pools.get(&species).copied(),
        }
    }

    /// Every pool this regulation is bound to, in species order.
    pub fn pools(&self) -> Vec<PoolId> {
        match self {
            Self::Anarchy => Vec::new(),
            Self::MonoQuota { pool, .. } => vec![*pool],
            Self::MultiQuota { pools, .. } => pools.values().copied().collect(),
        }
    }

    /// How much of `species` may be sold right now.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] if a bound handle is not in `table`.
    pub fn max_biomass_sellable(
        &self,
        table: &QuotaPoolTable,
        species: SpeciesId,
    ) -> Result<Ceiling, QuotaError> {
        self.quota_remaining(table, species)
    }

    /// Record a sale of `sold` units of `species`. Consumption always
    /// clamps at zero, whatever `sold` is. Returns the quota actually
    /// consumed.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] if a bound handle is not in `table`.
    pub fn react_to_sale(
        &self,
        table: &mut QuotaPoolTable,
        species: SpeciesId,
        sold: Decimal,
    ) -> Result<Decimal, QuotaError> {
        let Some(pool) = self.pool_for(species) else {
            return Ok(Decimal::ZERO);
        };
        let consumed = table.consume(pool, sold)?;
        if consumed < sold {
            debug!(%pool, %species, %sold, %consumed, "Sale exceeded remaining quota; clamped");
        }
        Ok(consumed)
    }

    /// Whether the fisher may go out at all: false as soon as any bound
    /// pool is exhausted.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] if a bound handle is not in `table`.
    pub fn is_allowed_at_sea(&self, table: &QuotaPoolTable) -> Result<bool, QuotaError> {
        for pool in self.pools() {
            if table.remaining(pool)? <= Decimal::ZERO {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Quota of `species` left this year.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] if a bound handle is not in `table`.
    pub fn quota_remaining(
        &self,
        table: &QuotaPoolTable,
        species: SpeciesId,
    ) -> Result<Ceiling, QuotaError> {
        match self.pool_for(species) {
            None => Ok(Ceiling::Unbounded),
            Some(pool) => Ok(Ceiling::limited(table.remaining(pool)?)),
        }
    }

    /// Yearly target for `species`.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] if a bound handle is not in `table`.
    pub fn yearly_quota(
        &self,
        table: &QuotaPoolTable,
        species: SpeciesId,
    ) -> Result<Ceiling, QuotaError> {
        match self.pool_for(species) {
            None => Ok(Ceiling::Unbounded),
            Some(pool) => Ok(Ceiling::limited(table.yearly(pool)?)),
        }
    }
}
