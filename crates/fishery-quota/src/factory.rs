//! Configuration-driven regulation construction.
//!
//! A [`RegulationFactory`] is built once from the scenario's `regulation`
//! section and then [`apply`](RegulationFactory::apply)'d once per fisher.
//! Whether an apply creates a fresh pool or hands back a handle to an
//! existing one is fixed per kind:
//!
//! - `mono_tac`, `tac`: the first apply creates the pools; every later
//!   apply returns handles to the same pools. All fishers draw down one
//!   shared allotment.
//! - `mono_iq`: every apply creates a new pool holding the full yearly
//!   quota.
//! - `iq`, `itq`: every apply creates new per-species pools; the
//!   [`Scaler`] then divides the aggregate evenly.
//!
//! A second factory, even from the same configuration, is a new pool
//! context: it gets a new [`SchemeId`] and never shares with the first.

use std::collections::BTreeMap;

use fishery_core::config::RegulationConfig;
use fishery_types::{PoolId, RegulationKind, SchemeId, SpeciesId, SpeciesList};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::QuotaError;
use crate::order_book::{ItqMarket, OrderBookConfig};
use crate::pool::QuotaPoolTable;
use crate::regulation::{QuotaMode, Regulation};
use crate::scaler::{Scaler, YearlyReset};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SharedPools {
    None,
    Mono(PoolId),
    Multi(BTreeMap<SpeciesId, PoolId>),
}

/// Builds regulations of one configured kind.
#[derive(Debug, Clone)]
pub struct RegulationFactory {
    kind: RegulationKind,
    scheme: SchemeId,
    yearly_quota: Decimal,
    quotas: BTreeMap<SpeciesId, Decimal>,
    books: BTreeMap<SpeciesId, OrderBookConfig>,
    shared: SharedPools,
}

impl RegulationFactory {
    /// Validate `config` against `species` and build a factory stamped
    /// with `scheme`.
    ///
    /// Species names in quota and lot maps are matched with
    /// [`SpeciesList::find_by_name`]; unknown names are logged and ignored.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::MissingYearlyQuota`]: mono kind without `yearly_quota`.
    /// - [`QuotaError::EmptyQuotaMap`]: multi kind without `yearly_quotas`.
    /// - [`QuotaError::NegativeQuota`]: any quota below zero.
    /// - [`QuotaError::NonPositiveLot`]: `itq` with a lot size of zero or less.
    pub fn from_config(
        config: &RegulationConfig,
        species: &SpeciesList,
        scheme: SchemeId,
    ) -> Result<Self, QuotaError> {
        let kind = config.kind;
        let mut yearly_quota = Decimal::ZERO;
        let mut quotas = BTreeMap::new();
        let mut books = BTreeMap::new();

        match kind {
            RegulationKind::Anarchy => {}
            RegulationKind::MonoTac | RegulationKind::MonoIq => {
                let quota = config
                    .yearly_quota
                    .ok_or(QuotaError::MissingYearlyQuota { kind })?;
                if quota < Decimal::ZERO {
                    return Err(QuotaError::NegativeQuota { quota });
                }
                yearly_quota = quota;
            }
            RegulationKind::Tac | RegulationKind::Iq | RegulationKind::Itq => {
                if config.yearly_quotas.is_empty() {
                    return Err(QuotaError::EmptyQuotaMap { kind });
                }
                for (name, quota) in &config.yearly_quotas {
                    if *quota < Decimal::ZERO {
                        return Err(QuotaError::NegativeQuota { quota: *quota });
                    }
                    match species.find_by_name(name) {
                        Some(found) => {
                            quotas.insert(found.id, *quota);
                        }
                        None => warn!(species = %name, "Unknown species in yearly_quotas; ignored"),
                    }
                }
            }
        }

        if kind == RegulationKind::Itq {
            books = book_configs(config, species, &quotas)?;
        }

        debug!(
            ?kind,
            %scheme,
            constrained = quotas.len(),
            "Regulation factory ready"
        );
        Ok(Self {
            kind,
            scheme,
            yearly_quota,
            quotas,
            books,
            shared: SharedPools::None,
        })
    }

    /// The configured kind.
    pub const fn kind(&self) -> RegulationKind {
        self.kind
    }

    /// The pool context every regulation from this factory belongs to.
    pub const fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Aggregate yearly quota for `species` (multi kinds).
    pub fn aggregate_quota(&self, species: SpeciesId) -> Option<Decimal> {
        self.quotas.get(&species).copied()
    }

    /// Species constrained by this factory's regulations (multi kinds).
    pub fn constrained_species(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.quotas.keys().copied()
    }

    /// Lot size of `species` (`itq` only).
    pub fn lot_size(&self, species: SpeciesId) -> Option<Decimal> {
        self.books.get(&species).map(|c| c.lot)
    }

    /// Build the regulation for one more fisher.
    ///
    /// # Errors
    ///
    /// [`QuotaError`] from pool creation.
    pub fn apply(&mut self, pools: &mut QuotaPoolTable) -> Result<Regulation, QuotaError> {
        let scheme = self.scheme;
        match self.kind {
            RegulationKind::Anarchy => Ok(Regulation::Anarchy),
            RegulationKind::MonoTac => {
                let pool = match self.shared {
                    SharedPools::Mono(pool) => pool,
                    SharedPools::None | SharedPools::Multi(_) => {
                        let pool = pools.create(scheme, None, self.yearly_quota)?;
                        self.shared = SharedPools::Mono(pool);
                        pool
                    }
                };
                Ok(Regulation::MonoQuota { scheme, pool })
            }
            RegulationKind::MonoIq => {
                let pool = pools.create(scheme, None, self.yearly_quota)?;
                Ok(Regulation::MonoQuota { scheme, pool })
            }
            RegulationKind::Tac => {
                let map = match &self.shared {
                    SharedPools::Multi(map) => map.clone(),
                    SharedPools::None | SharedPools::Mono(_) => {
                        let map = self.create_species_pools(pools)?;
                        self.shared = SharedPools::Multi(map.clone());
                        map
                    }
                };
                Ok(Regulation::MultiQuota {
                    scheme,
                    mode: QuotaMode::Tac,
                    pools: map,
                })
            }
            RegulationKind::Iq | RegulationKind::Itq => {
                let mode = if self.kind == RegulationKind::Itq {
                    QuotaMode::Itq
                } else {
                    QuotaMode::Iq
                };
                Ok(Regulation::MultiQuota {
                    scheme,
                    mode,
                    pools: self.create_species_pools(pools)?,
                })
            }
        }
    }

    fn create_species_pools(
        &self,
        pools: &mut QuotaPoolTable,
    ) -> Result<BTreeMap<SpeciesId, PoolId>, QuotaError> {
        let mut map = BTreeMap::new();
        for (species, quota) in &self.quotas {
            let pool = pools.create(self.scheme, Some(*species), *quota)?;
            map.insert(*species, pool);
        }
        Ok(map)
    }

    /// Change the shared `mono_tac` target. Sharers see the new target at
    /// once; remaining quota is not replenished.
    ///
    /// # Errors
    ///
    /// [`QuotaError::Unsupported`] for any other kind;
    /// [`QuotaError::NegativeQuota`].
    pub fn set_yearly_quota(
        &mut self,
        pools: &mut QuotaPoolTable,
        yearly: Decimal,
    ) -> Result<(), QuotaError> {
        if self.kind != RegulationKind::MonoTac {
            return Err(QuotaError::Unsupported {
                kind: self.kind,
                operation: "set_yearly_quota",
            });
        }
        if yearly < Decimal::ZERO {
            return Err(QuotaError::NegativeQuota { quota: yearly });
        }
        if let SharedPools::Mono(pool) = self.shared {
            pools.set_yearly_quota(pool, yearly)?;
        }
        self.yearly_quota = yearly;
        Ok(())
    }

    /// Change the shared `tac` target of one species.
    ///
    /// # Errors
    ///
    /// [`QuotaError::Unsupported`] for any other kind;
    /// [`QuotaError::NoPoolForSpecies`] for an unconstrained species;
    /// [`QuotaError::NegativeQuota`].
    pub fn set_species_yearly_quota(
        &mut self,
        pools: &mut QuotaPoolTable,
        species: SpeciesId,
        yearly: Decimal,
    ) -> Result<(), QuotaError> {
        if self.kind != RegulationKind::Tac {
            return Err(QuotaError::Unsupported {
                kind: self.kind,
                operation: "set_species_yearly_quota",
            });
        }
        if yearly < Decimal::ZERO {
            return Err(QuotaError::NegativeQuota { quota: yearly });
        }
        let Some(target) = self.quotas.get_mut(&species) else {
            return Err(QuotaError::NoPoolForSpecies { species });
        };
        *target = yearly;
        if let SharedPools::Multi(map) = &self.shared {
            if let Some(pool) = map.get(&species) {
                pools.set_yearly_quota(*pool, yearly)?;
            }
        }
        Ok(())
    }

    /// The scaler this kind needs, if any (`iq`, `itq`).
    pub fn scaler(&self) -> Option<Scaler> {
        match self.kind {
            RegulationKind::Iq | RegulationKind::Itq => {
                Some(Scaler::new(self.scheme, self.quotas.clone()))
            }
            RegulationKind::Anarchy
            | RegulationKind::MonoTac
            | RegulationKind::MonoIq
            | RegulationKind::Tac => None,
        }
    }

    /// The yearly refill this kind needs, if any (`tac`, `mono_tac`,
    /// `mono_iq`).
    pub const fn yearly_reset(&self) -> Option<YearlyReset> {
        match self.kind {
            RegulationKind::Tac | RegulationKind::MonoTac | RegulationKind::MonoIq => {
                Some(YearlyReset::new(self.scheme))
            }
            RegulationKind::Anarchy | RegulationKind::Iq | RegulationKind::Itq => None,
        }
    }

    /// The quota market this kind needs, if any (`itq`).
    pub fn market(&self) -> Option<ItqMarket> {
        (self.kind == RegulationKind::Itq).then(|| ItqMarket::new(self.scheme, self.books.clone()))
    }
}

fn book_configs(
    config: &RegulationConfig,
    species: &SpeciesList,
    quotas: &BTreeMap<SpeciesId, Decimal>,
) -> Result<BTreeMap<SpeciesId, OrderBookConfig>, QuotaError> {
    if config.default_lot_size <= Decimal::ZERO {
        return Err(QuotaError::NonPositiveLot {
            species: "default".to_owned(),
            lot: config.default_lot_size,
        });
    }
    let mut lots: BTreeMap<SpeciesId, Decimal> = BTreeMap::new();
    for (name, lot) in &config.lot_sizes {
        if *lot <= Decimal::ZERO {
            return Err(QuotaError::NonPositiveLot {
                species: name.clone(),
                lot: *lot,
            });
        }
        match species.find_by_name(name) {
            Some(found) => {
                lots.insert(found.id, *lot);
            }
            None => warn!(species = %name, "Unknown species in lot_sizes; ignored"),
        }
    }

    Ok(quotas
        .keys()
        .map(|id| {
            let lot = lots.get(id).copied().unwrap_or(config.default_lot_size);
            let book = OrderBookConfig {
                lot,
                allow_multiple_trades: config.allow_multiple_trades,
                pricing: config.pricing,
                penalty_days: config.penalty_days,
                implementation_year: u64::from(config.implementation_year),
            };
            (*id, book)
        })
        .collect())
}
