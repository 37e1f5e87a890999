//! Fixed-price markets and the sale boundary.

use std::collections::BTreeMap;

use fishery_core::{ActionError, Scheduler, StepContext, Startable, Stoppable, steppable};
use fishery_quota::{QuotaPoolTable, Regulation};
use fishery_types::{FisherId, Phase, SpeciesId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::MarketError;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Landings and earnings accumulated over a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LandingCounters {
    /// Kilograms sold.
    pub landings: Decimal,
    /// Money paid out.
    pub earnings: Decimal,
    /// Number of sales with a positive quantity.
    pub sales: u32,
}

impl LandingCounters {
    fn record(&mut self, sold: Decimal, earnings: Decimal) -> Result<(), MarketError> {
        self.landings = self
            .landings
            .checked_add(sold)
            .ok_or(MarketError::Overflow { what: "landings" })?;
        self.earnings = self
            .earnings
            .checked_add(earnings)
            .ok_or(MarketError::Overflow { what: "earnings" })?;
        self.sales = self.sales.saturating_add(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A market buying one species at a fixed price per kg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPriceMarket {
    species: SpeciesId,
    price: Decimal,
    daily: LandingCounters,
    yearly: LandingCounters,
}

impl FixedPriceMarket {
    /// Create a market.
    ///
    /// # Errors
    ///
    /// [`MarketError::NegativePrice`].
    pub fn new(species: SpeciesId, price: Decimal) -> Result<Self, MarketError> {
        if price < Decimal::ZERO {
            return Err(MarketError::NegativePrice { species });
        }
        Ok(Self {
            species,
            price,
            daily: LandingCounters::default(),
            yearly: LandingCounters::default(),
        })
    }

    /// The species this market buys.
    pub const fn species(&self) -> SpeciesId {
        self.species
    }

    /// Price per kg.
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Landings since the last daily reset.
    pub const fn daily(&self) -> &LandingCounters {
        &self.daily
    }

    /// Landings since the last yearly reset.
    pub const fn yearly(&self) -> &LandingCounters {
        &self.yearly
    }

    /// Pay for `sold` kg and count it. Returns the earnings.
    fn land(&mut self, sold: Decimal) -> Result<Decimal, MarketError> {
        let earnings = self
            .price
            .checked_mul(sold)
            .ok_or(MarketError::Overflow { what: "earnings" })?;
        self.daily.record(sold, earnings)?;
        self.yearly.record(sold, earnings)?;
        Ok(earnings)
    }

    /// Zero the daily counters.
    pub fn reset_daily(&mut self) {
        self.daily = LandingCounters::default();
    }

    /// Zero the yearly counters.
    pub fn reset_yearly(&mut self) {
        self.yearly = LandingCounters::default();
    }
}

/// Every market in a run, by species.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketMap {
    markets: BTreeMap<SpeciesId, FixedPriceMarket>,
}

impl MarketMap {
    /// Build one market per `(species, price)`.
    ///
    /// # Errors
    ///
    /// [`MarketError::NegativePrice`].
    pub fn from_prices<I>(prices: I) -> Result<Self, MarketError>
    where
        I: IntoIterator<Item = (SpeciesId, Decimal)>,
    {
        let mut markets = BTreeMap::new();
        for (species, price) in prices {
            markets.insert(species, FixedPriceMarket::new(species, price)?);
        }
        Ok(Self { markets })
    }

    /// The market for `species`.
    pub fn get(&self, species: SpeciesId) -> Option<&FixedPriceMarket> {
        self.markets.get(&species)
    }

    /// Mutable access to the market for `species`.
    ///
    /// # Errors
    ///
    /// [`MarketError::UnknownSpecies`].
    pub fn get_mut(&mut self, species: SpeciesId) -> Result<&mut FixedPriceMarket, MarketError> {
        self.markets
            .get_mut(&species)
            .ok_or(MarketError::UnknownSpecies { species })
    }

    /// Iterate markets in species order.
    pub fn iter(&self) -> impl Iterator<Item = &FixedPriceMarket> {
        self.markets.values()
    }

    /// Zero every market's daily counters.
    pub fn reset_daily(&mut self) {
        self.markets.values_mut().for_each(FixedPriceMarket::reset_daily);
    }

    /// Zero every market's yearly counters.
    pub fn reset_yearly(&mut self) {
        self.markets.values_mut().for_each(FixedPriceMarket::reset_yearly);
    }
}

// ---------------------------------------------------------------------------
// Sale boundary
// ---------------------------------------------------------------------------

/// What one call to [`sell_fish`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleOutcome {
    /// Kilograms the fisher wanted to sell.
    pub requested: Decimal,
    /// Kilograms actually sold.
    pub sold: Decimal,
    /// Money received.
    pub earnings: Decimal,
}

impl SaleOutcome {
    const fn nothing(requested: Decimal) -> Self {
        Self {
            requested,
            sold: Decimal::ZERO,
            earnings: Decimal::ZERO,
        }
    }

    /// Whether the regulation cut the sale short.
    pub fn was_clamped(&self) -> bool {
        self.sold < self.requested
    }
}

/// Sell up to `requested` kg of `species` for `fisher`.
///
/// The sale is clamped to the regulation's ceiling; a non-positive request
/// or an exhausted quota sells nothing and changes nothing.
///
/// # Errors
///
/// [`MarketError`] if the species has no market, a pool is unknown, or
/// arithmetic overflows.
pub fn sell_fish(
    requested: Decimal,
    fisher: FisherId,
    species: SpeciesId,
    regulation: &Regulation,
    pools: &mut QuotaPoolTable,
    markets: &mut MarketMap,
) -> Result<SaleOutcome, MarketError> {
    let market = markets.get_mut(species)?;
    let ceiling = regulation.max_biomass_sellable(pools, species)?;
    if ceiling.is_exhausted() {
        if requested > Decimal::ZERO {
            debug!(%fisher, %species, %requested, "Sale denied; no quota left");
        }
        return Ok(SaleOutcome::nothing(requested));
    }
    let sold = ceiling.clamp(requested);
    if sold <= Decimal::ZERO {
        return Ok(SaleOutcome::nothing(requested));
    }
    if sold < requested {
        debug!(%fisher, %species, %requested, %sold, "Sale clamped to quota");
    }

    let earnings = market.land(sold)?;
    regulation.react_to_sale(pools, species, sold)?;
    Ok(SaleOutcome {
        requested,
        sold,
        earnings,
    })
}

// ---------------------------------------------------------------------------
// Counter reset
// ---------------------------------------------------------------------------

/// A model that owns a [`MarketMap`].
pub trait MarketModel: 'static {
    /// The model's markets.
    fn markets_mut(&mut self) -> &mut MarketMap;
}

/// Zeroes daily counters every day and yearly counters every year, in
/// [`Phase::DataReset`] so data gathering sees the full period first.
#[derive(Debug, Default)]
pub struct CounterReset {
    handles: Vec<Stoppable>,
}

impl CounterReset {
    /// Create the reset.
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<M: MarketModel> Startable<M> for CounterReset {
    fn name(&self) -> &'static str {
        "market-counter-reset"
    }

    fn start(&mut self, _model: &mut M, scheduler: &mut Scheduler<M>) -> Result<(), ActionError> {
        let daily = scheduler.schedule_every_day(
            Phase::DataReset,
            steppable(|model: &mut M, _: &mut StepContext<'_, M>| {
                model.markets_mut().reset_daily();
                Ok(())
            }),
        )?;
        let yearly = scheduler.schedule_every_year(
            Phase::DataReset,
            steppable(|model: &mut M, _: &mut StepContext<'_, M>| {
                model.markets_mut().reset_yearly();
                Ok(())
            }),
        )?;
        self.handles.push(daily);
        self.handles.push(yearly);
        Ok(())
    }

    fn turn_off(&mut self) {
        for handle in self.handles.drain(..) {
            handle.stop();
        }
    }
}
