//! Quota trading heuristic for ITQ fishers.
//!
//! Once a day, for every species its regulation constrains, a fisher
//! compares the quota it holds with what it expects to land over the rest
//! of the year. Short fishers ask for one lot; fishers with at least a lot
//! to spare offer one. Yesterday's unmatched intents are withdrawn first,
//! so each fisher has at most one intent per book.

use std::collections::BTreeMap;

use fishery_core::clock::DAYS_PER_YEAR;
use fishery_quota::{QuotaState, Regulation, SubmitOutcome, TradeIntent};
use fishery_types::{SpeciesId, TradeSide};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::EngineError;
use crate::fisher::Fisher;

/// Prices the heuristic quotes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingParams {
    prices: BTreeMap<SpeciesId, Decimal>,
    markup: Decimal,
}

impl TradingParams {
    /// Quote around each species' fish price, `markup` above for requests
    /// and `markup` below for offers.
    pub const fn new(prices: BTreeMap<SpeciesId, Decimal>, markup: Decimal) -> Self {
        Self { prices, markup }
    }

    /// Limit price for a `side` intent on `species`, if it has a price.
    pub fn limit_price(&self, species: SpeciesId, side: TradeSide) -> Option<Decimal> {
        let price = *self.prices.get(&species)?;
        let factor = match side {
            TradeSide::Request => Decimal::ONE.checked_add(self.markup)?,
            TradeSide::Offer => Decimal::ONE.checked_sub(self.markup)?,
        };
        price.checked_mul(factor).map(|p| p.max(Decimal::ZERO))
    }
}

/// Days left in the year including `day_of_year` itself.
pub const fn days_left(day_of_year: u64) -> u64 {
    DAYS_PER_YEAR.saturating_add(1).saturating_sub(day_of_year)
}

/// Which side, if any, a fisher holding `remaining` and expecting to land
/// `need` should take in a book of `lot`-sized trades.
pub fn decide(remaining: Decimal, need: Decimal, lot: Decimal) -> Option<TradeSide> {
    if remaining < need {
        return Some(TradeSide::Request);
    }
    let spare = remaining.checked_sub(lot)?;
    (spare >= need).then_some(TradeSide::Offer)
}

/// Withdraw `fisher`'s old intents and post today's. Returns how many
/// intents were accepted.
///
/// `daily_catch` is the configured mean per species; the fisher's own
/// catch factor is applied here.
pub fn post_intents(
    fisher: &Fisher,
    quota: &mut QuotaState,
    daily_catch: &BTreeMap<SpeciesId, Decimal>,
    params: &TradingParams,
    day_of_year: u64,
) -> Result<usize, EngineError> {
    let regulation = fisher.regulation();
    let Regulation::MultiQuota { scheme, pools: bound, .. } = regulation else {
        return Ok(0);
    };
    if !regulation.is_tradable() {
        return Ok(0);
    }

    let days = Decimal::from(days_left(day_of_year));
    let QuotaState { pools, books } = quota;
    let mut accepted = 0_usize;
    for (species, pool) in bound {
        let Some(book) = books.get_mut(&(*scheme, *species)) else {
            continue;
        };
        book.withdraw(fisher.id());

        let mean = daily_catch.get(species).copied().unwrap_or(Decimal::ZERO);
        let need = fisher
            .daily_catch(mean)?
            .checked_mul(days)
            .ok_or(EngineError::Overflow { what: "expected landings" })?;
        let remaining = pools.remaining(*pool)?;
        let lot = book.config().lot;
        let Some(side) = decide(remaining, need, lot) else {
            continue;
        };

        let intent = TradeIntent {
            fisher: fisher.id(),
            species: *species,
            side,
            quantity: lot,
            limit_price: params.limit_price(*species, side),
        };
        match book.submit(&intent, regulation) {
            SubmitOutcome::Accepted(_) => accepted = accepted.saturating_add(1),
            SubmitOutcome::Rejected(reason) => {
                debug!(fisher = %fisher.id(), %species, ?side, ?reason, "Quota intent rejected");
            }
        }
    }
    Ok(accepted)
}
