//! Fishers: the economic agents of the simulation.
//!
//! Each fisher holds the regulation it was given at creation, its cash and
//! this year's landings. Its behaviour is one daily action in
//! [`Phase::FisherPhase`]: land the day's catch if the regulation allows
//! going to sea, then (under ITQ) post quota intents for the day's clearing.

use std::collections::BTreeMap;

use fishery_core::{ScheduleError, Scheduler, StepContext, Stoppable, steppable};
use fishery_market::SaleOutcome;
use fishery_quota::Regulation;
use fishery_types::{FisherId, Phase, SpeciesId};
use rand::Rng;
use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::model::FishState;

/// One fisher.
#[derive(Debug)]
pub struct Fisher {
    id: FisherId,
    regulation: Regulation,
    catch_factor: Decimal,
    cash: Decimal,
    landed: BTreeMap<SpeciesId, Decimal>,
    days_at_sea: u32,
    handle: Stoppable,
}

impl Fisher {
    /// Create a fisher whose daily action is cancelled through `handle`.
    pub const fn new(id: FisherId, regulation: Regulation, catch_factor: Decimal, handle: Stoppable) -> Self {
        Self {
            id,
            regulation,
            catch_factor,
            cash: Decimal::ZERO,
            landed: BTreeMap::new(),
            days_at_sea: 0,
            handle,
        }
    }

    /// The fisher's id.
    pub const fn id(&self) -> FisherId {
        self.id
    }

    /// The regulation this fisher operates under.
    pub const fn regulation(&self) -> &Regulation {
        &self.regulation
    }

    /// Multiplier applied to the configured daily catch.
    pub const fn catch_factor(&self) -> Decimal {
        self.catch_factor
    }

    /// Money from sales and quota trades. May be negative after buying.
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    /// Kilograms sold this year, by species.
    pub const fn landed(&self) -> &BTreeMap<SpeciesId, Decimal> {
        &self.landed
    }

    /// Days this year on which the regulation let the fisher out.
    pub const fn days_at_sea(&self) -> u32 {
        self.days_at_sea
    }

    /// This fisher's catch of `species` for one day, given the configured mean.
    pub fn daily_catch(&self, mean: Decimal) -> Result<Decimal, EngineError> {
        mean.checked_mul(self.catch_factor)
            .ok_or(EngineError::Overflow { what: "daily catch" })
    }

    pub(crate) const fn went_to_sea(&mut self) {
        self.days_at_sea = self.days_at_sea.saturating_add(1);
    }

    pub(crate) fn record_sale(&mut self, species: SpeciesId, sale: &SaleOutcome) -> Result<(), EngineError> {
        if sale.sold <= Decimal::ZERO {
            return Ok(());
        }
        self.cash = self
            .cash
            .checked_add(sale.earnings)
            .ok_or(EngineError::Overflow { what: "fisher cash" })?;
        let landed = self.landed.entry(species).or_insert(Decimal::ZERO);
        *landed = landed
            .checked_add(sale.sold)
            .ok_or(EngineError::Overflow { what: "fisher landings" })?;
        Ok(())
    }

    pub(crate) fn receive(&mut self, amount: Decimal) -> Result<(), EngineError> {
        self.cash = self
            .cash
            .checked_add(amount)
            .ok_or(EngineError::Overflow { what: "fisher cash" })?;
        Ok(())
    }

    pub(crate) fn pay(&mut self, amount: Decimal) -> Result<(), EngineError> {
        self.cash = self
            .cash
            .checked_sub(amount)
            .ok_or(EngineError::Overflow { what: "fisher cash" })?;
        Ok(())
    }

    pub(crate) fn reset_yearly(&mut self) {
        self.landed.clear();
        self.days_at_sea = 0;
    }

    /// Cancel the daily action.
    pub(crate) fn retire(&self) {
        self.handle.stop();
    }
}

/// Register the daily action of fisher `id`.
///
/// The action stops itself once the fisher is no longer in the model.
pub fn schedule_daily(scheduler: &mut Scheduler<FishState>, id: FisherId) -> Result<Stoppable, ScheduleError> {
    scheduler.schedule_every_day(
        Phase::FisherPhase,
        steppable(move |model: &mut FishState, ctx: &mut StepContext<'_, FishState>| {
            let day_of_year = ctx.clock().day_of_year();
            if !model.fisher_day(id, day_of_year)? {
                ctx.stop_self();
            }
            Ok(())
        }),
    )
}

/// Draw a catch factor uniformly from `[1 - spread, 1 + spread]`, in
/// thousandths.
pub fn draw_catch_factor<R: Rng + ?Sized>(rng: &mut R, spread: Decimal) -> Decimal {
    let per_mille = spread
        .checked_mul(Decimal::ONE_THOUSAND)
        .and_then(|d| i64::try_from(d.trunc()).ok())
        .unwrap_or(0)
        .clamp(0, 1000);
    if per_mille == 0 {
        return Decimal::ONE;
    }
    let offset = rng.random_range(per_mille.saturating_neg()..=per_mille);
    Decimal::new(1000_i64.saturating_add(offset), 3)
}
