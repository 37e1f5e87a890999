//! Yearly data gathering.
//!
//! [`YearlySummaryCollector`] snapshots the model at every year end in
//! [`Phase::YearlyDataGathering`] and clears per-year fisher and trade data
//! in [`Phase::DataReset`]. Market counters are reset separately by
//! [`fishery_market::CounterReset`], in the same phase.

use std::collections::BTreeMap;

use fishery_core::{ActionError, Scheduler, StepContext, Startable, Stoppable, steppable};
use fishery_quota::TradeRecord;
use fishery_types::Phase;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::EngineError;
use crate::model::FishState;

/// Quota trades over a period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeTally {
    /// Number of matched lots.
    pub count: u32,
    /// Quota moved, in kg.
    pub volume: Decimal,
    /// Money paid for it.
    pub value: Decimal,
}

impl TradeTally {
    pub(crate) fn record(&mut self, trade: &TradeRecord) -> Result<(), EngineError> {
        self.count = self
            .count
            .checked_add(1)
            .ok_or(EngineError::Overflow { what: "trade count" })?;
        self.volume = self
            .volume
            .checked_add(trade.quantity)
            .ok_or(EngineError::Overflow { what: "trade volume" })?;
        self.value = self
            .value
            .checked_add(trade.value)
            .ok_or(EngineError::Overflow { what: "trade value" })?;
        Ok(())
    }
}

/// One species over one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesYear {
    /// Kilograms sold.
    pub landings: Decimal,
    /// Money paid for them.
    pub earnings: Decimal,
    /// Quota held by live fishers once the year-end refill or rescale ran;
    /// `None` when nobody is constrained.
    pub quota_next_year: Option<Decimal>,
}

/// One simulated year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlySummary {
    /// Zero-based simulated year.
    pub year: u64,
    /// Live fishers at year end.
    pub fishers: usize,
    /// Per-species figures, by species name.
    pub species: BTreeMap<String, SpeciesYear>,
    /// Quota trades during the year.
    pub trades: TradeTally,
}

/// Gathers a [`YearlySummary`] at every year end.
#[derive(Debug, Default)]
pub struct YearlySummaryCollector {
    handles: Vec<Stoppable>,
}

impl YearlySummaryCollector {
    /// Create the collector.
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl Startable<FishState> for YearlySummaryCollector {
    fn name(&self) -> &'static str {
        "yearly-summary"
    }

    fn start(
        &mut self,
        _model: &mut FishState,
        scheduler: &mut Scheduler<FishState>,
    ) -> Result<(), ActionError> {
        let gather = scheduler.schedule_every_year(
            Phase::YearlyDataGathering,
            steppable(|model: &mut FishState, ctx: &mut StepContext<'_, FishState>| {
                let summary = model.yearly_summary(ctx.clock().year())?;
                info!(
                    year = summary.year,
                    fishers = summary.fishers,
                    trades = summary.trades.count,
                    traded_kg = %summary.trades.volume,
                    "Year summarised"
                );
                for (name, figures) in &summary.species {
                    info!(
                        year = summary.year,
                        species = %name,
                        landings = %figures.landings,
                        earnings = %figures.earnings,
                        quota_next_year = ?figures.quota_next_year,
                        "Species year"
                    );
                }
                model.push_summary(summary);
                Ok(())
            }),
        )?;
        let reset = scheduler.schedule_every_year(
            Phase::DataReset,
            steppable(|model: &mut FishState, _: &mut StepContext<'_, FishState>| {
                model.reset_yearly();
                Ok(())
            }),
        )?;
        self.handles.push(gather);
        self.handles.push(reset);
        Ok(())
    }

    fn turn_off(&mut self) {
        for handle in self.handles.drain(..) {
            handle.stop();
        }
    }
}
