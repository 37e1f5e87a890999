//! The model every scheduled action mutates.

use std::collections::{BTreeMap, BTreeSet};

use fishery_core::ActionError;
use fishery_market::{MarketMap, MarketModel, sell_fish};
use fishery_quota::{QuotaModel, QuotaState, Regulation, TradeRecord};
use fishery_types::{FisherId, PoolId, SpeciesId, SpeciesList};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::EngineError;
use crate::fisher::Fisher;
use crate::summary::{SpeciesYear, TradeTally, YearlySummary};
use crate::trader::{self, TradingParams};

/// Fishers, quota, markets and the data gathered about them.
#[derive(Debug)]
pub struct FishState {
    species: SpeciesList,
    quota: QuotaState,
    markets: MarketMap,
    fishers: BTreeMap<FisherId, Fisher>,
    next_fisher: u32,
    daily_catch: BTreeMap<SpeciesId, Decimal>,
    trading: TradingParams,
    trades: TradeTally,
    summaries: Vec<YearlySummary>,
}

impl FishState {
    /// An empty model over `species`.
    pub fn new(
        species: SpeciesList,
        markets: MarketMap,
        daily_catch: BTreeMap<SpeciesId, Decimal>,
        trading: TradingParams,
    ) -> Self {
        Self {
            species,
            quota: QuotaState::new(),
            markets,
            fishers: BTreeMap::new(),
            next_fisher: 0,
            daily_catch,
            trading,
            trades: TradeTally::default(),
            summaries: Vec::new(),
        }
    }

    /// The species roster.
    pub const fn species(&self) -> &SpeciesList {
        &self.species
    }

    /// Pools and order books.
    pub const fn quota_state(&self) -> &QuotaState {
        &self.quota
    }

    /// Markets by species.
    pub const fn markets(&self) -> &MarketMap {
        &self.markets
    }

    /// A live fisher.
    pub fn fisher(&self, id: FisherId) -> Option<&Fisher> {
        self.fishers.get(&id)
    }

    /// Live fishers in id order.
    pub fn fishers(&self) -> impl Iterator<Item = &Fisher> {
        self.fishers.values()
    }

    /// Number of live fishers.
    pub fn fisher_count(&self) -> usize {
        self.fishers.len()
    }

    /// Quota trades since the last yearly reset.
    pub const fn trades(&self) -> &TradeTally {
        &self.trades
    }

    /// Summaries of every completed year, oldest first.
    pub fn summaries(&self) -> &[YearlySummary] {
        &self.summaries
    }

    pub(crate) fn next_fisher_id(&mut self) -> Result<FisherId, EngineError> {
        let id = FisherId::new(self.next_fisher);
        self.next_fisher = self
            .next_fisher
            .checked_add(1)
            .ok_or(EngineError::Overflow { what: "fisher ids" })?;
        Ok(id)
    }

    pub(crate) fn insert_fisher(&mut self, fisher: Fisher) {
        self.fishers.insert(fisher.id(), fisher);
    }

    /// Take a fisher out of the run: its daily action stops and its resting
    /// intents are withdrawn. Its pools stay in the table.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownFisher`].
    pub fn remove_fisher(&mut self, id: FisherId) -> Result<Fisher, EngineError> {
        let fisher = self
            .fishers
            .remove(&id)
            .ok_or(EngineError::UnknownFisher { fisher: id })?;
        fisher.retire();
        let withdrawn: usize = self
            .quota
            .books
            .values_mut()
            .map(|book| book.withdraw(id))
            .sum();
        info!(fisher = %id, withdrawn, live = self.fishers.len(), "Fisher removed");
        Ok(fisher)
    }

    /// Fisher `id`'s day: land and sell the catch if allowed at sea, then
    /// post quota intents. Returns `false` if the fisher is gone.
    pub(crate) fn fisher_day(&mut self, id: FisherId, day_of_year: u64) -> Result<bool, EngineError> {
        let Some(fisher) = self.fishers.get_mut(&id) else {
            return Ok(false);
        };

        if fisher.regulation().is_allowed_at_sea(&self.quota.pools)? {
            fisher.went_to_sea();
            for (species, mean) in &self.daily_catch {
                let catch = fisher.daily_catch(*mean)?;
                let sale = sell_fish(
                    catch,
                    id,
                    *species,
                    fisher.regulation(),
                    &mut self.quota.pools,
                    &mut self.markets,
                )?;
                fisher.record_sale(*species, &sale)?;
            }
        }

        if fisher.regulation().is_tradable() {
            trader::post_intents(fisher, &mut self.quota, &self.daily_catch, &self.trading, day_of_year)?;
        }
        Ok(true)
    }

    /// Summarise the year that is ending.
    ///
    /// Quota figures are read after the year-end refill or rescale, so they
    /// describe the allotment for the coming year.
    pub fn yearly_summary(&self, year: u64) -> Result<YearlySummary, EngineError> {
        let mut species = BTreeMap::new();
        for entry in self.species.iter() {
            let (landings, earnings) = self
                .markets
                .get(entry.id)
                .map_or((Decimal::ZERO, Decimal::ZERO), |m| {
                    (m.yearly().landings, m.yearly().earnings)
                });
            species.insert(
                entry.name.clone(),
                SpeciesYear {
                    landings,
                    earnings,
                    quota_next_year: self.quota_held(entry.id)?,
                },
            );
        }
        Ok(YearlySummary {
            year,
            fishers: self.fishers.len(),
            species,
            trades: self.trades.clone(),
        })
    }

    /// Remaining quota of `species` summed over the distinct pools live
    /// fishers draw on; `None` if no live fisher is constrained.
    fn quota_held(&self, species: SpeciesId) -> Result<Option<Decimal>, EngineError> {
        let pools: BTreeSet<PoolId> = self
            .fishers
            .values()
            .filter_map(|f| f.regulation().pool_for(species))
            .collect();
        if pools.is_empty() {
            return Ok(None);
        }
        let mut total = Decimal::ZERO;
        for pool in pools {
            total = total
                .checked_add(self.quota.pools.remaining(pool)?)
                .ok_or(EngineError::Overflow { what: "quota held" })?;
        }
        Ok(Some(total))
    }

    pub(crate) fn push_summary(&mut self, summary: YearlySummary) {
        self.summaries.push(summary);
    }

    /// Clear per-year fisher and trade data.
    pub(crate) fn reset_yearly(&mut self) {
        self.trades = TradeTally::default();
        self.fishers.values_mut().for_each(Fisher::reset_yearly);
    }
}

impl QuotaModel for FishState {
    fn quota(&self) -> &QuotaState {
        &self.quota
    }

    fn quota_mut(&mut self) -> &mut QuotaState {
        &mut self.quota
    }

    fn live_fishers(&self) -> Vec<FisherId> {
        self.fishers.keys().copied().collect()
    }

    fn regulation(&self, fisher: FisherId) -> Option<&Regulation> {
        self.fishers.get(&fisher).map(Fisher::regulation)
    }

    fn on_trades(&mut self, trades: &[TradeRecord]) -> Result<(), ActionError> {
        for trade in trades {
            if let Some(seller) = self.fishers.get_mut(&trade.seller) {
                seller.receive(trade.value)?;
            }
            if let Some(buyer) = self.fishers.get_mut(&trade.buyer) {
                buyer.pay(trade.value)?;
            }
            self.trades.record(trade)?;
        }
        Ok(())
    }
}

impl MarketModel for FishState {
    fn markets_mut(&mut self) -> &mut MarketMap {
        &mut self.markets
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use fishery_core::Stoppable;
    use fishery_types::SchemeId;
    use rust_decimal_macros::dec;

    use super::*;

    const COD: SpeciesId = SpeciesId::new(0);

    fn state(quota: Option<Decimal>) -> (FishState, Vec<FisherId>) {
        let species = SpeciesList::from_names(["Cod"]).unwrap();
        let markets = MarketMap::from_prices([(COD, dec!(2))]).unwrap();
        let mut model = FishState::new(
            species,
            markets,
            BTreeMap::from([(COD, dec!(30))]),
            TradingParams::default(),
        );
        let shared = quota.map(|q| model.quota.pools.create(SchemeId::new(0), None, q).unwrap());
        let mut ids = Vec::new();
        for _ in 0..2 {
            let id = model.next_fisher_id().unwrap();
            let regulation = shared.map_or(Regulation::Anarchy, |pool| Regulation::MonoQuota {
                scheme: SchemeId::new(0),
                pool,
            });
            model.insert_fisher(Fisher::new(id, regulation, Decimal::ONE, Stoppable::new()));
            ids.push(id);
        }
        (model, ids)
    }

    #[test]
    fn fisher_day_lands_until_quota_runs_out() {
        let (mut model, ids) = state(Some(dec!(50)));
        assert!(model.fisher_day(ids[0], 1).unwrap());
        assert!(model.fisher_day(ids[1], 1).unwrap());
        assert_eq!(model.fisher(ids[0]).unwrap().landed().get(&COD), Some(&dec!(30)));
        assert_eq!(model.fisher(ids[1]).unwrap().landed().get(&COD), Some(&dec!(20)));

        // Shared pool exhausted: nobody goes out.
        model.fisher_day(ids[0], 2).unwrap();
        assert_eq!(model.fisher(ids[0]).unwrap().days_at_sea(), 1);
    }

    #[test]
    fn removed_fisher_day_reports_gone() {
        let (mut model, ids) = state(None);
        let removed = model.remove_fisher(ids[0]).unwrap();
        assert_eq!(removed.id(), ids[0]);
        assert!(!model.fisher_day(ids[0], 1).unwrap());
        assert_eq!(model.live_fishers(), vec![ids[1]]);
        assert!(matches!(
            model.remove_fisher(ids[0]),
            Err(EngineError::UnknownFisher { .. })
        ));
    }

    #[test]
    fn trades_move_cash_and_tally() {
        let (mut model, ids) = state(None);
        let trade = TradeRecord {
            step: 0,
            species: COD,
            seller: ids[0],
            buyer: ids[1],
            quantity: dec!(10),
            price: dec!(3),
            value: dec!(30),
        };
        model.on_trades(&[trade]).unwrap();
        assert_eq!(model.fisher(ids[0]).unwrap().cash(), dec!(30));
        assert_eq!(model.fisher(ids[1]).unwrap().cash(), dec!(-30));
        assert_eq!(model.trades().count, 1);
        assert_eq!(model.trades().value, dec!(30));

        model.reset_yearly();
        assert_eq!(model.trades().count, 0);
    }

    #[test]
    fn summary_reports_landings_and_quota() {
        let (mut model, ids) = state(Some(dec!(100)));
        model.fisher_day(ids[0], 1).unwrap();
        let summary = model.yearly_summary(0).unwrap();
        let cod = &summary.species["Cod"];
        assert_eq!(cod.landings, dec!(30));
        assert_eq!(cod.earnings, dec!(60));
        // One shared pool, counted once.
        assert_eq!(cod.quota_next_year, Some(dec!(70)));
        assert_eq!(summary.fishers, 2);
    }

    #[test]
    fn anarchy_summary_has_no_quota() {
        let (model, _) = state(None);
        let summary = model.yearly_summary(0).unwrap();
        assert_eq!(summary.species["Cod"].quota_next_year, None);
    }
}
