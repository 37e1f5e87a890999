//! Quota lifecycle under the scheduler.
//!
//! Factories, scalers, yearly resets and the ITQ market wired together the
//! way a host model wires them, then driven step by step.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use fishery_core::config::RegulationConfig;
use fishery_core::{ActionError, Scheduler, SimulationClock, StartableRegistry};
use fishery_quota::{
    QuotaModel, QuotaState, Regulation, RegulationFactory, TradeIntent, TradeRecord,
};
use fishery_types::{Ceiling, FisherId, RegulationKind, SchemeId, SpeciesId, SpeciesList, TradeSide};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const COD: SpeciesId = SpeciesId::new(0);

#[derive(Default)]
struct Fleet {
    quota: QuotaState,
    fishers: BTreeMap<FisherId, Regulation>,
    trades: Vec<TradeRecord>,
}

impl QuotaModel for Fleet {
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
        self.fishers.get(&fisher)
    }

    fn on_trades(&mut self, trades: &[TradeRecord]) -> Result<(), ActionError> {
        self.trades.extend_from_slice(trades);
        Ok(())
    }
}

impl Fleet {
    fn remaining(&self, fisher: u32) -> Ceiling {
        self.fishers[&FisherId::new(fisher)]
            .quota_remaining(&self.quota.pools, COD)
            .unwrap()
    }

    fn yearly(&self, fisher: u32) -> Ceiling {
        self.fishers[&FisherId::new(fisher)]
            .yearly_quota(&self.quota.pools, COD)
            .unwrap()
    }
}

struct World {
    fleet: Fleet,
    scheduler: Scheduler<Fleet>,
    registry: StartableRegistry<Fleet>,
    factory: RegulationFactory,
}

fn world(config: &RegulationConfig, fishers: u32) -> World {
    let species = SpeciesList::from_names(["Cod", "Hake"]).unwrap();
    let clock = SimulationClock::new(1, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap();
    let mut scheduler = Scheduler::new(clock, 11);
    scheduler.start().unwrap();

    let mut fleet = Fleet::default();
    let mut factory = RegulationFactory::from_config(config, &species, SchemeId::new(0)).unwrap();
    for id in 0..fishers {
        let regulation = factory.apply(&mut fleet.quota.pools).unwrap();
        fleet.fishers.insert(FisherId::new(id), regulation);
    }

    let mut registry = StartableRegistry::new();
    if let Some(scaler) = factory.scaler() {
        registry.register(scaler, &mut fleet, &mut scheduler).unwrap();
    }
    if let Some(reset) = factory.yearly_reset() {
        registry.register(reset, &mut fleet, &mut scheduler).unwrap();
    }
    if let Some(market) = factory.market() {
        registry.register(market, &mut fleet, &mut scheduler).unwrap();
    }
    registry.start_all(&mut fleet, &mut scheduler).unwrap();

    World {
        fleet,
        scheduler,
        registry,
        factory,
    }
}

fn multi(kind: RegulationKind, cod: Decimal) -> RegulationConfig {
    RegulationConfig {
        kind,
        yearly_quotas: BTreeMap::from([("Cod".to_owned(), cod)]),
        ..RegulationConfig::default()
    }
}

#[test]
fn itq_lot_moves_between_two_fishers() {
    let mut config = multi(RegulationKind::Itq, dec!(100));
    config.default_lot_size = dec!(10);
    let mut w = world(&config, 2);

    assert_eq!(w.fleet.remaining(0), Ceiling::Limited(dec!(50)));
    assert_eq!(w.fleet.remaining(1), Ceiling::Limited(dec!(50)));

    let scheme = w.factory.scheme();
    let offer = TradeIntent {
        fisher: FisherId::new(0),
        species: COD,
        side: TradeSide::Offer,
        quantity: dec!(10),
        limit_price: None,
    };
    let request = TradeIntent {
        fisher: FisherId::new(1),
        side: TradeSide::Request,
        ..offer.clone()
    };
    let seller = w.fleet.fishers[&FisherId::new(0)].clone();
    let buyer = w.fleet.fishers[&FisherId::new(1)].clone();
    let book = w.fleet.quota.book_mut(scheme, COD).unwrap();
    assert!(book.submit(&offer, &seller).is_accepted());
    assert!(book.submit(&request, &buyer).is_accepted());

    w.scheduler.step(&mut w.fleet).unwrap();

    assert_eq!(w.fleet.remaining(0), Ceiling::Limited(dec!(40)));
    assert_eq!(w.fleet.remaining(1), Ceiling::Limited(dec!(60)));
    assert_eq!(w.fleet.trades.len(), 1);
    assert_eq!(w.fleet.trades[0].seller, FisherId::new(0));

    let total = [0, 1]
        .iter()
        .filter_map(|f| w.fleet.remaining(*f).limit())
        .fold(Decimal::ZERO, |acc, r| acc + r);
    assert_eq!(total, dec!(100));
}

#[test]
fn iq_rescales_at_year_boundary_to_live_count() {
    let mut w = world(&multi(RegulationKind::Iq, dec!(200)), 2);
    assert_eq!(w.fleet.yearly(0), Ceiling::Limited(dec!(100)));

    // A third fisher joins mid-year with a fresh pool.
    let late = w.factory.apply(&mut w.fleet.quota.pools).unwrap();
    w.fleet.fishers.insert(FisherId::new(2), late);

    let pool = w.fleet.fishers[&FisherId::new(0)].pool_for(COD).unwrap();
    w.fleet.quota.pools.consume(pool, dec!(30)).unwrap();

    for _ in 0..365 {
        w.scheduler.step(&mut w.fleet).unwrap();
    }
    let share = dec!(200) / dec!(3);
    for fisher in 0..3 {
        assert_eq!(w.fleet.yearly(fisher), Ceiling::Limited(share));
        assert_eq!(w.fleet.remaining(fisher), Ceiling::Limited(share));
    }
}

#[test]
fn tac_pool_is_shared_and_refilled_yearly() {
    let mut w = world(&multi(RegulationKind::Tac, dec!(200)), 2);
    let a = w.fleet.fishers[&FisherId::new(0)].clone();
    a.react_to_sale(&mut w.fleet.quota.pools, COD, dec!(100)).unwrap();
    assert_eq!(w.fleet.remaining(1), Ceiling::Limited(dec!(100)));

    // Hake is absent from the map: unconstrained, not zero.
    assert_eq!(
        a.max_biomass_sellable(&w.fleet.quota.pools, SpeciesId::new(1)).unwrap(),
        Ceiling::Unbounded
    );

    for _ in 0..365 {
        w.scheduler.step(&mut w.fleet).unwrap();
    }
    assert_eq!(w.fleet.remaining(1), Ceiling::Limited(dec!(200)));
}

#[test]
fn turning_off_stops_yearly_work() {
    let mut w = world(&multi(RegulationKind::Itq, dec!(100)), 2);
    assert!(w.scheduler.live_actions() > 0);
    w.registry.turn_off_all();
    assert_eq!(w.scheduler.live_actions(), 0);
    w.registry.turn_off_all();
}
