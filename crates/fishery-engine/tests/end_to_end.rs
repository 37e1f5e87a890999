//! End-to-end runs of the engine under each regulation regime.
//!
//! Every test builds a [`Simulation`] from an in-memory scenario, runs it
//! for a bounded number of steps or years, and checks landings, quota and
//! trades against hand-computed figures.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::collections::BTreeMap;

use fishery_core::SimulationConfig;
use fishery_core::config::{SimulationBoundsConfig, SpeciesConfig};
use fishery_engine::Simulation;
use fishery_types::{Ceiling, FisherId, RegulationKind, SpeciesId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const COD: SpeciesId = SpeciesId::new(0);

fn scenario(kind: RegulationKind, fishers: u32, cod_catch: Decimal) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.species = vec![
        SpeciesConfig {
            name: "Cod".to_owned(),
            price: dec!(2),
        },
        SpeciesConfig {
            name: "Hake".to_owned(),
            price: dec!(1),
        },
    ];
    config.population.fishers = fishers;
    config.population.daily_catch = BTreeMap::from([("Cod".to_owned(), cod_catch)]);
    config.regulation.kind = kind;
    config
}

fn one_year() -> SimulationBoundsConfig {
    SimulationBoundsConfig {
        max_years: 1,
        max_steps: 0,
    }
}

fn steps(n: u64) -> SimulationBoundsConfig {
    SimulationBoundsConfig {
        max_years: 0,
        max_steps: n,
    }
}

fn cod_quota(sim: &Simulation, fisher: u32) -> (Ceiling, Ceiling) {
    let model = sim.model();
    let regulation = model.fisher(FisherId::new(fisher)).unwrap().regulation();
    let pools = &model.quota_state().pools;
    (
        regulation.quota_remaining(pools, COD).unwrap(),
        regulation.yearly_quota(pools, COD).unwrap(),
    )
}

#[test]
fn anarchy_lands_everything() {
    let mut sim = Simulation::from_config(&scenario(RegulationKind::Anarchy, 3, dec!(10))).unwrap();
    let result = sim.run(&one_year()).unwrap();
    assert_eq!(result.years_completed, 1);
    assert_eq!(result.total_steps, 365);

    let summary = &sim.model().summaries()[0];
    assert_eq!(summary.species["Cod"].landings, dec!(10950));
    assert_eq!(summary.species["Cod"].earnings, dec!(21900));
    assert_eq!(summary.species["Cod"].quota_next_year, None);
}

#[test]
fn tac_shared_pool_caps_total_landings() {
    let mut config = scenario(RegulationKind::Tac, 2, dec!(30));
    config.regulation.yearly_quotas = BTreeMap::from([("Cod".to_owned(), dec!(200))]);
    let mut sim = Simulation::from_config(&config).unwrap();

    sim.run(&steps(4)).unwrap();
    // 60 + 60 + 60 + 20: the shared pool is empty.
    assert_eq!(cod_quota(&sim, 0).0, Ceiling::Limited(Decimal::ZERO));
    assert_eq!(cod_quota(&sim, 1).0, Ceiling::Limited(Decimal::ZERO));

    sim.run(&one_year()).unwrap();
    let summary = &sim.model().summaries()[0];
    assert_eq!(summary.species["Cod"].landings, dec!(200));
    assert_eq!(summary.species["Cod"].earnings, dec!(400));
    // Refilled at year end.
    assert_eq!(summary.species["Cod"].quota_next_year, Some(dec!(200)));
    // Hake is not in the quota map.
    assert_eq!(summary.species["Hake"].quota_next_year, None);
}

#[test]
fn mono_iq_gives_each_fisher_the_full_quota() {
    let mut config = scenario(RegulationKind::MonoIq, 2, dec!(30));
    config.regulation.yearly_quota = Some(dec!(50));
    let mut sim = Simulation::from_config(&config).unwrap();
    sim.run(&one_year()).unwrap();
    assert_eq!(sim.model().summaries()[0].species["Cod"].landings, dec!(100));
}

#[test]
fn iq_rescales_to_live_fishers_after_removal() {
    let mut config = scenario(RegulationKind::Iq, 3, dec!(1));
    config.regulation.yearly_quotas = BTreeMap::from([("Cod".to_owned(), dec!(300))]);
    let mut sim = Simulation::from_config(&config).unwrap();
    assert_eq!(cod_quota(&sim, 0).1, Ceiling::Limited(dec!(100)));

    sim.run(&one_year()).unwrap();
    assert_eq!(sim.model().summaries()[0].species["Cod"].landings, dec!(300));

    let live_before = sim.scheduler().live_actions();
    sim.remove_fisher(FisherId::new(2)).unwrap();
    assert_eq!(sim.scheduler().live_actions(), live_before - 1);

    sim.run(&one_year()).unwrap();
    let year_two = &sim.model().summaries()[1];
    assert_eq!(year_two.fishers, 2);
    assert_eq!(year_two.species["Cod"].landings, dec!(200));
    assert_eq!(cod_quota(&sim, 0), (Ceiling::Limited(dec!(150)), Ceiling::Limited(dec!(150))));
    assert_eq!(cod_quota(&sim, 1).1, Ceiling::Limited(dec!(150)));
}

#[test]
fn iq_join_after_start_keeps_aggregate() {
    let mut config = scenario(RegulationKind::Iq, 2, dec!(1));
    config.regulation.yearly_quotas = BTreeMap::from([("Cod".to_owned(), dec!(90))]);
    let mut sim = Simulation::from_config(&config).unwrap();
    assert_eq!(cod_quota(&sim, 0).1, Ceiling::Limited(dec!(45)));

    sim.step().unwrap();
    assert_eq!(cod_quota(&sim, 0).0, Ceiling::Limited(dec!(44)));

    let joined = sim.add_fisher_with_factor(Decimal::ZERO).unwrap();
    let total: Decimal = sim
        .model()
        .fishers()
        .map(|f| cod_quota(&sim, f.id().into_inner()).1.limit().unwrap())
        .sum();
    assert_eq!(total, dec!(90));
    // Every pool is refilled to the new share.
    assert_eq!(cod_quota(&sim, 0), (Ceiling::Limited(dec!(30)), Ceiling::Limited(dec!(30))));
    assert_eq!(cod_quota(&sim, joined.into_inner()), (Ceiling::Limited(dec!(30)), Ceiling::Limited(dec!(30))));
}

#[test]
fn itq_idle_fisher_sells_lots_to_busy_fisher() {
    let mut config = scenario(RegulationKind::Itq, 0, dec!(10));
    config.regulation.yearly_quotas = BTreeMap::from([("Cod".to_owned(), dec!(1000))]);
    let mut sim = Simulation::from_config(&config).unwrap();
    // Each join rescales: 1000 for the first, then 500 apiece.
    let idle = sim.add_fisher_with_factor(Decimal::ZERO).unwrap();
    assert_eq!(cod_quota(&sim, idle.into_inner()).1, Ceiling::Limited(dec!(1000)));
    let busy = sim.add_fisher_with_factor(Decimal::ONE).unwrap();
    assert_eq!(cod_quota(&sim, idle.into_inner()).1, Ceiling::Limited(dec!(500)));
    assert_eq!(cod_quota(&sim, busy.into_inner()).1, Ceiling::Limited(dec!(500)));

    sim.run(&steps(12)).unwrap();

    let model = sim.model();
    assert_eq!(model.trades().count, 5);
    assert_eq!(model.trades().volume, dec!(500));
    // Requests quote 2.2, offers 1.8; midpoint pricing.
    assert_eq!(model.trades().value, dec!(1000));

    assert_eq!(cod_quota(&sim, idle.into_inner()), (Ceiling::Limited(Decimal::ZERO), Ceiling::Limited(Decimal::ZERO)));
    assert_eq!(cod_quota(&sim, busy.into_inner()).0, Ceiling::Limited(dec!(880)));
    assert_eq!(cod_quota(&sim, busy.into_inner()).1, Ceiling::Limited(dec!(1000)));

    assert_eq!(model.fisher(idle).unwrap().cash(), dec!(1000));
    // 120 kg landed at 2 against 1000 paid for quota.
    assert_eq!(model.fisher(busy).unwrap().cash(), dec!(-760));
}

#[test]
fn same_seed_same_outcome() {
    let run = || {
        let mut config = scenario(RegulationKind::Itq, 8, dec!(6));
        config.population.catch_spread = dec!(0.5);
        config.regulation.yearly_quotas = BTreeMap::from([("Cod".to_owned(), dec!(12000))]);
        config.regulation.default_lot_size = dec!(20);
        let mut sim = Simulation::from_config(&config).unwrap();
        sim.run(&one_year()).unwrap();
        let cash: Vec<Decimal> = sim.model().fishers().map(|f| f.cash()).collect();
        (sim.model().summaries().to_vec(), cash)
    };
    assert_eq!(run(), run());
}

#[test]
fn bundled_scenario_builds_and_steps() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fishery-scenario.yaml");
    if !path.exists() {
        return;
    }
    let config = SimulationConfig::from_file(&path).unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    let result = sim.run(&steps(30)).unwrap();
    assert_eq!(result.total_steps, 30);
    sim.teardown();
    assert_eq!(sim.scheduler().live_actions(), 0);
}
