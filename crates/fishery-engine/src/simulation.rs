//! Scenario wiring: from a [`SimulationConfig`] to a running simulation.
//!
//! # Construction Sequence
//!
//! 1. Build the species roster and one fixed-price market per species
//! 2. Create and start the scheduler from the time section and seed
//! 3. Build the regulation factory from the regulation section
//! 4. Create the configured number of fishers, one regulation each
//! 5. Register the factory's scaler, yearly reset and quota market, the
//!    market counter reset and the yearly summary collector
//! 6. Start every registered startable

use std::collections::BTreeMap;

use fishery_core::config::SimulationBoundsConfig;
use fishery_core::runner::{
    NoOpCallback, RunToBounds, SimulationResult, StepCallback, YearEndPredicate, log_simulation_end,
    run_simulation,
};
use fishery_core::{Scheduler, SimulationConfig, StartableRegistry};
use fishery_market::{CounterReset, MarketMap};
use fishery_quota::{QuotaModel, RegulationFactory};
use fishery_types::{FisherId, RunId, SchemeId, SpeciesId, SpeciesList};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::fisher::{self, Fisher};
use crate::model::FishState;
use crate::summary::YearlySummaryCollector;
use crate::trader::TradingParams;

/// A model, its scheduler and everything started on it.
pub struct Simulation {
    run_id: RunId,
    model: FishState,
    scheduler: Scheduler<FishState>,
    registry: StartableRegistry<FishState>,
    factory: RegulationFactory,
    catch_spread: Decimal,
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("run_id", &self.run_id)
            .field("step", &self.scheduler.clock().step())
            .field("fishers", &self.model.fisher_count())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Build and start a simulation from a scenario.
    ///
    /// # Errors
    ///
    /// Any construction failure: invalid time section, invalid regulation
    /// section, negative prices, or a startable that fails to start.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let run_id = RunId::new();

        // 1. Species and markets.
        let species = SpeciesList::from_names(config.species.iter().map(|s| s.name.clone())).ok_or(
            EngineError::TooManySpecies {
                count: config.species.len(),
            },
        )?;
        let prices: BTreeMap<SpeciesId, Decimal> = species
            .ids()
            .zip(config.species.iter().map(|s| s.price))
            .collect();
        let markets = MarketMap::from_prices(prices.clone())?;
        let daily_catch = resolve_daily_catch(&config.population.daily_catch, &species);
        let trading = TradingParams::new(prices, config.population.trading_markup);

        // 2. Scheduler.
        let mut scheduler = Scheduler::from_config(config)?;
        scheduler.start()?;

        // 3. Regulation factory.
        let factory = RegulationFactory::from_config(&config.regulation, &species, SchemeId::new(0))?;

        let mut simulation = Self {
            run_id,
            model: FishState::new(species, markets, daily_catch, trading),
            scheduler,
            registry: StartableRegistry::new(),
            factory,
            catch_spread: config.population.catch_spread,
        };

        // 4. Fishers.
        for _ in 0..config.population.fishers {
            simulation.add_fisher()?;
        }

        // 5. Startables.
        simulation.register_startables()?;

        // 6. Start.
        simulation
            .registry
            .start_all(&mut simulation.model, &mut simulation.scheduler)?;

        info!(
            run_id = %simulation.run_id,
            world = %config.world.name,
            seed = config.world.seed,
            regulation = ?config.regulation.kind,
            fishers = simulation.model.fisher_count(),
            species = simulation.model.species().len(),
            "Simulation ready"
        );
        Ok(simulation)
    }

    fn register_startables(&mut self) -> Result<(), EngineError> {
        let Self {
            model,
            scheduler,
            registry,
            factory,
            ..
        } = self;
        if let Some(scaler) = factory.scaler() {
            registry.register(scaler, model, scheduler)?;
        }
        if let Some(reset) = factory.yearly_reset() {
            registry.register(reset, model, scheduler)?;
        }
        if let Some(market) = factory.market() {
            registry.register(market, model, scheduler)?;
        }
        registry.register(CounterReset::new(), model, scheduler)?;
        registry.register(YearlySummaryCollector::new(), model, scheduler)?;
        Ok(())
    }

    /// Identifier of this run in log output.
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The model.
    pub const fn model(&self) -> &FishState {
        &self.model
    }

    /// The scheduler.
    pub const fn scheduler(&self) -> &Scheduler<FishState> {
        &self.scheduler
    }

    /// The regulation factory fishers are built from.
    pub const fn factory(&self) -> &RegulationFactory {
        &self.factory
    }

    /// Add a fisher with a catch factor drawn from the run's RNG.
    ///
    /// # Errors
    ///
    /// [`EngineError`] from regulation construction or scheduling.
    pub fn add_fisher(&mut self) -> Result<FisherId, EngineError> {
        let factor = fisher::draw_catch_factor(self.scheduler.rng_mut(), self.catch_spread);
        self.add_fisher_with_factor(factor)
    }

    /// Add a fisher landing `factor` times the configured daily catch.
    ///
    /// Under IQ and ITQ a fisher joining a running simulation triggers an
    /// immediate rescale: the aggregate is divided again across every live
    /// fisher of the scheme, newcomer included, and each pool is refilled
    /// to its new share.
    ///
    /// # Errors
    ///
    /// [`EngineError`] from regulation construction, scheduling or the
    /// rescale.
    pub fn add_fisher_with_factor(&mut self, factor: Decimal) -> Result<FisherId, EngineError> {
        let regulation = self.factory.apply(&mut self.model.quota_mut().pools)?;
        let id = self.model.next_fisher_id()?;
        let handle = fisher::schedule_daily(&mut self.scheduler, id)?;
        self.model
            .insert_fisher(Fisher::new(id, regulation, factor, handle));

        if self.registry.is_model_started()
            && let Some(scaler) = self.factory.scaler()
        {
            let outcome = scaler.rescale(&mut self.model)?;
            debug!(fisher = %id, fishers = outcome.fishers, "Rescaled quota for joining fisher");
        }
        Ok(id)
    }

    /// Remove a fisher. Its daily action stops and the next rescale no
    /// longer counts it.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownFisher`].
    pub fn remove_fisher(&mut self, id: FisherId) -> Result<Fisher, EngineError> {
        self.model.remove_fisher(id)
    }

    /// Change the aggregate yearly quota: of `species` under `tac`, or of
    /// the single pool under `mono_tac` when `species` is `None`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Quota`] if the regulation kind has no shared target.
    pub fn set_yearly_quota(&mut self, species: Option<SpeciesId>, yearly: Decimal) -> Result<(), EngineError> {
        let pools = &mut self.model.quota_mut().pools;
        match species {
            Some(species) => self.factory.set_species_yearly_quota(pools, species, yearly)?,
            None => self.factory.set_yearly_quota(pools, yearly)?,
        }
        info!(species = ?species, %yearly, "Yearly quota changed");
        Ok(())
    }

    /// Run one step.
    ///
    /// # Errors
    ///
    /// [`EngineError::Schedule`] if an action fails.
    pub fn step(&mut self) -> Result<u64, EngineError> {
        Ok(self.scheduler.step(&mut self.model)?)
    }

    /// Run until `bounds` end the run.
    ///
    /// # Errors
    ///
    /// [`EngineError::Runner`] if a step fails.
    pub fn run(&mut self, bounds: &SimulationBoundsConfig) -> Result<SimulationResult, EngineError> {
        self.run_with(bounds, &mut RunToBounds, &mut NoOpCallback)
    }

    /// Run until `bounds` or `predicate` end the run, calling `callback`
    /// after every step.
    ///
    /// # Errors
    ///
    /// [`EngineError::Runner`] if a step fails.
    pub fn run_with(
        &mut self,
        bounds: &SimulationBoundsConfig,
        predicate: &mut dyn YearEndPredicate<FishState>,
        callback: &mut dyn StepCallback<FishState>,
    ) -> Result<SimulationResult, EngineError> {
        let result = run_simulation(&mut self.model, &mut self.scheduler, bounds, predicate, callback)?;
        log_simulation_end(&result);
        Ok(result)
    }

    /// Turn every startable off and tear the scheduler down. Idempotent.
    pub fn teardown(&mut self) {
        self.registry.turn_off_all();
        self.scheduler.teardown();
    }
}

fn resolve_daily_catch(
    by_name: &BTreeMap<String, Decimal>,
    species: &SpeciesList,
) -> BTreeMap<SpeciesId, Decimal> {
    let mut resolved = BTreeMap::new();
    for (name, kg) in by_name {
        match species.find_by_name(name) {
            Some(found) => {
                resolved.insert(found.id, *kg);
            }
            None => warn!(species = %name, "Unknown species in daily_catch; ignored"),
        }
    }
    resolved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fishery_core::config::SpeciesConfig;
    use fishery_types::RegulationKind;
    use rust_decimal_macros::dec;

    use super::*;

    fn config(kind: RegulationKind) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.species = vec![SpeciesConfig {
            name: "Cod".to_owned(),
            price: dec!(2),
        }];
        config.population.fishers = 3;
        config.population.daily_catch = BTreeMap::from([("Cod".to_owned(), dec!(5))]);
        config.regulation.kind = kind;
        config
    }

    #[test]
    fn builds_population_and_startables() {
        let sim = Simulation::from_config(&config(RegulationKind::Anarchy)).unwrap();
        assert_eq!(sim.model().fisher_count(), 3);
        // Three fisher actions plus counter resets and the summary collector.
        assert!(sim.scheduler().live_actions() >= 3);
    }

    #[test]
    fn unknown_catch_species_is_ignored() {
        let species = SpeciesList::from_names(["Cod"]).unwrap();
        let by_name = BTreeMap::from([("Cod".to_owned(), dec!(1)), ("Eel".to_owned(), dec!(2))]);
        let resolved = resolve_daily_catch(&by_name, &species);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get(&SpeciesId::new(0)), Some(&dec!(1)));
    }

    #[test]
    fn bad_regulation_section_fails_construction() {
        let config = config(RegulationKind::Tac);
        assert!(matches!(
            Simulation::from_config(&config),
            Err(EngineError::Quota { .. })
        ));
    }

    #[test]
    fn removing_fisher_twice_fails() {
        let mut sim = Simulation::from_config(&config(RegulationKind::Anarchy)).unwrap();
        sim.remove_fisher(FisherId::new(1)).unwrap();
        assert_eq!(sim.model().fisher_count(), 2);
        assert!(sim.remove_fisher(FisherId::new(1)).is_err());
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut sim = Simulation::from_config(&config(RegulationKind::Anarchy)).unwrap();
        sim.teardown();
        sim.teardown();
        assert_eq!(sim.scheduler().live_actions(), 0);
    }

    #[test]
    fn mono_tac_target_can_change() {
        let mut config = config(RegulationKind::MonoTac);
        config.regulation.yearly_quota = Some(dec!(100));
        let mut sim = Simulation::from_config(&config).unwrap();
        sim.set_yearly_quota(None, dec!(40)).unwrap();
        let fisher = sim.model().fisher(FisherId::new(0)).unwrap();
        let yearly = fisher
            .regulation()
            .yearly_quota(&sim.model().quota_state().pools, SpeciesId::new(0))
            .unwrap();
        assert_eq!(yearly.limit(), Some(dec!(40)));
        assert!(sim.set_yearly_quota(Some(SpeciesId::new(0)), dec!(10)).is_err());
    }
}
