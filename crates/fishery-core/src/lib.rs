//! Simulation clock, scheduler, and run loop for the fishery simulation.
//!
//! This crate owns simulated time. A [`Scheduler`] advances the
//! [`SimulationClock`] one step at a time and dispatches registered actions
//! in a fixed phase order, reshuffling randomized phases every step with
//! its own seeded RNG.
//!
//! # Modules
//!
//! - [`clock`] -- Step counter with day, year, hour and calendar-date
//!   derivations.
//! - [`config`] -- Scenario loading from `fishery-scenario.yaml` into
//!   strongly-typed structs.
//! - [`schedule`] -- The [`Scheduler`], [`Steppable`] actions and the
//!   [`StepContext`] they run with.
//! - [`stoppable`] -- Cancellation handles.
//! - [`startable`] -- [`Startable`] lifecycle and its registry.
//! - [`runner`] -- Bounded run loop.
//!
//! [`Scheduler`]: schedule::Scheduler
//! [`SimulationClock`]: clock::SimulationClock
//! [`Steppable`]: schedule::Steppable
//! [`StepContext`]: schedule::StepContext
//! [`Startable`]: startable::Startable

pub(crate) mod bucket;
pub mod clock;
pub mod config;
pub mod runner;
pub mod schedule;
pub mod startable;
pub mod stoppable;

pub use clock::{ClockError, SimulationClock};
pub use config::{ConfigError, SimulationConfig};
pub use schedule::{
    ActionError, ActionId, DispatchRecord, ScheduleError, Scheduler, SchedulerState, StepContext,
    Steppable, steppable,
};
pub use startable::{Startable, StartableRegistry};
pub use stoppable::Stoppable;
