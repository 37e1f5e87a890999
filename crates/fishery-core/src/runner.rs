//! Bounded simulation loop.
//!
//! This module provides [`run_simulation`], which drives
//! [`Scheduler::step`] until one of:
//!
//! - **Step bound**: `max_steps` steps have run
//! - **Year bound**: `max_years` year ends have been reached
//! - **Predicate**: a [`YearEndPredicate`] asks to stop at a year end
//! - **Teardown**: something tore the scheduler down mid-run
//!
//! Year ends are counted on the last step of each simulated year, after
//! every phase of that step has run.

use tracing::info;

use crate::clock::SimulationClock;
use crate::config::SimulationBoundsConfig;
use crate::schedule::{ScheduleError, Scheduler, SchedulerState};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step failed.
    #[error("step error: {source}")]
    Schedule {
        /// The underlying scheduler error.
        #[from]
        source: ScheduleError,
    },
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// `max_steps` reached.
    MaxStepsReached,
    /// `max_years` reached.
    MaxYearsReached,
    /// The year-end predicate asked to stop.
    PredicateStopped,
    /// The scheduler was torn down during the run.
    TornDown,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// The reason the run ended.
    pub end_reason: SimulationEndReason,
    /// Steps executed by this call.
    pub total_steps: u64,
    /// Year ends reached by this call.
    pub years_completed: u64,
}

/// Decides at every year end whether the run should stop.
pub trait YearEndPredicate<S> {
    /// Called on the last step of `year`, after all phases ran.
    fn should_stop(&mut self, model: &S, year: u64) -> bool;
}

impl<S, F> YearEndPredicate<S> for F
where
    F: FnMut(&S, u64) -> bool,
{
    fn should_stop(&mut self, model: &S, year: u64) -> bool {
        self(model, year)
    }
}

/// A predicate that never stops the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunToBounds;

impl<S> YearEndPredicate<S> for RunToBounds {
    fn should_stop(&mut self, _model: &S, _year: u64) -> bool {
        false
    }
}

/// Callback invoked after each step completes.
pub trait StepCallback<S> {
    /// Called after step `step` ran all of its phases.
    fn on_step(&mut self, step: u64, model: &S, clock: &SimulationClock);
}

/// A no-op step callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl<S> StepCallback<S> for NoOpCallback {
    fn on_step(&mut self, _step: u64, _model: &S, _clock: &SimulationClock) {}
}

/// Run the scheduler until a bound, the predicate or a teardown ends it.
///
/// With both bounds at zero and a predicate that never fires, this loops
/// until the scheduler is torn down.
///
/// # Errors
///
/// Returns [`RunnerError`] if a step fails.
pub fn run_simulation<S: 'static>(
    model: &mut S,
    scheduler: &mut Scheduler<S>,
    bounds: &SimulationBoundsConfig,
    predicate: &mut dyn YearEndPredicate<S>,
    callback: &mut dyn StepCallback<S>,
) -> Result<SimulationResult, RunnerError> {
    let mut total_steps: u64 = 0;
    let mut years_completed: u64 = 0;

    info!(
        max_steps = bounds.max_steps,
        max_years = bounds.max_years,
        "Simulation starting"
    );

    let end_reason = loop {
        let step = scheduler.step(model)?;
        total_steps = total_steps.saturating_add(1);
        callback.on_step(step, model, scheduler.clock());

        if scheduler.state() == SchedulerState::TornDown {
            break SimulationEndReason::TornDown;
        }

        if scheduler.clock().is_last_step_of_year() {
            years_completed = years_completed.saturating_add(1);
            let year = scheduler.clock().year();
            info!(year, step, "Year completed");
            if bounds.max_years > 0 && years_completed >= u64::from(bounds.max_years) {
                break SimulationEndReason::MaxYearsReached;
            }
            if predicate.should_stop(model, year) {
                break SimulationEndReason::PredicateStopped;
            }
        }

        if bounds.max_steps > 0 && total_steps >= bounds.max_steps {
            break SimulationEndReason::MaxStepsReached;
        }
    };

    Ok(SimulationResult {
        end_reason,
        total_steps,
        years_completed,
    })
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_steps = result.total_steps,
        years_completed = result.years_completed,
        "Simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use fishery_types::Phase;

    use super::*;
    use crate::schedule::{StepContext, steppable};

    fn make_started_scheduler() -> Scheduler<u64> {
        let clock = SimulationClock::new(1, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap();
        let mut scheduler = Scheduler::new(clock, 42);
        scheduler.start().unwrap();
        scheduler
            .schedule_every_step(
                Phase::FisherPhase,
                steppable(|count: &mut u64, _: &mut StepContext<'_, u64>| {
                    *count = count.saturating_add(1);
                    Ok(())
                }),
            )
            .unwrap();
        scheduler
    }

    fn bounds(max_years: u32, max_steps: u64) -> SimulationBoundsConfig {
        SimulationBoundsConfig {
            max_years,
            max_steps,
        }
    }

    #[test]
    fn bounded_by_max_steps() {
        let mut scheduler = make_started_scheduler();
        let mut count = 0_u64;
        let result = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(0, 5),
            &mut RunToBounds,
            &mut NoOpCallback,
        )
        .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::MaxStepsReached);
        assert_eq!(result.total_steps, 5);
        assert_eq!(count, 5);
    }

    #[test]
    fn bounded_by_max_years() {
        let mut scheduler = make_started_scheduler();
        let mut count = 0_u64;
        let result = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(2, 0),
            &mut RunToBounds,
            &mut NoOpCallback,
        )
        .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::MaxYearsReached);
        assert_eq!(result.total_steps, 730);
        assert_eq!(result.years_completed, 2);
    }

    #[test]
    fn predicate_stops_at_year_end() {
        let mut scheduler = make_started_scheduler();
        let mut count = 0_u64;
        let mut stop_after_first = |_: &u64, year: u64| year == 0;
        let result = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(10, 0),
            &mut stop_after_first,
            &mut NoOpCallback,
        )
        .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::PredicateStopped);
        assert_eq!(result.total_steps, 365);
    }

    #[test]
    fn step_callback_is_called() {
        struct CountCallback {
            count: u64,
        }
        impl StepCallback<u64> for CountCallback {
            fn on_step(&mut self, _step: u64, _model: &u64, _clock: &SimulationClock) {
                self.count = self.count.saturating_add(1);
            }
        }

        let mut scheduler = make_started_scheduler();
        let mut count = 0_u64;
        let mut cb = CountCallback { count: 0 };
        let _ = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(0, 3),
            &mut RunToBounds,
            &mut cb,
        )
        .unwrap();
        assert_eq!(cb.count, 3);
    }

    #[test]
    fn teardown_during_first_step_still_counts_it() {
        let mut scheduler = make_started_scheduler();
        scheduler
            .schedule_once(
                Phase::Dawn,
                steppable(|_: &mut u64, ctx: &mut StepContext<'_, u64>| {
                    ctx.scheduler().teardown();
                    Ok(())
                }),
            )
            .unwrap();
        let mut count = 0_u64;
        let result = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(0, 0),
            &mut RunToBounds,
            &mut NoOpCallback,
        )
        .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::TornDown);
        assert_eq!(result.total_steps, 1);
    }

    #[test]
    fn unstarted_scheduler_is_an_error() {
        let clock = SimulationClock::new(1, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).unwrap();
        let mut scheduler: Scheduler<u64> = Scheduler::new(clock, 42);
        let mut count = 0_u64;
        let result = run_simulation(
            &mut count,
            &mut scheduler,
            &bounds(1, 0),
            &mut RunToBounds,
            &mut NoOpCallback,
        );
        assert!(matches!(
            result,
            Err(RunnerError::Schedule {
                source: ScheduleError::NotStarted
            })
        ));
    }
}
