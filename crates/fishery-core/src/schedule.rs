//! Deterministic, phase-ordered action scheduler.
//!
//! The scheduler owns the [`SimulationClock`] and the only random source of
//! a run. Each call to [`Scheduler::step`] advances the clock by one step
//! and walks the phases in [`Phase::ALL`] order. Within a phase, the actions
//! due this step are collected, sorted by registration order and, for
//! randomized phases, reshuffled with the scheduler's seeded RNG. Every due
//! action runs exactly once, to completion, before the next one starts.
//!
//! # Timing
//!
//! A registration with delay `d` made while step `s` is current first fires
//! at step `s + d`; before the first step, `s` counts as `-1`. So an
//! every-step action registered at startup first fires at step 0, a
//! daily action on the last step of day 0, and a yearly action on the last
//! step of year 0.
//!
//! # Aggregate buckets
//!
//! Non-randomized phases own one daily and one yearly
//! [`AggregateBucket`](crate::bucket). Daily and yearly registrations in
//! those phases join the bucket instead of being scheduled individually, so
//! they always run in registration order. Any other cadence in a
//! non-randomized phase is dispatched individually, also in registration
//! order.
//!
//! # Cancellation
//!
//! Every scheduling call returns a [`Stoppable`]. A stopped action is
//! dropped the next time it would fire; stopping from inside the action
//! itself is supported through [`StepContext::stop_self`].

use std::collections::BTreeMap;

use fishery_types::{IntervalPolicy, Phase};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, trace};

use crate::bucket::{AggregateBucket, BucketCadence, BucketMember};
use crate::clock::{ClockError, SimulationClock};
use crate::config::SimulationConfig;
use crate::stoppable::Stoppable;

/// Length of a scheduling "month". Not calendar-accurate.
pub const DAYS_PER_MONTH: u64 = 30;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a scheduled action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The action gave up with a message.
    #[error("{message}")]
    Failed {
        /// What went wrong.
        message: String,
    },

    /// The action tried to schedule more work and the scheduler refused.
    #[error("scheduling from inside an action failed: {source}")]
    Schedule {
        /// The scheduler's error.
        source: Box<ScheduleError>,
    },

    /// Any other error bubbled up from model code.
    #[error("{source}")]
    Other {
        /// The underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ActionError {
    /// Build an [`ActionError::Failed`] from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Wrap any error from model code.
    pub fn other<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other {
            source: Box::new(source),
        }
    }
}

impl From<ScheduleError> for ActionError {
    fn from(source: ScheduleError) -> Self {
        Self::Schedule {
            source: Box::new(source),
        }
    }
}

/// Errors that can occur when registering or dispatching actions.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Actions were registered, or a step requested, before `start()`.
    #[error("scheduler has not been started")]
    NotStarted,

    /// `start()` was called a second time.
    #[error("scheduler has already been started")]
    AlreadyStarted,

    /// The scheduler was torn down and accepts no more work.
    #[error("scheduler has been torn down")]
    TornDown,

    /// A period or delay of zero was requested.
    #[error("invalid {what}: must be at least 1")]
    InvalidPeriod {
        /// Which argument was zero.
        what: &'static str,
    },

    /// The clock could not advance or a due step overflowed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An action failed; the step is aborted.
    #[error("action failed at step {step} in {phase}: {source}")]
    Action {
        /// Step being dispatched.
        step: u64,
        /// Phase being dispatched.
        phase: Phase,
        /// The action's error.
        source: ActionError,
    },
}

const fn overflow() -> ScheduleError {
    ScheduleError::Clock {
        source: ClockError::StepOverflow,
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Identifier assigned to every registration, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(u64);

impl ActionId {
    /// Create an identifier from its raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Return the raw value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

/// A behaviour the scheduler can run.
///
/// Closures with the signature
/// `FnMut(&mut S, &mut StepContext<'_, S>) -> Result<(), ActionError>`
/// implement this trait; [`steppable`] helps the compiler infer it.
pub trait Steppable<S> {
    /// Run once for the current step.
    fn step(&mut self, model: &mut S, ctx: &mut StepContext<'_, S>) -> Result<(), ActionError>;
}

impl<S, F> Steppable<S> for F
where
    F: FnMut(&mut S, &mut StepContext<'_, S>) -> Result<(), ActionError>,
{
    fn step(&mut self, model: &mut S, ctx: &mut StepContext<'_, S>) -> Result<(), ActionError> {
        self(model, ctx)
    }
}

/// Identity function that pins a closure to the [`Steppable`] signature.
pub const fn steppable<S, F>(f: F) -> F
where
    F: FnMut(&mut S, &mut StepContext<'_, S>) -> Result<(), ActionError>,
{
    f
}

/// What a running action can see and do besides mutating the model.
pub struct StepContext<'a, S> {
    scheduler: &'a mut Scheduler<S>,
    handle: Stoppable,
}

impl<S> StepContext<'_, S> {
    /// The scheduler, for registering or cancelling further work.
    pub fn scheduler(&mut self) -> &mut Scheduler<S> {
        self.scheduler
    }

    /// The simulation clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.scheduler.clock
    }

    /// The run's seeded random source.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.scheduler.rng
    }

    /// The running action's own cancellation handle.
    pub const fn handle(&self) -> &Stoppable {
        &self.handle
    }

    /// Cancel the running action after this invocation.
    pub fn stop_self(&self) {
        self.handle.stop();
    }
}

/// Fires `inner` once, on the last step of the year before `target_year`.
struct YearStart<S> {
    target_year: u64,
    inner: Box<dyn Steppable<S>>,
}

impl<S> Steppable<S> for YearStart<S> {
    fn step(&mut self, model: &mut S, ctx: &mut StepContext<'_, S>) -> Result<(), ActionError> {
        let next_year = ctx.clock().year().saturating_add(1);
        if next_year == self.target_year {
            ctx.stop_self();
            return self.inner.step(model, ctx);
        }
        if next_year > self.target_year {
            ctx.stop_self();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Lifecycle of a [`Scheduler`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created; nothing may be registered yet.
    NotStarted,
    /// Accepting registrations and stepping.
    Started,
    /// Cleared; nothing fires any more.
    TornDown,
}

/// One dispatched unit, as recorded by the optional trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Step in which the action ran.
    pub step: u64,
    /// Phase in which the action ran.
    pub phase: Phase,
    /// Which action ran.
    pub action: ActionId,
}

#[derive(Debug, Clone, Copy)]
enum Cadence {
    Once,
    Every(u64),
}

enum Slot<S> {
    Ready(Box<dyn Steppable<S>>),
    /// The action is executing; its box lives on the dispatch stack.
    Running,
    Bucket(BucketCadence),
}

struct Entry<S> {
    phase: Phase,
    cadence: Cadence,
    slot: Slot<S>,
    handle: Stoppable,
}

/// Phase-ordered, single-threaded dispatcher of time-driven behaviour.
pub struct Scheduler<S> {
    clock: SimulationClock,
    state: SchedulerState,
    rng: StdRng,
    next_id: u64,
    entries: BTreeMap<ActionId, Entry<S>>,
    agenda: BTreeMap<(u64, Phase), Vec<ActionId>>,
    buckets: BTreeMap<(BucketCadence, Phase), AggregateBucket<S>>,
    trace: Option<Vec<DispatchRecord>>,
}

impl<S> core::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.clock)
            .field("state", &self.state)
            .field("entries", &self.entries.len())
            .field("buckets", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl<S: 'static> Scheduler<S> {
    /// Create a scheduler around a fresh clock, seeding its RNG.
    pub fn new(clock: SimulationClock, seed: u64) -> Self {
        Self {
            clock,
            state: SchedulerState::NotStarted,
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
            entries: BTreeMap::new(),
            agenda: BTreeMap::new(),
            buckets: BTreeMap::new(),
            trace: None,
        }
    }

    /// Create a scheduler from the scenario's time section and seed.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Clock`] if the time section is invalid.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ScheduleError> {
        let clock = SimulationClock::from_config(&config.time)?;
        Ok(Self::new(clock, config.world.seed))
    }

    /// Transition from not-started to started and register the aggregate
    /// buckets of every non-randomized phase.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::AlreadyStarted`] on a second call and
    /// [`ScheduleError::TornDown`] after teardown.
    pub fn start(&mut self) -> Result<(), ScheduleError> {
        match self.state {
            SchedulerState::Started => return Err(ScheduleError::AlreadyStarted),
            SchedulerState::TornDown => return Err(ScheduleError::TornDown),
            SchedulerState::NotStarted => {}
        }
        self.state = SchedulerState::Started;

        let per_day = u64::from(self.clock.steps_per_day());
        let per_year = self.clock.steps_per_year();
        for phase in Phase::ALL.into_iter().filter(|p| !p.is_randomized()) {
            for (cadence, period) in [
                (BucketCadence::Daily, per_day),
                (BucketCadence::Yearly, per_year),
            ] {
                self.buckets.insert((cadence, phase), AggregateBucket::new());
                self.insert_entry(phase, Cadence::Every(period), period, Slot::Bucket(cadence))?;
            }
        }

        info!(
            steps_per_day = per_day,
            buckets = self.buckets.len(),
            "Scheduler started"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Fire `action` every `period` steps.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::NotStarted`] / [`ScheduleError::TornDown`] outside
    /// the started state, [`ScheduleError::InvalidPeriod`] for period 0.
    pub fn schedule_repeating<A>(
        &mut self,
        phase: Phase,
        period: u64,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        self.repeating_boxed(phase, period, Box::new(action))
    }

    /// Fire `action` every step.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_every_step<A>(&mut self, phase: Phase, action: A) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        self.schedule_repeating(phase, 1, action)
    }

    /// Fire `action` every day.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_every_day<A>(&mut self, phase: Phase, action: A) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        let period = u64::from(self.clock.steps_per_day());
        self.schedule_repeating(phase, period, action)
    }

    /// Fire `action` every `days` days.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_every_x_days<A>(
        &mut self,
        phase: Phase,
        days: u64,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        let period = self.days_to_steps(days)?;
        self.schedule_repeating(phase, period, action)
    }

    /// Fire `action` every simulated year.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_every_year<A>(&mut self, phase: Phase, action: A) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        let period = self.clock.steps_per_year();
        self.schedule_repeating(phase, period, action)
    }

    /// Fire `action` at the cadence named by `policy`.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_per_policy<A>(
        &mut self,
        phase: Phase,
        policy: IntervalPolicy,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        match policy {
            IntervalPolicy::EveryStep => self.schedule_every_step(phase, action),
            IntervalPolicy::EveryDay => self.schedule_every_day(phase, action),
            IntervalPolicy::EveryMonth => self.schedule_every_x_days(phase, DAYS_PER_MONTH, action),
            IntervalPolicy::EveryYear => self.schedule_every_year(phase, action),
        }
    }

    /// Fire `action` once, on the next step.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::NotStarted`] / [`ScheduleError::TornDown`] outside
    /// the started state.
    pub fn schedule_once<A>(&mut self, phase: Phase, action: A) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        self.schedule_once_in_steps(phase, 1, action)
    }

    /// Fire `action` once, `steps` steps from now.
    ///
    /// # Errors
    ///
    /// As [`schedule_once`](Self::schedule_once), plus
    /// [`ScheduleError::InvalidPeriod`] for a delay of 0.
    pub fn schedule_once_in_steps<A>(
        &mut self,
        phase: Phase,
        steps: u64,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        self.ensure_started()?;
        if steps == 0 {
            return Err(ScheduleError::InvalidPeriod { what: "delay" });
        }
        self.insert_entry(phase, Cadence::Once, steps, Slot::Ready(Box::new(action)))
    }

    /// Fire `action` once, `days` days from now.
    ///
    /// # Errors
    ///
    /// See [`schedule_once_in_steps`](Self::schedule_once_in_steps).
    pub fn schedule_once_in_x_days<A>(
        &mut self,
        phase: Phase,
        days: u64,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        let steps = self.days_to_steps(days)?;
        self.schedule_once_in_steps(phase, steps, action)
    }

    /// Fire `action` exactly once, when `year + 1 == target_year`.
    ///
    /// The check runs on the last step of every year, whenever it is
    /// registered, so the action fires on the last step of the year
    /// *before* `target_year`. If that moment has already passed the action
    /// never fires.
    ///
    /// # Errors
    ///
    /// See [`schedule_repeating`](Self::schedule_repeating).
    pub fn schedule_once_at_beginning_of_year<A>(
        &mut self,
        phase: Phase,
        target_year: u64,
        action: A,
    ) -> Result<Stoppable, ScheduleError>
    where
        A: Steppable<S> + 'static,
    {
        let wrapper: Box<dyn Steppable<S>> = Box::new(YearStart {
            target_year,
            inner: Box::new(action),
        });
        let period = self.clock.steps_per_year();
        if !phase.is_randomized() {
            // The yearly bucket is already anchored to the year's end.
            return self.repeating_boxed(phase, period, wrapper);
        }
        self.ensure_started()?;
        let delay = self.steps_until_year_end()?;
        self.insert_entry(phase, Cadence::Every(period), delay, Slot::Ready(wrapper))
    }

    /// Delay from the next step to the last step of its year, counting both.
    fn steps_until_year_end(&self) -> Result<u64, ScheduleError> {
        let per_year = self.clock.steps_per_year();
        let into_year = self
            .clock
            .next_step()?
            .checked_rem(per_year)
            .ok_or(ScheduleError::InvalidPeriod { what: "period" })?;
        per_year.checked_sub(into_year).ok_or_else(overflow)
    }

    fn repeating_boxed(
        &mut self,
        phase: Phase,
        period: u64,
        action: Box<dyn Steppable<S>>,
    ) -> Result<Stoppable, ScheduleError> {
        self.ensure_started()?;
        if period == 0 {
            return Err(ScheduleError::InvalidPeriod { what: "period" });
        }
        if !phase.is_randomized() {
            let bucket = if period == u64::from(self.clock.steps_per_day()) {
                Some(BucketCadence::Daily)
            } else if period == self.clock.steps_per_year() {
                Some(BucketCadence::Yearly)
            } else {
                None
            };
            if let Some(cadence) = bucket {
                return Ok(self.join_bucket(cadence, phase, action));
            }
        }
        self.insert_entry(phase, Cadence::Every(period), period, Slot::Ready(action))
    }

    fn join_bucket(
        &mut self,
        cadence: BucketCadence,
        phase: Phase,
        action: Box<dyn Steppable<S>>,
    ) -> Stoppable {
        let id = self.allocate_id();
        let handle = Stoppable::new();
        self.buckets
            .entry((cadence, phase))
            .or_insert_with(AggregateBucket::new)
            .push(BucketMember {
                id,
                action,
                handle: handle.clone(),
            });
        debug!(action = id.0, %phase, ?cadence, "Joined aggregate bucket");
        handle
    }

    fn insert_entry(
        &mut self,
        phase: Phase,
        cadence: Cadence,
        delay: u64,
        slot: Slot<S>,
    ) -> Result<Stoppable, ScheduleError> {
        let offset = delay
            .checked_sub(1)
            .ok_or(ScheduleError::InvalidPeriod { what: "delay" })?;
        let due = self
            .clock
            .next_step()?
            .checked_add(offset)
            .ok_or_else(overflow)?;

        let id = self.allocate_id();
        let handle = Stoppable::new();
        self.entries.insert(
            id,
            Entry {
                phase,
                cadence,
                slot,
                handle: handle.clone(),
            },
        );
        self.agenda.entry((due, phase)).or_default().push(id);
        trace!(action = id.0, %phase, due, "Registered action");
        Ok(handle)
    }

    fn allocate_id(&mut self) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn days_to_steps(&self, days: u64) -> Result<u64, ScheduleError> {
        if days == 0 {
            return Err(ScheduleError::InvalidPeriod { what: "days" });
        }
        days.checked_mul(u64::from(self.clock.steps_per_day()))
            .ok_or_else(overflow)
    }

    const fn ensure_started(&self) -> Result<(), ScheduleError> {
        match self.state {
            SchedulerState::NotStarted => Err(ScheduleError::NotStarted),
            SchedulerState::Started => Ok(()),
            SchedulerState::TornDown => Err(ScheduleError::TornDown),
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Advance the clock one step and run every due action, phase by phase.
    ///
    /// Returns the step that was run.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::NotStarted`] / [`ScheduleError::TornDown`] outside
    /// the started state; [`ScheduleError::Action`] if an action fails, in
    /// which case the rest of the step is abandoned.
    pub fn step(&mut self, model: &mut S) -> Result<u64, ScheduleError> {
        self.ensure_started()?;
        let step = self.clock.advance()?;
        trace!(step, "Step begins");

        for phase in Phase::ALL {
            if self.state != SchedulerState::Started {
                break;
            }
            let Some(mut due) = self.agenda.remove(&(step, phase)) else {
                continue;
            };
            due.sort_unstable();
            if phase.is_randomized() {
                due.shuffle(&mut self.rng);
            }
            for id in due {
                self.dispatch(model, step, phase, id)?;
            }
        }
        Ok(step)
    }

    fn dispatch(
        &mut self,
        model: &mut S,
        step: u64,
        phase: Phase,
        id: ActionId,
    ) -> Result<(), ScheduleError> {
        if self.state != SchedulerState::Started {
            return Ok(());
        }
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(());
        };
        if entry.handle.is_stopped() {
            self.entries.remove(&id);
            return Ok(());
        }
        let slot = std::mem::replace(&mut entry.slot, Slot::Running);
        let handle = entry.handle.clone();
        let cadence = entry.cadence;

        let slot = match slot {
            Slot::Ready(mut action) => {
                self.record(step, phase, id);
                let mut ctx = StepContext {
                    scheduler: &mut *self,
                    handle: handle.clone(),
                };
                action
                    .step(model, &mut ctx)
                    .map_err(|source| ScheduleError::Action {
                        step,
                        phase,
                        source,
                    })?;
                Slot::Ready(action)
            }
            Slot::Bucket(bucket) => {
                self.run_bucket(model, step, phase, bucket)?;
                Slot::Bucket(bucket)
            }
            Slot::Running => return Ok(()),
        };
        self.reschedule(id, step, phase, cadence, slot, &handle)
    }

    fn run_bucket(
        &mut self,
        model: &mut S,
        step: u64,
        phase: Phase,
        cadence: BucketCadence,
    ) -> Result<(), ScheduleError> {
        let Some(bucket) = self.buckets.get_mut(&(cadence, phase)) else {
            return Ok(());
        };
        let mut pending = bucket.take().into_iter();
        let mut survivors = Vec::with_capacity(pending.len());

        for mut member in pending.by_ref() {
            if member.handle.is_stopped() {
                continue;
            }
            self.record(step, phase, member.id);
            let mut ctx = StepContext {
                scheduler: &mut *self,
                handle: member.handle.clone(),
            };
            member
                .action
                .step(model, &mut ctx)
                .map_err(|source| ScheduleError::Action {
                    step,
                    phase,
                    source,
                })?;
            if !member.handle.is_stopped() {
                survivors.push(member);
            }
            if self.state != SchedulerState::Started {
                break;
            }
        }

        match self.buckets.get_mut(&(cadence, phase)) {
            Some(bucket) if self.state == SchedulerState::Started => bucket.restore(survivors),
            _ => {
                for member in survivors.into_iter().chain(pending) {
                    member.handle.stop();
                }
            }
        }
        Ok(())
    }

    fn reschedule(
        &mut self,
        id: ActionId,
        step: u64,
        phase: Phase,
        cadence: Cadence,
        slot: Slot<S>,
        handle: &Stoppable,
    ) -> Result<(), ScheduleError> {
        let period = match cadence {
            Cadence::Every(period)
                if self.state == SchedulerState::Started && !handle.is_stopped() =>
            {
                period
            }
            _ => {
                self.entries.remove(&id);
                return Ok(());
            }
        };
        let due = step.checked_add(period).ok_or_else(overflow)?;
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.slot = slot;
            self.agenda.entry((due, entry.phase)).or_default().push(id);
        }
        Ok(())
    }

    fn record(&mut self, step: u64, phase: Phase, action: ActionId) {
        trace!(step, %phase, action = action.0, "Dispatch");
        if let Some(records) = self.trace.as_mut() {
            records.push(DispatchRecord {
                step,
                phase,
                action,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop every outstanding handle, clear every bucket and refuse all
    /// further work. Nothing pending fires. Idempotent, and valid from any
    /// state, including from inside a running action.
    pub fn teardown(&mut self) {
        if self.state == SchedulerState::TornDown {
            return;
        }
        for entry in self.entries.values() {
            entry.handle.stop();
        }
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        self.entries.clear();
        self.agenda.clear();
        self.buckets.clear();
        self.state = SchedulerState::TornDown;
        info!(step = ?self.clock.step(), "Scheduler torn down");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The simulation clock.
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Whether `start()` has run and teardown has not.
    pub fn is_started(&self) -> bool {
        self.state == SchedulerState::Started
    }

    /// The run's seeded random source.
    pub const fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Current step (0 before the first step).
    pub const fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Days elapsed.
    pub fn day(&self) -> u64 {
        self.clock.day()
    }

    /// Whole years elapsed.
    pub fn year(&self) -> u64 {
        self.clock.year()
    }

    /// Day within the current year, 1 to 365.
    pub fn day_of_year(&self) -> u64 {
        self.clock.day_of_year()
    }

    /// Hour of the day at the current step.
    pub fn hour(&self) -> f64 {
        self.clock.hour()
    }

    /// Number of registered actions that have not been stopped, counting
    /// bucket members individually and buckets themselves not at all.
    pub fn live_actions(&self) -> usize {
        let individual = self
            .entries
            .values()
            .filter(|e| matches!(e.slot, Slot::Ready(_) | Slot::Running))
            .filter(|e| !e.handle.is_stopped())
            .count();
        let bucketed: usize = self.buckets.values().map(AggregateBucket::live_len).sum();
        individual.saturating_add(bucketed)
    }

    /// Start recording every dispatched action.
    pub fn enable_trace(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(Vec::new());
        }
    }

    /// Dispatch records collected so far (empty unless tracing).
    pub fn trace(&self) -> &[DispatchRecord] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Take the collected dispatch records, leaving tracing enabled.
    pub fn take_trace(&mut self) -> Vec<DispatchRecord> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }
}
