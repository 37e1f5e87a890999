//! Start/turn-off lifecycle for components outside the scheduler core.
//!
//! Regulations' scalers, order-book markets and data collectors are all
//! [`Startable`]s: they are started once, after the population is built,
//! and turned off once at teardown. Components added after the model has
//! started are started immediately.

use tracing::debug;

use crate::schedule::{ActionError, Scheduler};

/// A component with a start/turn-off lifecycle.
pub trait Startable<S> {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Register whatever the component needs with the scheduler.
    ///
    /// # Errors
    ///
    /// Any failure is fatal to the run.
    fn start(&mut self, model: &mut S, scheduler: &mut Scheduler<S>) -> Result<(), ActionError>;

    /// Stop everything [`start`](Self::start) registered.
    fn turn_off(&mut self);
}

/// Holds startables and drives their lifecycle in registration order.
pub struct StartableRegistry<S> {
    started: Vec<Box<dyn Startable<S>>>,
    pending: Vec<Box<dyn Startable<S>>>,
    model_started: bool,
    turned_off: bool,
}

impl<S> Default for StartableRegistry<S> {
    fn default() -> Self {
        Self {
            started: Vec::new(),
            pending: Vec::new(),
            model_started: false,
            turned_off: false,
        }
    }
}

impl<S> core::fmt::Debug for StartableRegistry<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StartableRegistry")
            .field("started", &self.started.len())
            .field("pending", &self.pending.len())
            .field("model_started", &self.model_started)
            .field("turned_off", &self.turned_off)
            .finish()
    }
}

impl<S: 'static> StartableRegistry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a startable. Before [`start_all`](Self::start_all) it is queued;
    /// afterwards it is started on the spot.
    ///
    /// # Errors
    ///
    /// Propagates the startable's own start failure.
    pub fn register<T>(
        &mut self,
        startable: T,
        model: &mut S,
        scheduler: &mut Scheduler<S>,
    ) -> Result<(), ActionError>
    where
        T: Startable<S> + 'static,
    {
        let mut startable: Box<dyn Startable<S>> = Box::new(startable);
        if self.turned_off {
            debug!(name = startable.name(), "Ignoring startable added after turn-off");
            return Ok(());
        }
        if self.model_started {
            startable.start(model, scheduler)?;
            debug!(name = startable.name(), "Started late startable");
            self.started.push(startable);
        } else {
            self.pending.push(startable);
        }
        Ok(())
    }

    /// Start every queued startable in registration order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure and propagates it.
    pub fn start_all(&mut self, model: &mut S, scheduler: &mut Scheduler<S>) -> Result<(), ActionError> {
        self.model_started = true;
        for mut startable in std::mem::take(&mut self.pending) {
            startable.start(model, scheduler)?;
            debug!(name = startable.name(), "Started");
            self.started.push(startable);
        }
        Ok(())
    }

    /// Turn every started startable off, once. Later calls do nothing.
    pub fn turn_off_all(&mut self) {
        if self.turned_off {
            return;
        }
        self.turned_off = true;
        for startable in &mut self.started {
            startable.turn_off();
            debug!(name = startable.name(), "Turned off");
        }
        self.started.clear();
        self.pending.clear();
    }

    /// Whether [`start_all`](Self::start_all) has run.
    pub const fn is_model_started(&self) -> bool {
        self.model_started
    }

    /// Number of startables that have been started and not turned off.
    pub fn started_len(&self) -> usize {
        self.started.len()
    }

    /// Number of startables waiting for [`start_all`](Self::start_all).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
