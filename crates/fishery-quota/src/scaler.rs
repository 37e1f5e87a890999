//! Yearly quota maintenance.
//!
//! - [`Scaler`]: IQ/ITQ. Divides every species' aggregate yearly quota
//!   evenly across the fishers of its scheme that are live when it runs,
//!   and refills each fisher's pools to that share. Runs once at start and
//!   then on the last step of every year.
//! - [`YearlyReset`]: TAC and mono kinds. Refills every pool of its scheme
//!   to its yearly target on the last step of every year.
//!
//! Both run in [`Phase::PolicyUpdate`].

use std::collections::BTreeMap;

use fishery_core::schedule::{StepContext, steppable};
use fishery_core::{ActionError, Scheduler, Startable, Stoppable};
use fishery_types::{Phase, PoolId, SchemeId, SpeciesId};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::QuotaError;
use crate::model::QuotaModel;

/// What one scaling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOutcome {
    /// Live fishers in the scheme.
    pub fishers: usize,
    /// Pools rescaled.
    pub pools_rescaled: usize,
}

// ---------------------------------------------------------------------------
// Scaler
// ---------------------------------------------------------------------------

/// Even division of aggregate quota across the live population.
#[derive(Debug, Clone)]
pub struct Scaler {
    scheme: SchemeId,
    aggregate: BTreeMap<SpeciesId, Decimal>,
    handle: Option<Stoppable>,
}

impl Scaler {
    /// Create a scaler for `scheme` dividing `aggregate` per species.
    pub const fn new(scheme: SchemeId, aggregate: BTreeMap<SpeciesId, Decimal>) -> Self {
        Self {
            scheme,
            aggregate,
            handle: None,
        }
    }

    /// The scheme this scaler maintains.
    pub const fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Rescale now.
    ///
    /// # Errors
    ///
    /// [`QuotaError`] if a pool is unknown or the division overflows.
    pub fn rescale<M: QuotaModel>(&self, model: &mut M) -> Result<ScaleOutcome, QuotaError> {
        rescale_scheme(model, self.scheme, &self.aggregate)
    }
}

fn rescale_scheme<M: QuotaModel>(
    model: &mut M,
    scheme: SchemeId,
    aggregate: &BTreeMap<SpeciesId, Decimal>,
) -> Result<ScaleOutcome, QuotaError> {
    let mut fishers: usize = 0;
    let mut targets: Vec<(SpeciesId, PoolId)> = Vec::new();
    for fisher in model.live_fishers() {
        let Some(regulation) = model.regulation(fisher) else {
            continue;
        };
        if regulation.scheme() != Some(scheme) {
            continue;
        }
        fishers = fishers.saturating_add(1);
        for species in aggregate.keys() {
            if let Some(pool) = regulation.pool_for(*species) {
                targets.push((*species, pool));
            }
        }
    }

    if fishers == 0 {
        warn!(%scheme, "No live fishers to scale quota across; skipping");
        return Ok(ScaleOutcome {
            fishers: 0,
            pools_rescaled: 0,
        });
    }

    let divisor = Decimal::from(fishers);
    let mut shares: BTreeMap<SpeciesId, Decimal> = BTreeMap::new();
    for (species, total) in aggregate {
        let share = total
            .checked_div(divisor)
            .ok_or(QuotaError::Overflow { what: "quota share" })?;
        shares.insert(*species, share);
    }

    let pools = &mut model.quota_mut().pools;
    for (species, pool) in &targets {
        if let Some(share) = shares.get(species) {
            pools.rescale(*pool, *share)?;
        }
    }

    info!(
        %scheme,
        fishers,
        pools = targets.len(),
        "Rescaled individual quotas"
    );
    Ok(ScaleOutcome {
        fishers,
        pools_rescaled: targets.len(),
    })
}

impl<M: QuotaModel> Startable<M> for Scaler {
    fn name(&self) -> &'static str {
        "quota-scaler"
    }

    fn start(&mut self, model: &mut M, scheduler: &mut Scheduler<M>) -> Result<(), ActionError> {
        self.rescale(model)?;
        let scheme = self.scheme;
        let aggregate = self.aggregate.clone();
        let handle = scheduler.schedule_every_year(
            Phase::PolicyUpdate,
            steppable(move |model: &mut M, _: &mut StepContext<'_, M>| {
                rescale_scheme(model, scheme, &aggregate)?;
                Ok(())
            }),
        )?;
        self.handle = Some(handle);
        Ok(())
    }

    fn turn_off(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

// ---------------------------------------------------------------------------
// Yearly reset
// ---------------------------------------------------------------------------

/// Refills every pool of one scheme each year.
#[derive(Debug, Clone)]
pub struct YearlyReset {
    scheme: SchemeId,
    handle: Option<Stoppable>,
}

impl YearlyReset {
    /// Create a reset for `scheme`.
    pub const fn new(scheme: SchemeId) -> Self {
        Self {
            scheme,
            handle: None,
        }
    }
}

impl<M: QuotaModel> Startable<M> for YearlyReset {
    fn name(&self) -> &'static str {
        "quota-yearly-reset"
    }

    fn start(&mut self, _model: &mut M, scheduler: &mut Scheduler<M>) -> Result<(), ActionError> {
        let scheme = self.scheme;
        let handle = scheduler.schedule_every_year(
            Phase::PolicyUpdate,
            steppable(move |model: &mut M, ctx: &mut StepContext<'_, M>| {
                let pools = model.quota_mut().pools.reset_scheme(scheme);
                info!(%scheme, pools, year = ctx.clock().year(), "Yearly quota reset");
                Ok(())
            }),
        )?;
        self.handle = Some(handle);
        Ok(())
    }

    fn turn_off(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}
