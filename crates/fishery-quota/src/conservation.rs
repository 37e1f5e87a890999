//! Conservation check for quota trading.
//!
//! Trades move quota between pools; they never create or destroy it. For
//! every (scheme, species) an order book clears, the check is:
//!
//! ```text
//! sum(yearly) before == sum(yearly) after
//! sum(remaining) before == sum(remaining) after
//! ```
//!
//! A violation produces a [`QuotaAnomaly`] and the clearing fails with
//! [`QuotaError::ConservationViolated`](crate::QuotaError::ConservationViolated).

use std::collections::BTreeMap;

use fishery_types::{SchemeId, SpeciesId};
use rust_decimal::Decimal;

use crate::QuotaAnomaly;
use crate::pool::QuotaPoolTable;

/// Per-species quota totals for one scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaTotals {
    /// `species -> (sum of yearly targets, sum of remaining)`.
    pub by_species: BTreeMap<SpeciesId, (Decimal, Decimal)>,
}

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Totals match.
    Balanced,
    /// One or more species changed total.
    Anomaly(QuotaAnomaly),
}

/// Sum the yearly and remaining quota of every per-species pool in
/// `scheme`. Mono-quota pools have no species and are skipped.
///
/// Returns `None` if a sum overflows.
pub fn totals(pools: &QuotaPoolTable, scheme: SchemeId) -> Option<QuotaTotals> {
    let mut by_species: BTreeMap<SpeciesId, (Decimal, Decimal)> = BTreeMap::new();
    for (_, pool) in pools.iter() {
        if pool.scheme() != scheme {
            continue;
        }
        let Some(species) = pool.species() else {
            continue;
        };
        let (yearly, remaining) = by_species
            .entry(species)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        *yearly = yearly.checked_add(pool.yearly())?;
        *remaining = remaining.checked_add(pool.remaining())?;
    }
    Some(QuotaTotals { by_species })
}

/// Compare totals taken before and after a clearing.
pub fn verify_conservation(
    step: u64,
    scheme: SchemeId,
    before: &QuotaTotals,
    after: &QuotaTotals,
) -> ConservationResult {
    let mut imbalances: BTreeMap<SpeciesId, ((Decimal, Decimal), (Decimal, Decimal))> =
        BTreeMap::new();

    let zero = (Decimal::ZERO, Decimal::ZERO);
    for species in before.by_species.keys().chain(after.by_species.keys()) {
        let was = before.by_species.get(species).copied().unwrap_or(zero);
        let now = after.by_species.get(species).copied().unwrap_or(zero);
        if was != now {
            imbalances.insert(*species, (was, now));
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let count = imbalances.len();
        ConservationResult::Anomaly(QuotaAnomaly {
            step,
            scheme,
            imbalances,
            message: format!(
                "QUOTA_ANOMALY at step {step}: quota not conserved for {count} species in scheme {scheme}",
            ),
        })
    }
}
