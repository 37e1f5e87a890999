//! The quota-pool table: every pool of remaining allotment in a run.
//!
//! Pools live in one arena and are referred to by [`PoolId`]. A regulation
//! never owns a pool; it holds a handle. Two regulations holding the same
//! handle share one pool, and consuming through either is immediately
//! visible through both. Whether a factory hands out a fresh handle or an
//! existing one is decided per regulation kind (see
//! [`RegulationFactory`](crate::factory::RegulationFactory)).
//!
//! # Invariants
//!
//! - `remaining` is never negative.
//! - `remaining <= yearly` after every operation.
//! - All arithmetic is checked [`Decimal`] arithmetic.

use fishery_types::{PoolId, SchemeId, SpeciesId};
use rust_decimal::Decimal;
use tracing::debug;

use crate::QuotaError;

/// One pool of quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPool {
    scheme: SchemeId,
    species: Option<SpeciesId>,
    yearly: Decimal,
    remaining: Decimal,
}

impl QuotaPool {
    /// The factory context that created this pool.
    pub const fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// The species this pool constrains; `None` for a mono-quota pool
    /// that constrains every species.
    pub const fn species(&self) -> Option<SpeciesId> {
        self.species
    }

    /// The yearly target this pool resets to.
    pub const fn yearly(&self) -> Decimal {
        self.yearly
    }

    /// Quota left this year.
    pub const fn remaining(&self) -> Decimal {
        self.remaining
    }
}

/// Arena of every quota pool in the run.
#[derive(Debug, Clone, Default)]
pub struct QuotaPoolTable {
    pools: Vec<QuotaPool>,
}

impl QuotaPoolTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self { pools: Vec::new() }
    }

    /// Create a full pool holding `yearly`.
    ///
    /// # Errors
    ///
    /// [`QuotaError::NegativeQuota`] if `yearly` is negative;
    /// [`QuotaError::Overflow`] if the table is full.
    pub fn create(
        &mut self,
        scheme: SchemeId,
        species: Option<SpeciesId>,
        yearly: Decimal,
    ) -> Result<PoolId, QuotaError> {
        if yearly < Decimal::ZERO {
            return Err(QuotaError::NegativeQuota { quota: yearly });
        }
        let index = u32::try_from(self.pools.len())
            .map_err(|_err| QuotaError::Overflow { what: "pool table" })?;
        self.pools.push(QuotaPool {
            scheme,
            species,
            yearly,
            remaining: yearly,
        });
        Ok(PoolId::new(index))
    }

    /// Look a pool up.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] for a handle this table never issued.
    pub fn get(&self, pool: PoolId) -> Result<&QuotaPool, QuotaError> {
        usize::try_from(pool.into_inner())
            .ok()
            .and_then(|i| self.pools.get(i))
            .ok_or(QuotaError::UnknownPool { pool })
    }

    fn get_mut(&mut self, pool: PoolId) -> Result<&mut QuotaPool, QuotaError> {
        usize::try_from(pool.into_inner())
            .ok()
            .and_then(|i| self.pools.get_mut(i))
            .ok_or(QuotaError::UnknownPool { pool })
    }

    /// Quota left in `pool`.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`].
    pub fn remaining(&self, pool: PoolId) -> Result<Decimal, QuotaError> {
        self.get(pool).map(QuotaPool::remaining)
    }

    /// Yearly target of `pool`.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`].
    pub fn yearly(&self, pool: PoolId) -> Result<Decimal, QuotaError> {
        self.get(pool).map(QuotaPool::yearly)
    }

    /// Take up to `amount` out of `pool`, clamping at zero. Returns the
    /// amount actually taken; non-positive amounts take nothing.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`].
    pub fn consume(&mut self, pool: PoolId, amount: Decimal) -> Result<Decimal, QuotaError> {
        let entry = self.get_mut(pool)?;
        if amount <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let taken = amount.min(entry.remaining);
        entry.remaining = entry
            .remaining
            .checked_sub(taken)
            .ok_or(QuotaError::Overflow { what: "consume" })?;
        Ok(taken)
    }

    /// Refill `pool` to its yearly target.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`].
    pub fn reset(&mut self, pool: PoolId) -> Result<(), QuotaError> {
        let entry = self.get_mut(pool)?;
        entry.remaining = entry.yearly;
        Ok(())
    }

    /// Refill every pool created by `scheme`. Returns how many were reset.
    pub fn reset_scheme(&mut self, scheme: SchemeId) -> usize {
        let mut count: usize = 0;
        for entry in self.pools.iter_mut().filter(|p| p.scheme == scheme) {
            entry.remaining = entry.yearly;
            count = count.saturating_add(1);
        }
        debug!(%scheme, pools = count, "Reset quota pools");
        count
    }

    /// Set a new yearly target and refill to it.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] or [`QuotaError::NegativeQuota`].
    pub fn rescale(&mut self, pool: PoolId, yearly: Decimal) -> Result<(), QuotaError> {
        if yearly < Decimal::ZERO {
            return Err(QuotaError::NegativeQuota { quota: yearly });
        }
        let entry = self.get_mut(pool)?;
        entry.yearly = yearly;
        entry.remaining = yearly;
        Ok(())
    }

    /// Change the yearly target without replenishing. Remaining quota is
    /// only ever lowered, to keep it within the new target.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownPool`] or [`QuotaError::NegativeQuota`].
    pub fn set_yearly_quota(&mut self, pool: PoolId, yearly: Decimal) -> Result<(), QuotaError> {
        if yearly < Decimal::ZERO {
            return Err(QuotaError::NegativeQuota { quota: yearly });
        }
        let entry = self.get_mut(pool)?;
        entry.yearly = yearly;
        entry.remaining = entry.remaining.min(yearly);
        Ok(())
    }

    /// Move `amount` of quota, both remaining and yearly target, from one
    /// pool to another.
    ///
    /// # Errors
    ///
    /// [`QuotaError::InsufficientQuota`] if `from` holds less than
    /// `amount`; [`QuotaError::UnknownPool`]; [`QuotaError::Overflow`].
    pub fn transfer(&mut self, from: PoolId, to: PoolId, amount: Decimal) -> Result<(), QuotaError> {
        if amount <= Decimal::ZERO || from == to {
            return Ok(());
        }
        let available = self.remaining(from)?;
        if available < amount {
            return Err(QuotaError::InsufficientQuota {
                pool: from,
                requested: amount,
                available,
            });
        }
        // Validate the destination before touching the source.
        let _ = self.get(to)?;

        let source = self.get_mut(from)?;
        source.remaining = source
            .remaining
            .checked_sub(amount)
            .ok_or(QuotaError::Overflow { what: "transfer" })?;
        source.yearly = source
            .yearly
            .checked_sub(amount)
            .ok_or(QuotaError::Overflow { what: "transfer" })?
            .max(source.remaining);

        let sink = self.get_mut(to)?;
        sink.remaining = sink
            .remaining
            .checked_add(amount)
            .ok_or(QuotaError::Overflow { what: "transfer" })?;
        sink.yearly = sink
            .yearly
            .checked_add(amount)
            .ok_or(QuotaError::Overflow { what: "transfer" })?;
        Ok(())
    }

    /// Iterate every pool with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &QuotaPool)> {
        self.pools
            .iter()
            .zip(0_u32..)
            .map(|(pool, index)| (PoolId::new(index), pool))
    }

    /// Number of pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const SCHEME: SchemeId = SchemeId::new(0);

    fn table_with(yearly: Decimal) -> (QuotaPoolTable, PoolId) {
        let mut table = QuotaPoolTable::new();
        let pool = table.create(SCHEME, None, yearly).unwrap();
        (table, pool)
    }

    #[test]
    fn new_pool_is_full() {
        let (table, pool) = table_with(dec!(200));
        assert_eq!(table.remaining(pool).unwrap(), dec!(200));
        assert_eq!(table.yearly(pool).unwrap(), dec!(200));
    }

    #[test]
    fn negative_quota_rejected() {
        let mut table = QuotaPoolTable::new();
        let result = table.create(SCHEME, None, dec!(-1));
        assert!(matches!(result, Err(QuotaError::NegativeQuota { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn consume_clamps_at_zero() {
        let (mut table, pool) = table_with(dec!(200));
        assert_eq!(table.consume(pool, dec!(100)).unwrap(), dec!(100));
        assert_eq!(table.consume(pool, dec!(150)).unwrap(), dec!(100));
        assert_eq!(table.remaining(pool).unwrap(), Decimal::ZERO);
        assert_eq!(table.consume(pool, dec!(1)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn non_positive_consumption_is_a_no_op() {
        let (mut table, pool) = table_with(dec!(50));
        assert_eq!(table.consume(pool, Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(table.consume(pool, dec!(-10)).unwrap(), Decimal::ZERO);
        assert_eq!(table.remaining(pool).unwrap(), dec!(50));
    }

    #[test]
    fn reset_refills_to_target() {
        let (mut table, pool) = table_with(dec!(80));
        table.consume(pool, dec!(30)).unwrap();
        table.reset(pool).unwrap();
        assert_eq!(table.remaining(pool).unwrap(), dec!(80));
    }

    #[test]
    fn reset_scheme_only_touches_its_pools() {
        let mut table = QuotaPoolTable::new();
        let a = table.create(SCHEME, None, dec!(10)).unwrap();
        let b = table.create(SchemeId::new(1), None, dec!(10)).unwrap();
        table.consume(a, dec!(10)).unwrap();
        table.consume(b, dec!(10)).unwrap();
        assert_eq!(table.reset_scheme(SCHEME), 1);
        assert_eq!(table.remaining(a).unwrap(), dec!(10));
        assert_eq!(table.remaining(b).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn set_yearly_quota_does_not_replenish() {
        let (mut table, pool) = table_with(dec!(200));
        table.consume(pool, dec!(150)).unwrap();
        table.set_yearly_quota(pool, dec!(300)).unwrap();
        assert_eq!(table.yearly(pool).unwrap(), dec!(300));
        assert_eq!(table.remaining(pool).unwrap(), dec!(50));

        table.set_yearly_quota(pool, dec!(20)).unwrap();
        assert_eq!(table.remaining(pool).unwrap(), dec!(20));
    }

    #[test]
    fn transfer_moves_remaining_and_target() {
        let mut table = QuotaPoolTable::new();
        let seller = table.create(SCHEME, None, dec!(50)).unwrap();
        let buyer = table.create(SCHEME, None, dec!(50)).unwrap();
        table.transfer(seller, buyer, dec!(10)).unwrap();
        assert_eq!(table.remaining(seller).unwrap(), dec!(40));
        assert_eq!(table.remaining(buyer).unwrap(), dec!(60));
        assert_eq!(table.yearly(seller).unwrap(), dec!(40));
        assert_eq!(table.yearly(buyer).unwrap(), dec!(60));
    }

    #[test]
    fn transfer_requires_enough_quota() {
        let mut table = QuotaPoolTable::new();
        let seller = table.create(SCHEME, None, dec!(5)).unwrap();
        let buyer = table.create(SCHEME, None, dec!(5)).unwrap();
        let result = table.transfer(seller, buyer, dec!(10));
        assert!(matches!(result, Err(QuotaError::InsufficientQuota { .. })));
        assert_eq!(table.remaining(seller).unwrap(), dec!(5));
        assert_eq!(table.remaining(buyer).unwrap(), dec!(5));
    }

    #[test]
    fn unknown_pool_is_an_error() {
        let table = QuotaPoolTable::new();
        assert!(matches!(
            table.remaining(PoolId::new(3)),
            Err(QuotaError::UnknownPool { .. })
        ));
    }
}
