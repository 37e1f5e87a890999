//! The seam between quota bookkeeping and the host model.
//!
//! Scheduled quota work (scaling, yearly resets, order-book clearing) runs
//! as scheduler actions over the host model. The host implements
//! [`QuotaModel`] so those actions can reach the pool table, the order
//! books and the live population without knowing anything else about it.

use std::collections::BTreeMap;

use fishery_core::ActionError;
use fishery_types::{FisherId, SchemeId, SpeciesId};

use crate::order_book::{OrderBook, TradeRecord};
use crate::pool::QuotaPoolTable;
use crate::regulation::Regulation;

/// Every piece of quota state in a run.
#[derive(Debug, Clone, Default)]
pub struct QuotaState {
    /// The central pool table.
    pub pools: QuotaPoolTable,
    /// Order books keyed by `(scheme, species)`.
    pub books: BTreeMap<(SchemeId, SpeciesId), OrderBook>,
}

impl QuotaState {
    /// Create empty state.
    pub const fn new() -> Self {
        Self {
            pools: QuotaPoolTable::new(),
            books: BTreeMap::new(),
        }
    }

    /// The order book for `species` under `scheme`, if a market opened one.
    pub fn book(&self, scheme: SchemeId, species: SpeciesId) -> Option<&OrderBook> {
        self.books.get(&(scheme, species))
    }

    /// Mutable access to an order book.
    pub fn book_mut(&mut self, scheme: SchemeId, species: SpeciesId) -> Option<&mut OrderBook> {
        self.books.get_mut(&(scheme, species))
    }
}

/// A model that holds quota state and a population of regulated fishers.
pub trait QuotaModel: 'static {
    /// The model's quota state.
    fn quota(&self) -> &QuotaState;

    /// Mutable access to the model's quota state.
    fn quota_mut(&mut self) -> &mut QuotaState;

    /// Fishers currently in the population, in id order.
    fn live_fishers(&self) -> Vec<FisherId>;

    /// The regulation bound to `fisher`, if the fisher is live.
    fn regulation(&self, fisher: FisherId) -> Option<&Regulation>;

    /// Called after an order-book clearing with every trade it made, so
    /// the host can settle payment between fishers.
    ///
    /// # Errors
    ///
    /// Whatever the host's settlement fails with.
    fn on_trades(&mut self, _trades: &[TradeRecord]) -> Result<(), ActionError> {
        Ok(())
    }
}
