//! Transferable-quota order books.
//!
//! One [`OrderBook`] per (scheme, species). Fishers post [`TradeIntent`]s:
//! offers to sell quota, requests to buy it. A clearing matches them one
//! lot at a time, price first and then time. Every match moves exactly
//! one lot of quota, both remaining and yearly target, from the seller's
//! pool to the buyer's pool. Intents that cannot clear stay on the book.
//!
//! # Matching rules
//!
//! - Only whole lots clear. An intent for less than one lot rests
//!   untouched until withdrawn.
//! - The seller's pool must hold at least one lot at match time.
//! - A fisher never trades with itself.
//! - Unless multiple trades are allowed, a fisher trades at most once per
//!   clearing and holds at most one intent per book.
//! - Both sides priced: the offer must not exceed the request. An unpriced
//!   side accepts any price.
//!
//! # Conservation
//!
//! Per-species totals of yearly and remaining quota are taken before and
//! after every clearing. Any difference fails the clearing with
//! [`QuotaError::ConservationViolated`].

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use fishery_core::{ActionError, Scheduler, StepContext, Startable, Stoppable, steppable};
use fishery_types::{FisherId, IntentId, Phase, PoolId, PricingPolicy, SchemeId, SpeciesId, TradeSide};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error};

use crate::QuotaError;
use crate::conservation::{self, ConservationResult};
use crate::model::{QuotaModel, QuotaState};
use crate::pool::QuotaPoolTable;
use crate::regulation::Regulation;

// ---------------------------------------------------------------------------
// Intents and outcomes
// ---------------------------------------------------------------------------

/// Settings of one order book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookConfig {
    /// Quantity moved by one match.
    pub lot: Decimal,
    /// Whether a fisher may trade more than once per clearing.
    pub allow_multiple_trades: bool,
    /// How the price of a match is set.
    pub pricing: PricingPolicy,
    /// Clearings a buyer must sit out before offering again.
    pub penalty_days: u32,
    /// First simulated year in which the book clears.
    pub implementation_year: u64,
}

impl OrderBookConfig {
    /// Defaults around a lot size.
    pub const fn with_lot(lot: Decimal) -> Self {
        Self {
            lot,
            allow_multiple_trades: false,
            pricing: PricingPolicy::Midpoint,
            penalty_days: 0,
            implementation_year: 0,
        }
    }
}

/// A fisher's wish to buy or sell quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    /// Who is trading.
    pub fisher: FisherId,
    /// Which species' quota.
    pub species: SpeciesId,
    /// Buy or sell.
    pub side: TradeSide,
    /// Total quantity wanted; cleared in lots.
    pub quantity: Decimal,
    /// Worst acceptable price per unit, if any.
    pub limit_price: Option<Decimal>,
}

/// Why an intent was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Quantity of zero or less.
    NonPositiveQuantity,
    /// The fisher already has an intent on this book.
    DuplicateIntent,
    /// The fisher bought recently and may not offer yet.
    InPenaltyBox,
    /// The fisher's regulation has no tradable pool for this book.
    Unconstrained,
    /// The intent names another species.
    WrongSpecies,
}

/// Result of submitting an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Resting on the book.
    Accepted(IntentId),
    /// Not placed.
    Rejected(RejectReason),
}

impl SubmitOutcome {
    /// Whether the intent was placed.
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// One cleared lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    /// Step of the clearing.
    pub step: u64,
    /// Species traded.
    pub species: SpeciesId,
    /// Fisher that gave up quota.
    pub seller: FisherId,
    /// Fisher that received quota.
    pub buyer: FisherId,
    /// Quota moved (one lot).
    pub quantity: Decimal,
    /// Price per unit of quota.
    pub price: Decimal,
    /// `price * quantity`, owed by buyer to seller.
    pub value: Decimal,
}

/// Counters for the most recent clearing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCounters {
    /// Matches made.
    pub matches: u32,
    /// Quota moved.
    pub quota_volume: Decimal,
    /// Money moved.
    pub money_volume: Decimal,
}

impl DailyCounters {
    /// Average price per unit, if anything traded.
    pub fn average_price(&self) -> Option<Decimal> {
        if self.quota_volume <= Decimal::ZERO {
            return None;
        }
        self.money_volume.checked_div(self.quota_volume)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resting {
    id: IntentId,
    fisher: FisherId,
    pool: PoolId,
    quantity: Decimal,
    limit_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// Outstanding intents for one species' quota.
#[derive(Debug, Clone)]
pub struct OrderBook {
    scheme: SchemeId,
    species: SpeciesId,
    config: OrderBookConfig,
    offers: Vec<Resting>,
    requests: Vec<Resting>,
    next_intent: u64,
    penalty: BTreeMap<FisherId, u32>,
    counters: DailyCounters,
    last_closing_price: Option<Decimal>,
}

impl OrderBook {
    /// Create an empty book.
    pub const fn new(scheme: SchemeId, species: SpeciesId, config: OrderBookConfig) -> Self {
        Self {
            scheme,
            species,
            config,
            offers: Vec::new(),
            requests: Vec::new(),
            next_intent: 0,
            penalty: BTreeMap::new(),
            counters: DailyCounters {
                matches: 0,
                quota_volume: Decimal::ZERO,
                money_volume: Decimal::ZERO,
            },
            last_closing_price: None,
        }
    }

    /// Species traded on this book.
    pub const fn species(&self) -> SpeciesId {
        self.species
    }

    /// Scheme whose pools this book moves quota between.
    pub const fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Book settings.
    pub const fn config(&self) -> &OrderBookConfig {
        &self.config
    }

    /// Counters of the most recent clearing.
    pub const fn counters(&self) -> &DailyCounters {
        &self.counters
    }

    /// Price of the last match ever made on this book.
    pub const fn last_closing_price(&self) -> Option<Decimal> {
        self.last_closing_price
    }

    /// Number of resting offers.
    pub fn offers_len(&self) -> usize {
        self.offers.len()
    }

    /// Number of resting requests.
    pub fn requests_len(&self) -> usize {
        self.requests.len()
    }

    /// Whether `fisher` has anything resting on either side.
    pub fn has_intent(&self, fisher: FisherId) -> bool {
        self.offers
            .iter()
            .chain(&self.requests)
            .any(|r| r.fisher == fisher)
    }

    /// Whether `fisher` is barred from offering.
    pub fn in_penalty_box(&self, fisher: FisherId) -> bool {
        self.penalty.contains_key(&fisher)
    }

    /// Place an intent on the book.
    ///
    /// Every refusal is an ordinary outcome, not an error.
    pub fn submit(&mut self, intent: &TradeIntent, regulation: &Regulation) -> SubmitOutcome {
        if intent.species != self.species {
            return SubmitOutcome::Rejected(RejectReason::WrongSpecies);
        }
        let pool = match regulation.pool_for(self.species) {
            Some(pool) if regulation.scheme() == Some(self.scheme) => pool,
            _ => return SubmitOutcome::Rejected(RejectReason::Unconstrained),
        };
        if intent.quantity <= Decimal::ZERO {
            return SubmitOutcome::Rejected(RejectReason::NonPositiveQuantity);
        }
        if !self.config.allow_multiple_trades && self.has_intent(intent.fisher) {
            return SubmitOutcome::Rejected(RejectReason::DuplicateIntent);
        }
        if intent.side == TradeSide::Offer && self.in_penalty_box(intent.fisher) {
            return SubmitOutcome::Rejected(RejectReason::InPenaltyBox);
        }

        let id = IntentId::new(self.next_intent);
        self.next_intent = self.next_intent.saturating_add(1);
        let resting = Resting {
            id,
            fisher: intent.fisher,
            pool,
            quantity: intent.quantity,
            limit_price: intent.limit_price,
        };
        match intent.side {
            TradeSide::Offer => self.offers.push(resting),
            TradeSide::Request => self.requests.push(resting),
        }
        SubmitOutcome::Accepted(id)
    }

    /// Remove every intent `fisher` has on the book. Returns how many.
    pub fn withdraw(&mut self, fisher: FisherId) -> usize {
        let before = self.offers.len().saturating_add(self.requests.len());
        self.offers.retain(|r| r.fisher != fisher);
        self.requests.retain(|r| r.fisher != fisher);
        before.saturating_sub(self.offers.len().saturating_add(self.requests.len()))
    }

    /// Remove one intent by id.
    pub fn withdraw_intent(&mut self, id: IntentId) -> bool {
        let before = self.offers.len().saturating_add(self.requests.len());
        self.offers.retain(|r| r.id != id);
        self.requests.retain(|r| r.id != id);
        before != self.offers.len().saturating_add(self.requests.len())
    }

    /// Match as many lots as the rules allow.
    ///
    /// # Errors
    ///
    /// [`QuotaError::ConservationViolated`] if totals move;
    /// [`QuotaError`] from the pool table or checked arithmetic.
    pub fn clear(
        &mut self,
        pools: &mut QuotaPoolTable,
        step: u64,
        year: u64,
    ) -> Result<Vec<TradeRecord>, QuotaError> {
        self.counters = DailyCounters::default();
        if year < self.config.implementation_year {
            return Ok(Vec::new());
        }
        self.penalty.retain(|_, days| {
            *days = days.saturating_sub(1);
            *days > 0
        });

        let before = conservation::totals(pools, self.scheme)
            .ok_or(QuotaError::Overflow { what: "quota totals" })?;

        self.offers.sort_by(|a, b| offer_priority(a).cmp(&offer_priority(b)));
        self.requests
            .sort_by(|a, b| request_priority(a).cmp(&request_priority(b)));

        let mut trades = Vec::new();
        let mut traded: BTreeSet<FisherId> = BTreeSet::new();
        while let Some((ri, oi)) = self.find_match(pools, &traded)? {
            let trade = self.execute(pools, step, ri, oi)?;
            if !self.config.allow_multiple_trades {
                traded.insert(trade.seller);
                traded.insert(trade.buyer);
            }
            if self.config.penalty_days > 0 {
                self.penalty.insert(trade.buyer, self.config.penalty_days);
            }
            debug!(
                species = %self.species,
                seller = %trade.seller,
                buyer = %trade.buyer,
                price = %trade.price,
                "Quota lot traded"
            );
            trades.push(trade);
        }

        let after = conservation::totals(pools, self.scheme)
            .ok_or(QuotaError::Overflow { what: "quota totals" })?;
        if let ConservationResult::Anomaly(anomaly) =
            conservation::verify_conservation(step, self.scheme, &before, &after)
        {
            error!(
                step,
                scheme = %self.scheme,
                species = %self.species,
                "{anomaly}"
            );
            return Err(QuotaError::ConservationViolated(Box::new(anomaly)));
        }

        debug!(
            step,
            species = %self.species,
            matches = self.counters.matches,
            volume = %self.counters.quota_volume,
            offers = self.offers.len(),
            requests = self.requests.len(),
            "Order book cleared"
        );
        Ok(trades)
    }

    fn find_match(
        &self,
        pools: &QuotaPoolTable,
        traded: &BTreeSet<FisherId>,
    ) -> Result<Option<(usize, usize)>, QuotaError> {
        let lot = self.config.lot;
        for (ri, request) in self.requests.iter().enumerate() {
            if request.quantity < lot || traded.contains(&request.fisher) {
                continue;
            }
            for (oi, offer) in self.offers.iter().enumerate() {
                if offer.quantity < lot
                    || offer.fisher == request.fisher
                    || traded.contains(&offer.fisher)
                    || !prices_cross(offer.limit_price, request.limit_price)
                {
                    continue;
                }
                if pools.remaining(offer.pool)? < lot {
                    continue;
                }
                return Ok(Some((ri, oi)));
            }
        }
        Ok(None)
    }

    fn execute(
        &mut self,
        pools: &mut QuotaPoolTable,
        step: u64,
        ri: usize,
        oi: usize,
    ) -> Result<TradeRecord, QuotaError> {
        let lot = self.config.lot;
        let lost = || QuotaError::Overflow { what: "order book index" };
        let request = self.requests.get(ri).cloned().ok_or_else(lost)?;
        let offer = self.offers.get(oi).cloned().ok_or_else(lost)?;

        let price = trade_price(
            self.config.pricing,
            offer.limit_price,
            request.limit_price,
            self.last_closing_price,
        );
        let value = price
            .checked_mul(lot)
            .ok_or(QuotaError::Overflow { what: "trade value" })?;
        pools.transfer(offer.pool, request.pool, lot)?;

        if let Some(r) = self.requests.get_mut(ri) {
            r.quantity = r.quantity.checked_sub(lot).unwrap_or(Decimal::ZERO);
        }
        if let Some(o) = self.offers.get_mut(oi) {
            o.quantity = o.quantity.checked_sub(lot).unwrap_or(Decimal::ZERO);
        }
        self.requests.retain(|r| r.quantity > Decimal::ZERO);
        self.offers.retain(|o| o.quantity > Decimal::ZERO);

        self.counters.matches = self.counters.matches.saturating_add(1);
        self.counters.quota_volume = self
            .counters
            .quota_volume
            .checked_add(lot)
            .ok_or(QuotaError::Overflow { what: "daily volume" })?;
        self.counters.money_volume = self
            .counters
            .money_volume
            .checked_add(value)
            .ok_or(QuotaError::Overflow { what: "daily volume" })?;
        self.last_closing_price = Some(price);

        Ok(TradeRecord {
            step,
            species: self.species,
            seller: offer.fisher,
            buyer: request.fisher,
            quantity: lot,
            price,
            value,
        })
    }
}

/// Cheapest first; unpriced offers rank ahead of priced ones.
fn offer_priority(r: &Resting) -> (bool, Option<Decimal>, IntentId) {
    (r.limit_price.is_some(), r.limit_price, r.id)
}

/// Highest first; unpriced requests rank ahead of priced ones.
fn request_priority(r: &Resting) -> (bool, Option<Reverse<Decimal>>, IntentId) {
    (r.limit_price.is_some(), r.limit_price.map(Reverse), r.id)
}

fn prices_cross(offer: Option<Decimal>, request: Option<Decimal>) -> bool {
    match (offer, request) {
        (Some(ask), Some(bid)) => ask <= bid,
        _ => true,
    }
}

fn trade_price(
    policy: PricingPolicy,
    offer: Option<Decimal>,
    request: Option<Decimal>,
    last: Option<Decimal>,
) -> Decimal {
    match (offer, request) {
        (Some(ask), Some(bid)) => match policy {
            PricingPolicy::Midpoint => ask
                .checked_add(bid)
                .and_then(|sum| sum.checked_div(Decimal::TWO))
                .unwrap_or(ask),
            PricingPolicy::Ask => ask,
            PricingPolicy::Bid => bid,
        },
        (Some(price), None) | (None, Some(price)) => price,
        (None, None) => last.unwrap_or(Decimal::ZERO),
    }
}

/// Clear every book of `scheme`, in species order.
///
/// # Errors
///
/// The first clearing failure.
pub fn clear_scheme(
    state: &mut QuotaState,
    scheme: SchemeId,
    step: u64,
    year: u64,
) -> Result<Vec<TradeRecord>, QuotaError> {
    let QuotaState { pools, books } = state;
    let mut trades = Vec::new();
    for ((book_scheme, _), book) in books.iter_mut() {
        if *book_scheme == scheme {
            trades.extend(book.clear(pools, step, year)?);
        }
    }
    Ok(trades)
}

// ---------------------------------------------------------------------------
// Market startable
// ---------------------------------------------------------------------------

/// Opens one order book per tradable species and clears them daily in
/// [`Phase::PolicyUpdate`].
#[derive(Debug, Clone)]
pub struct ItqMarket {
    scheme: SchemeId,
    books: BTreeMap<SpeciesId, OrderBookConfig>,
    handle: Option<Stoppable>,
}

impl ItqMarket {
    /// Create a market for `scheme` with one book per entry in `books`.
    pub const fn new(scheme: SchemeId, books: BTreeMap<SpeciesId, OrderBookConfig>) -> Self {
        Self {
            scheme,
            books,
            handle: None,
        }
    }

    /// Species with a book.
    pub fn species(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.books.keys().copied()
    }
}

impl<M: QuotaModel> Startable<M> for ItqMarket {
    fn name(&self) -> &'static str {
        "itq-market"
    }

    fn start(&mut self, model: &mut M, scheduler: &mut Scheduler<M>) -> Result<(), ActionError> {
        let scheme = self.scheme;
        let state = model.quota_mut();
        for (species, config) in &self.books {
            state
                .books
                .entry((scheme, *species))
                .or_insert_with(|| OrderBook::new(scheme, *species, config.clone()));
        }
        let handle = scheduler.schedule_every_day(
            Phase::PolicyUpdate,
            steppable(move |model: &mut M, ctx: &mut StepContext<'_, M>| {
                let step = ctx.clock().now();
                let year = ctx.clock().year();
                let trades = clear_scheme(model.quota_mut(), scheme, step, year)?;
                if !trades.is_empty() {
                    model.on_trades(&trades)?;
                }
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::regulation::QuotaMode;

    const SCHEME: SchemeId = SchemeId::new(0);
    const COD: SpeciesId = SpeciesId::new(0);
    const HAKE: SpeciesId = SpeciesId::new(1);

    struct Desk {
        pools: QuotaPoolTable,
        book: OrderBook,
    }

    impl Desk {
        fn new(config: OrderBookConfig) -> Self {
            Self {
                pools: QuotaPoolTable::new(),
                book: OrderBook::new(SCHEME, COD, config),
            }
        }

        fn fisher(&mut self, quota: Decimal) -> Regulation {
            let pool = self.pools.create(SCHEME, Some(COD), quota).unwrap();
            Regulation::MultiQuota {
                scheme: SCHEME,
                mode: QuotaMode::Itq,
                pools: BTreeMap::from([(COD, pool)]),
            }
        }

        fn remaining(&self, reg: &Regulation) -> Decimal {
            self.pools.remaining(reg.pool_for(COD).unwrap()).unwrap()
        }
    }

    fn intent(fisher: u32, side: TradeSide, quantity: Decimal, price: Option<Decimal>) -> TradeIntent {
        TradeIntent {
            fisher: FisherId::new(fisher),
            species: COD,
            side,
            quantity,
            limit_price: price,
        }
    }

    #[test]
    fn one_lot_moves_between_pools() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        assert!(desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a).is_accepted());
        assert!(desk.book.submit(&intent(1, TradeSide::Request, dec!(10), None), &b).is_accepted());

        let trades = desk.book.clear(&mut desk.pools, 0, 0).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(desk.remaining(&a), dec!(40));
        assert_eq!(desk.remaining(&b), dec!(60));
        assert_eq!(desk.book.offers_len(), 0);
        assert_eq!(desk.book.requests_len(), 0);
    }

    #[test]
    fn lot_smaller_than_configured_stays_outstanding() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(5), None), &b);

        assert!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().is_empty());
        assert_eq!(desk.book.requests_len(), 1);
        assert_eq!(desk.remaining(&a), dec!(50));
    }

    #[test]
    fn one_intent_per_fisher_by_default() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        assert_eq!(
            desk.book.submit(&intent(0, TradeSide::Request, dec!(10), None), &a),
            SubmitOutcome::Rejected(RejectReason::DuplicateIntent)
        );
        assert_eq!(desk.book.withdraw(FisherId::new(0)), 1);
        assert!(desk.book.submit(&intent(0, TradeSide::Request, dec!(10), None), &a).is_accepted());
    }

    #[test]
    fn rejections_are_ordinary_outcomes() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        assert_eq!(
            desk.book.submit(&intent(0, TradeSide::Offer, Decimal::ZERO, None), &a),
            SubmitOutcome::Rejected(RejectReason::NonPositiveQuantity)
        );
        assert_eq!(
            desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &Regulation::Anarchy),
            SubmitOutcome::Rejected(RejectReason::Unconstrained)
        );
        let mut hake = intent(0, TradeSide::Offer, dec!(10), None);
        hake.species = HAKE;
        assert_eq!(
            desk.book.submit(&hake, &a),
            SubmitOutcome::Rejected(RejectReason::WrongSpecies)
        );
    }

    #[test]
    fn seller_without_a_lot_of_quota_does_not_match() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(5));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), None), &b);
        assert!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().is_empty());
        assert_eq!(desk.book.offers_len(), 1);
    }

    #[test]
    fn price_priority_and_midpoint_pricing() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let dear = desk.fisher(dec!(50));
        let cheap = desk.fisher(dec!(50));
        let buyer = desk.fisher(dec!(0));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), Some(dec!(3))), &dear);
        desk.book.submit(&intent(1, TradeSide::Offer, dec!(10), Some(dec!(2))), &cheap);
        desk.book.submit(&intent(2, TradeSide::Request, dec!(10), Some(dec!(4))), &buyer);

        let trades = desk.book.clear(&mut desk.pools, 0, 0).unwrap();
        assert_eq!(trades.len(), 1);
        let trade = trades.first().unwrap();
        assert_eq!(trade.seller, FisherId::new(1));
        assert_eq!(trade.price, dec!(3));
        assert_eq!(trade.value, dec!(30));
        assert_eq!(desk.book.last_closing_price(), Some(dec!(3)));
        assert_eq!(desk.book.counters().average_price(), Some(dec!(3)));
    }

    #[test]
    fn crossed_prices_are_required() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), Some(dec!(5))), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), Some(dec!(4))), &b);
        assert!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn one_trade_per_fisher_per_clearing() {
        let mut desk = Desk::new(OrderBookConfig::with_lot(dec!(10)));
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(30), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(30), None), &b);

        assert_eq!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().len(), 1);
        assert_eq!(desk.book.clear(&mut desk.pools, 1, 0).unwrap().len(), 1);
        assert_eq!(desk.remaining(&a), dec!(30));
        assert_eq!(desk.remaining(&b), dec!(70));
    }

    #[test]
    fn multiple_trades_when_allowed() {
        let mut config = OrderBookConfig::with_lot(dec!(10));
        config.allow_multiple_trades = true;
        let mut desk = Desk::new(config);
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(30), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(30), None), &b);

        assert_eq!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().len(), 3);
        assert_eq!(desk.remaining(&a), dec!(20));
        assert_eq!(desk.book.counters().matches, 3);
    }

    #[test]
    fn no_self_trades() {
        let mut config = OrderBookConfig::with_lot(dec!(10));
        config.allow_multiple_trades = true;
        let mut desk = Desk::new(config);
        let a = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(0, TradeSide::Request, dec!(10), None), &a);
        assert!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn buyer_sits_in_penalty_box() {
        let mut config = OrderBookConfig::with_lot(dec!(10));
        config.penalty_days = 2;
        let mut desk = Desk::new(config);
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), None), &b);
        desk.book.clear(&mut desk.pools, 0, 0).unwrap();

        assert_eq!(
            desk.book.submit(&intent(1, TradeSide::Offer, dec!(10), None), &b),
            SubmitOutcome::Rejected(RejectReason::InPenaltyBox)
        );
        desk.book.clear(&mut desk.pools, 1, 0).unwrap();
        assert!(desk.book.in_penalty_box(FisherId::new(1)));
        desk.book.clear(&mut desk.pools, 2, 0).unwrap();
        assert!(!desk.book.in_penalty_box(FisherId::new(1)));
    }

    #[test]
    fn no_clearing_before_implementation_year() {
        let mut config = OrderBookConfig::with_lot(dec!(10));
        config.implementation_year = 1;
        let mut desk = Desk::new(config);
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), None), &b);
        assert!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().is_empty());
        assert_eq!(desk.book.clear(&mut desk.pools, 365, 1).unwrap().len(), 1);
    }

    #[test]
    fn unpriced_trade_uses_last_closing_price() {
        let mut config = OrderBookConfig::with_lot(dec!(10));
        config.pricing = PricingPolicy::Ask;
        let mut desk = Desk::new(config);
        let a = desk.fisher(dec!(50));
        let b = desk.fisher(dec!(50));
        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), Some(dec!(2))), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), Some(dec!(9))), &b);
        assert_eq!(desk.book.clear(&mut desk.pools, 0, 0).unwrap().first().unwrap().price, dec!(2));

        desk.book.submit(&intent(0, TradeSide::Offer, dec!(10), None), &a);
        desk.book.submit(&intent(1, TradeSide::Request, dec!(10), None), &b);
        assert_eq!(desk.book.clear(&mut desk.pools, 1, 0).unwrap().first().unwrap().price, dec!(2));
    }
}
