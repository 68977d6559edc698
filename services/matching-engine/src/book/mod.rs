//! Single-contract order book
//!
//! Resting-order storage with price-time priority: two `BTreeMap` sides of
//! FIFO price levels, plus an order-id index so cancellation does not scan.
//! The book performs no I/O; matching returns trades for the caller to
//! persist.

mod ask_book;
mod bid_book;
mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{LevelEntry, PriceLevel};

use std::collections::HashMap;

use serde::Serialize;
use types::errors::CoreError;
use types::ids::{ContractId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderKind, Side};

use crate::matching::{self, MatchResult, SubmitOutcome, TradeSequencer};

/// One aggregated price level of a depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookLevel {
    pub price: Price,
    #[serde(rename = "qty")]
    pub quantity: Quantity,
    #[serde(rename = "count")]
    pub order_count: u32,
}

/// Aggregated two-sided view of a book as of one consistent instant.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// In-memory book for one contract.
#[derive(Debug)]
pub struct OrderBook {
    contract_id: ContractId,
    pub(crate) bids: BidBook,
    pub(crate) asks: AskBook,
    /// Resting order locations for O(log n) cancel.
    pub(crate) index: HashMap<OrderId, (Side, Price)>,
    pub(crate) sequencer: TradeSequencer,
    next_arrival: u64,
}

impl OrderBook {
    pub fn new(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            bids: BidBook::new(),
            asks: AskBook::new(),
            index: HashMap::new(),
            sequencer: TradeSequencer::new(1),
            next_arrival: 1,
        }
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    /// Run the incoming order through matching; rest any limit remainder.
    ///
    /// Returns the ordered trades and the taker's outcome. The taker order
    /// itself is not mutated; the caller applies fills to its own copy.
    pub fn submit(&mut self, taker: &Order, now: i64) -> Result<MatchResult, CoreError> {
        if taker.contract_id != self.contract_id {
            return Err(CoreError::Invariant(format!(
                "order {} routed to wrong book",
                taker.id
            )));
        }
        if taker.kind == OrderKind::Limit && taker.limit_price.is_none() {
            return Err(CoreError::Invariant(format!(
                "limit order {} without a price",
                taker.id
            )));
        }

        let trades = matching::match_incoming(self, taker, now)?;
        let filled = trades
            .iter()
            .fold(Quantity::zero(), |acc, t| acc + t.quantity);
        let remaining = taker.remaining() - filled;

        let outcome = if remaining.is_zero() {
            SubmitOutcome::Filled
        } else {
            match taker.kind {
                OrderKind::Limit => {
                    let price = taker
                        .limit_price
                        .expect("limit price checked at submit entry");
                    self.rest(taker, price, remaining);
                    if filled.is_zero() {
                        SubmitOutcome::Resting
                    } else {
                        SubmitOutcome::PartiallyFilled { resting: true }
                    }
                }
                // A market remainder is discarded, never rested.
                OrderKind::Market => {
                    if filled.is_zero() {
                        SubmitOutcome::Rejected
                    } else {
                        SubmitOutcome::PartiallyFilled { resting: false }
                    }
                }
            }
        };

        Ok(MatchResult { trades, outcome })
    }

    fn rest(&mut self, taker: &Order, price: Price, remaining: Quantity) {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        let entry = LevelEntry {
            order_id: taker.id,
            user_id: taker.user_id,
            remaining,
            arrival,
        };
        match taker.side {
            Side::Buy => self.bids.insert(price, entry),
            Side::Sell => self.asks.insert(price, entry),
        }
        self.index.insert(taker.id, (taker.side, price));
    }

    /// Remove a resting order. Returns `false` when the order is not in the
    /// book (already filled, already cancelled, or never rested).
    pub fn cancel(&mut self, order_id: OrderId) -> bool {
        let Some((side, price)) = self.index.remove(&order_id) else {
            return false;
        };
        let removed = match side {
            Side::Buy => self.bids.remove(&order_id, price),
            Side::Sell => self.asks.remove(&order_id, price),
        };
        debug_assert!(removed.is_some(), "index pointed at a missing order");
        removed.is_some()
    }

    /// Aggregated price levels up to `depth` on each side.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids.depth_snapshot(depth),
            asks: self.asks.depth_snapshot(depth),
        }
    }

    /// Continue trade numbering after a restart. Only moves forward.
    pub fn resume_sequence(&mut self, next: u64) {
        if next > self.sequencer.peek() {
            self.sequencer = TradeSequencer::new(next);
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Number of resting orders across both sides.
    pub fn resting_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::UserId;

    fn limit(side: Side, qty: u64, price_micros: i64, ts: i64) -> Order {
        Order::new(
            UserId::new(),
            ContractId::from_uuid(uuid::Uuid::from_u128(1)),
            OrderKind::Limit,
            side,
            Quantity::new(qty),
            Some(Price::new(price_micros)),
            ts,
        )
    }

    fn book() -> OrderBook {
        OrderBook::new(ContractId::from_uuid(uuid::Uuid::from_u128(1)))
    }

    #[test]
    fn resting_order_is_cancellable() {
        let mut book = book();
        let order = limit(Side::Buy, 10, 400_000, 1);
        let result = book.submit(&order, 1).unwrap();
        assert!(matches!(result.outcome, SubmitOutcome::Resting));
        assert_eq!(book.resting_count(), 1);

        assert!(book.cancel(order.id));
        assert_eq!(book.resting_count(), 0);
        assert!(book.best_bid().is_none());
        assert!(!book.cancel(order.id));
    }

    #[test]
    fn wrong_contract_is_rejected() {
        let mut book = book();
        let mut order = limit(Side::Buy, 10, 400_000, 1);
        order.contract_id = ContractId::new();
        assert!(book.submit(&order, 1).is_err());
    }

    #[test]
    fn snapshot_aggregates_levels() {
        let mut book = book();
        book.submit(&limit(Side::Sell, 3, 300_000, 1), 1).unwrap();
        book.submit(&limit(Side::Sell, 5, 350_000, 2), 2).unwrap();
        book.submit(&limit(Side::Sell, 2, 350_000, 3), 3).unwrap();
        book.submit(&limit(Side::Buy, 4, 250_000, 4), 4).unwrap();

        let snap = book.snapshot(10);
        assert_eq!(snap.asks.len(), 2);
        assert_eq!(snap.asks[0].price, Price::new(300_000));
        assert_eq!(snap.asks[1].quantity, Quantity::new(7));
        assert_eq!(snap.asks[1].order_count, 2);
        assert_eq!(snap.bids.len(), 1);
    }

    #[test]
    fn snapshot_totals_equal_flat_resting_sums() {
        let mut book = book();
        book.submit(&limit(Side::Sell, 3, 300_000, 1), 1).unwrap();
        book.submit(&limit(Side::Sell, 5, 350_000, 2), 2).unwrap();
        book.submit(&limit(Side::Buy, 4, 250_000, 3), 3).unwrap();
        // Partial fill against the 0.30 level.
        book.submit(&limit(Side::Buy, 2, 300_000, 4), 4).unwrap();

        let snap = book.snapshot(usize::MAX);
        let bid_total: u64 = snap.bids.iter().map(|l| l.quantity.as_u64()).sum();
        let ask_total: u64 = snap.asks.iter().map(|l| l.quantity.as_u64()).sum();
        assert_eq!(bid_total, book.bids.total_resting().as_u64());
        assert_eq!(ask_total, book.asks.total_resting().as_u64());
        assert_eq!(ask_total, 6);
    }

    #[test]
    fn snapshot_serializes_with_wire_field_names() {
        let mut book = book();
        book.submit(&limit(Side::Sell, 3, 300_000, 1), 1).unwrap();
        let snap = book.snapshot(1);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["asks"][0]["price"], "0.300000");
        assert_eq!(json["asks"][0]["qty"], 3);
        assert_eq!(json["asks"][0]["count"], 1);
    }
}
