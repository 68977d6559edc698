//! The matching algorithm
//!
//! Walks the opposite side best-price-first, FIFO within each level. Fills
//! are sized `min(taker remaining, maker remaining)` and execute at the
//! maker's resting price. Exhausted makers leave the book immediately.

pub mod crossing;
mod executor;

pub use executor::TradeSequencer;

use types::errors::CoreError;
use types::numeric::Quantity;
use types::order::{Order, Side};
use types::trade::Trade;

use crate::book::OrderBook;

/// Terminal disposition of the taker after matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Limit taker rested with no fills.
    Resting,
    /// Some quantity filled; `resting` tells whether a limit remainder sits
    /// on the book (a market remainder is discarded instead).
    PartiallyFilled { resting: bool },
    /// Taker completely filled.
    Filled,
    /// Market taker found no liquidity; no state changed.
    Rejected,
}

/// Ordered trades plus the taker's outcome.
#[derive(Debug)]
pub struct MatchResult {
    pub trades: Vec<Trade>,
    pub outcome: SubmitOutcome,
}

impl MatchResult {
    /// Total quantity the taker filled.
    pub fn filled(&self) -> Quantity {
        self.trades
            .iter()
            .fold(Quantity::zero(), |acc, t| acc + t.quantity)
    }
}

/// Match the incoming order against the book, mutating resting state and
/// returning the trades in execution order.
pub(crate) fn match_incoming(
    book: &mut OrderBook,
    taker: &Order,
    now: i64,
) -> Result<Vec<Trade>, CoreError> {
    match taker.side {
        Side::Buy => match_against_asks(book, taker, now),
        Side::Sell => match_against_bids(book, taker, now),
    }
}

fn match_against_asks(
    book: &mut OrderBook,
    taker: &Order,
    now: i64,
) -> Result<Vec<Trade>, CoreError> {
    let contract_id = book.contract_id();
    let OrderBook {
        ref mut asks,
        ref mut index,
        ref mut sequencer,
        ..
    } = *book;

    let mut trades = Vec::new();
    let mut remaining = taker.remaining();

    while !remaining.is_zero() {
        let Some(best) = asks.best_price() else { break };
        if !crossing::taker_crosses(taker.kind, taker.limit_price, Side::Buy, best) {
            break;
        }
        let level = asks
            .level_mut(best)
            .ok_or_else(|| CoreError::Invariant("best ask level vanished".into()))?;
        let Some(front) = level.front() else {
            asks.remove_level_if_empty(best);
            continue;
        };

        let fill = remaining.min(front.remaining);
        let maker_order_id = front.order_id;
        let maker_user_id = front.user_id;

        trades.push(sequencer.execute(
            contract_id,
            maker_order_id,
            taker.id,
            maker_user_id,
            taker.user_id,
            fill,
            best,
            now,
        ));

        let maker_exhausted = level.fill_front(fill);
        if maker_exhausted {
            index.remove(&maker_order_id);
            asks.remove_level_if_empty(best);
        }
        remaining = remaining - fill;
    }

    Ok(trades)
}

fn match_against_bids(
    book: &mut OrderBook,
    taker: &Order,
    now: i64,
) -> Result<Vec<Trade>, CoreError> {
    let contract_id = book.contract_id();
    let OrderBook {
        ref mut bids,
        ref mut index,
        ref mut sequencer,
        ..
    } = *book;

    let mut trades = Vec::new();
    let mut remaining = taker.remaining();

    while !remaining.is_zero() {
        let Some(best) = bids.best_price() else { break };
        if !crossing::taker_crosses(taker.kind, taker.limit_price, Side::Sell, best) {
            break;
        }
        let level = bids
            .level_mut(best)
            .ok_or_else(|| CoreError::Invariant("best bid level vanished".into()))?;
        let Some(front) = level.front() else {
            bids.remove_level_if_empty(best);
            continue;
        };

        let fill = remaining.min(front.remaining);
        let maker_order_id = front.order_id;
        let maker_user_id = front.user_id;

        trades.push(sequencer.execute(
            contract_id,
            maker_order_id,
            taker.id,
            maker_user_id,
            taker.user_id,
            fill,
            best,
            now,
        ));

        let maker_exhausted = level.fill_front(fill);
        if maker_exhausted {
            index.remove(&maker_order_id);
            bids.remove_level_if_empty(best);
        }
        remaining = remaining - fill;
    }

    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{ContractId, UserId};
    use types::numeric::Price;
    use types::order::OrderKind;

    fn contract() -> ContractId {
        ContractId::from_uuid(uuid::Uuid::from_u128(42))
    }

    fn limit(side: Side, qty: u64, price_micros: i64, ts: i64) -> Order {
        Order::new(
            UserId::new(),
            contract(),
            OrderKind::Limit,
            side,
            Quantity::new(qty),
            Some(Price::new(price_micros)),
            ts,
        )
    }

    fn market(side: Side, qty: u64, ts: i64) -> Order {
        Order::new(
            UserId::new(),
            contract(),
            OrderKind::Market,
            side,
            Quantity::new(qty),
            None,
            ts,
        )
    }

    #[test]
    fn exact_cross_fills_both_sides() {
        let mut book = OrderBook::new(contract());
        let sell = limit(Side::Sell, 10, 400_000, 1);
        book.submit(&sell, 1).unwrap();

        let buy = limit(Side::Buy, 10, 400_000, 2);
        let result = book.submit(&buy, 2).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::Filled);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].quantity, Quantity::new(10));
        assert_eq!(result.trades[0].price, Price::new(400_000));
        assert_eq!(result.trades[0].maker_order_id, sell.id);
        assert_eq!(result.trades[0].taker_order_id, buy.id);
        assert_eq!(book.resting_count(), 0);
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn trade_price_is_makers_not_takers() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 10, 400_000, 1), 1).unwrap();

        let buy = limit(Side::Buy, 10, 500_000, 2);
        let result = book.submit(&buy, 2).unwrap();
        assert_eq!(result.trades[0].price, Price::new(400_000));
    }

    #[test]
    fn partial_fill_leaves_maker_resting() {
        let mut book = OrderBook::new(contract());
        let sell = limit(Side::Sell, 10, 400_000, 1);
        book.submit(&sell, 1).unwrap();

        let buy = limit(Side::Buy, 4, 400_000, 2);
        let result = book.submit(&buy, 2).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::Filled);
        assert_eq!(result.trades[0].quantity, Quantity::new(4));
        // Maker still resting with 6 left.
        assert_eq!(book.resting_count(), 1);
        let snap = book.snapshot(1);
        assert_eq!(snap.asks[0].quantity, Quantity::new(6));
    }

    #[test]
    fn price_time_priority_earlier_maker_first() {
        let mut book = OrderBook::new(contract());
        let first = limit(Side::Sell, 5, 400_000, 1);
        let second = limit(Side::Sell, 5, 400_000, 2);
        book.submit(&first, 1).unwrap();
        book.submit(&second, 2).unwrap();

        let buy = limit(Side::Buy, 7, 400_000, 3);
        let result = book.submit(&buy, 3).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id, first.id);
        assert_eq!(result.trades[0].quantity, Quantity::new(5));
        assert_eq!(result.trades[1].maker_order_id, second.id);
        assert_eq!(result.trades[1].quantity, Quantity::new(2));
        assert_eq!(result.outcome, SubmitOutcome::Filled);

        // Second maker left resting with 3.
        let snap = book.snapshot(1);
        assert_eq!(snap.asks[0].quantity, Quantity::new(3));
    }

    #[test]
    fn taker_walks_improving_price_levels_in_order() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 3, 300_000, 1), 1).unwrap();
        book.submit(&limit(Side::Sell, 5, 350_000, 2), 2).unwrap();
        book.submit(&limit(Side::Sell, 10, 400_000, 3), 3).unwrap();

        let buy = limit(Side::Buy, 9, 400_000, 4);
        let result = book.submit(&buy, 4).unwrap();

        let prices: Vec<_> = result.trades.iter().map(|t| t.price.as_micros()).collect();
        assert_eq!(prices, vec![300_000, 350_000, 400_000]);
        let quantities: Vec<_> = result.trades.iter().map(|t| t.quantity.as_u64()).collect();
        assert_eq!(quantities, vec![3, 5, 1]);
    }

    #[test]
    fn limit_remainder_rests_at_its_price() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 4, 400_000, 1), 1).unwrap();

        let buy = limit(Side::Buy, 10, 400_000, 2);
        let result = book.submit(&buy, 2).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::PartiallyFilled { resting: true });
        assert_eq!(book.best_bid(), Some(Price::new(400_000)));
        let snap = book.snapshot(1);
        assert_eq!(snap.bids[0].quantity, Quantity::new(6));
    }

    #[test]
    fn non_crossing_limit_rests_untouched() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 10, 500_000, 1), 1).unwrap();

        let buy = limit(Side::Buy, 10, 400_000, 2);
        let result = book.submit(&buy, 2).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::Resting);
        assert!(result.trades.is_empty());
        assert_eq!(book.best_bid(), Some(Price::new(400_000)));
        assert_eq!(book.best_ask(), Some(Price::new(500_000)));
    }

    #[test]
    fn market_buy_walks_the_book_and_discards_remainder() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 3, 300_000, 1), 1).unwrap();
        book.submit(&limit(Side::Sell, 5, 350_000, 2), 2).unwrap();

        let taker = market(Side::Buy, 20, 3);
        let result = book.submit(&taker, 3).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::PartiallyFilled { resting: false });
        assert_eq!(result.filled(), Quantity::new(8));
        // Nothing rested; the ask side is empty and the bid side untouched.
        assert_eq!(book.resting_count(), 0);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn market_order_on_empty_book_is_rejected() {
        let mut book = OrderBook::new(contract());
        let taker = market(Side::Buy, 5, 1);
        let result = book.submit(&taker, 1).unwrap();

        assert_eq!(result.outcome, SubmitOutcome::Rejected);
        assert!(result.trades.is_empty());
        assert_eq!(book.resting_count(), 0);
    }

    #[test]
    fn market_sell_matches_highest_bids_first() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Buy, 5, 450_000, 1), 1).unwrap();
        book.submit(&limit(Side::Buy, 5, 400_000, 2), 2).unwrap();

        let taker = market(Side::Sell, 8, 3);
        let result = book.submit(&taker, 3).unwrap();

        let prices: Vec<_> = result.trades.iter().map(|t| t.price.as_micros()).collect();
        assert_eq!(prices, vec![450_000, 400_000]);
        assert_eq!(result.outcome, SubmitOutcome::Filled);
    }

    #[test]
    fn self_cross_is_not_prevented() {
        let mut book = OrderBook::new(contract());
        let user = UserId::new();
        let mut sell = limit(Side::Sell, 10, 400_000, 1);
        sell.user_id = user;
        book.submit(&sell, 1).unwrap();

        let mut buy = limit(Side::Buy, 10, 400_000, 2);
        buy.user_id = user;
        let result = book.submit(&buy, 2).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert!(result.trades[0].is_self_cross());
        assert_eq!(result.outcome, SubmitOutcome::Filled);
    }

    #[test]
    fn trade_sequences_are_monotonic_per_book() {
        let mut book = OrderBook::new(contract());
        book.submit(&limit(Side::Sell, 5, 400_000, 1), 1).unwrap();
        book.submit(&limit(Side::Sell, 5, 400_000, 2), 2).unwrap();

        let r1 = book.submit(&limit(Side::Buy, 5, 400_000, 3), 3).unwrap();
        let r2 = book.submit(&limit(Side::Buy, 5, 400_000, 4), 4).unwrap();

        assert_eq!(r1.trades[0].sequence + 1, r2.trades[0].sequence);
    }
}
