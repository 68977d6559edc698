//! Property-based invariant tests for the order book.
//!
//! Replays random limit-order streams and asserts after every admission:
//! the book is never crossed, traded quantity never exceeds submitted
//! quantity, and the aggregated snapshot equals the flat sum of resting
//! orders. Same stream twice must produce identical outcomes.

use matching_engine::{OrderBook, SubmitOutcome};
use proptest::prelude::*;
use types::ids::{ContractId, UserId};
use types::numeric::{Price, Quantity};
use types::order::{Order, OrderKind, Side};

#[derive(Debug, Clone, Copy)]
struct OrderShape {
    buy: bool,
    qty: u64,
    price_ticks: i64, // tenths of a credit
}

fn shape_strategy() -> impl Strategy<Value = OrderShape> {
    (any::<bool>(), 1u64..20, 1i64..=9).prop_map(|(buy, qty, price_ticks)| OrderShape {
        buy,
        qty,
        price_ticks,
    })
}

fn order_from(shape: OrderShape, contract: ContractId, ts: i64) -> Order {
    Order::new(
        UserId::new(),
        contract,
        OrderKind::Limit,
        if shape.buy { Side::Buy } else { Side::Sell },
        Quantity::new(shape.qty),
        Some(Price::new(shape.price_ticks * 100_000)),
        ts,
    )
}

fn replay(shapes: &[OrderShape]) -> (u64, u64, usize) {
    let contract = ContractId::from_uuid(uuid::Uuid::from_u128(7));
    let mut book = OrderBook::new(contract);
    let mut traded = 0u64;
    let mut submitted = 0u64;

    for (i, &shape) in shapes.iter().enumerate() {
        let order = order_from(shape, contract, i as i64);
        submitted += shape.qty;
        let result = book.submit(&order, i as i64).unwrap();

        for trade in &result.trades {
            assert!(trade.quantity.as_u64() > 0, "zero-quantity trade");
            assert!(trade.price.as_micros() > 0, "non-positive trade price");
            traded += trade.quantity.as_u64();
        }

        // Never crossed: a resting bid at or above the best ask would have
        // matched instead of resting.
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            assert!(bid < ask, "crossed book: bid {bid} >= ask {ask}");
        }

        // Conservation: every trade consumed one taker share and one maker
        // share, so the aggregated snapshot holds exactly what remains.
        let snap = book.snapshot(usize::MAX);
        let snap_total: u64 = snap
            .bids
            .iter()
            .chain(snap.asks.iter())
            .map(|l| l.quantity.as_u64())
            .sum();
        assert_eq!(snap_total, submitted - 2 * traded);

        if matches!(result.outcome, SubmitOutcome::Rejected) {
            panic!("limit orders are never rejected by the book");
        }
    }

    (traded, submitted, book.resting_count())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_book_invariants_hold(shapes in proptest::collection::vec(shape_strategy(), 1..120)) {
        let (traded, submitted, _) = replay(&shapes);
        // Each traded share consumed one taker share and one maker share.
        prop_assert!(2 * traded <= submitted);
    }

    #[test]
    fn prop_replay_is_deterministic(shapes in proptest::collection::vec(shape_strategy(), 1..80)) {
        let first = replay(&shapes);
        let second = replay(&shapes);
        prop_assert_eq!(first.0, second.0, "traded quantity diverged");
        prop_assert_eq!(first.2, second.2, "resting count diverged");
    }
}
