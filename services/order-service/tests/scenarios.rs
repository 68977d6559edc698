//! End-to-end lifecycle scenarios driven through the order service.
//!
//! Exercises the full path: reservation, admission, matching, per-trade
//! settlement, status transitions, and event publication.

use order_service::config::ServiceConfig;
use order_service::service::PlaceRequest;
use order_service::{build_app, App};
use types::contract::ContractSide;
use types::ids::{ContractId, MarketId, UserId};
use types::numeric::{Credits, Price, Quantity};
use types::order::{OrderKind, OrderStatus, Side};

async fn app() -> App {
    build_app(&ServiceConfig::for_tests()).await.unwrap()
}

fn open_contract(app: &App) -> ContractId {
    app.state
        .service
        .register_contract(MarketId::new(), ContractSide::Yes)
        .unwrap()
        .id
}

fn fund(app: &App, whole_credits: i64) -> UserId {
    let user = UserId::new();
    app.state
        .service
        .deposit(user, Credits::from_whole(whole_credits))
        .unwrap();
    user
}

fn limit(contract_id: ContractId, side: Side, qty: u64, price: &str) -> PlaceRequest {
    PlaceRequest {
        contract_id,
        kind: OrderKind::Limit,
        side,
        quantity: Quantity::new(qty),
        limit_price: Some(Price::parse(price).unwrap()),
    }
}

fn market(contract_id: ContractId, side: Side, qty: u64) -> PlaceRequest {
    PlaceRequest {
        contract_id,
        kind: OrderKind::Market,
        side,
        quantity: Quantity::new(qty),
        limit_price: None,
    }
}

#[tokio::test]
async fn simple_match_settles_both_wallets() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);

    let sell = service
        .place(bob, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();
    assert_eq!(sell.order.status, OrderStatus::Active);

    let buy = service
        .place(alice, limit(contract, Side::Buy, 10, "0.500000"))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].quantity, Quantity::new(10));
    assert_eq!(buy.trades[0].price, Price::parse("0.400000").unwrap());
    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(
        service.get_order(bob, sell.order.id).unwrap().status,
        OrderStatus::Filled
    );

    let a = service.balance(alice).unwrap();
    assert_eq!(a.total, Credits::from_whole(96));
    assert_eq!(a.reserved, Credits::ZERO);

    let b = service.balance(bob).unwrap();
    assert_eq!(b.total, Credits::from_whole(104));
    assert_eq!(b.reserved, Credits::ZERO);
}

#[tokio::test]
async fn partial_fill_leaves_maker_resting() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);

    let sell = service
        .place(bob, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();
    let buy = service
        .place(alice, limit(contract, Side::Buy, 4, "0.400000"))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].quantity, Quantity::new(4));
    assert_eq!(buy.order.status, OrderStatus::Filled);

    let maker = service.get_order(bob, sell.order.id).unwrap();
    assert_eq!(maker.status, OrderStatus::Partial);
    assert_eq!(maker.filled, Quantity::new(4));

    // Still resting with 6 on the ask side.
    let book = service.book_snapshot(contract, 10).unwrap();
    assert_eq!(book.asks.len(), 1);
    assert_eq!(book.asks[0].quantity, Quantity::new(6));

    // Bob escrowed (1 − 0.4) × 10 = 6; four shares released at settlement.
    let b = service.balance(bob).unwrap();
    assert_eq!(b.reserved, Credits::parse("3.600000").unwrap());
    assert_eq!(b.total, Credits::parse("101.600000").unwrap());
}

#[tokio::test]
async fn price_time_priority_fills_earlier_maker_first() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);
    let carol = fund(&app, 100);

    let bob_sell = service
        .place(bob, limit(contract, Side::Sell, 5, "0.400000"))
        .await
        .unwrap();
    let carol_sell = service
        .place(carol, limit(contract, Side::Sell, 5, "0.400000"))
        .await
        .unwrap();

    let buy = service
        .place(alice, limit(contract, Side::Buy, 7, "0.400000"))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 2);
    assert_eq!(buy.trades[0].maker_order_id, bob_sell.order.id);
    assert_eq!(buy.trades[0].quantity, Quantity::new(5));
    assert_eq!(buy.trades[1].maker_order_id, carol_sell.order.id);
    assert_eq!(buy.trades[1].quantity, Quantity::new(2));

    assert_eq!(
        service.get_order(bob, bob_sell.order.id).unwrap().status,
        OrderStatus::Filled
    );
    let carol_order = service.get_order(carol, carol_sell.order.id).unwrap();
    assert_eq!(carol_order.status, OrderStatus::Partial);
    assert_eq!(carol_order.filled, Quantity::new(2));
}

#[tokio::test]
async fn insufficient_funds_rejects_without_ledger_mutation() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 1);

    let err = service
        .place(alice, limit(contract, Side::Buy, 10, "0.500000"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");

    // Order persisted as REJECTED; balances untouched; no trade.
    let rejected = service.list_orders(alice, Some(OrderStatus::Rejected), 10);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].filled, Quantity::zero());

    let view = service.balance(alice).unwrap();
    assert_eq!(view.total, Credits::from_whole(1));
    assert_eq!(view.reserved, Credits::ZERO);

    let (_, trades, _) = service.store().stats();
    assert_eq!(trades, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_race_resolves_to_exactly_one_outcome() {
    let app = app().await;
    let service = app.state.service.clone();
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);

    let sell = service
        .place(bob, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();

    let buy_service = service.clone();
    let buy_task = tokio::spawn(async move {
        buy_service
            .place(alice, limit(contract, Side::Buy, 10, "0.400000"))
            .await
            .unwrap()
    });
    let cancel_service = service.clone();
    let sell_id = sell.order.id;
    let cancel_task = tokio::spawn(async move { cancel_service.cancel(bob, sell_id).await });

    let buy = buy_task.await.unwrap();
    let cancel_result = cancel_task.await.unwrap();

    let match_won = match cancel_result {
        // Cancel won: Alice's buy rests; nothing traded.
        Ok(order) if order.status == OrderStatus::Cancelled => false,
        // Match won in flight: cancel reported the post-match status.
        Ok(order) if order.status == OrderStatus::Filled => true,
        // Match won before cancel even loaded the order.
        Err(err) if err.code() == "TERMINAL_STATE" => true,
        other => panic!("unexpected cancel outcome: {other:?}"),
    };

    let b = service.balance(bob).unwrap();
    if match_won {
        assert_eq!(buy.order.status, OrderStatus::Filled);
        assert_eq!(buy.trades.len(), 1);
        assert_eq!(b.total, Credits::from_whole(104));
    } else {
        assert_eq!(buy.order.status, OrderStatus::Active);
        assert!(buy.trades.is_empty());
        assert_eq!(b.total, Credits::from_whole(100));
    }
    assert_eq!(b.reserved, Credits::ZERO);

    // Either way both wallets reconcile.
    let a = service.balance(alice).unwrap();
    assert!(a.reserved >= Credits::ZERO);
    assert!(a.reserved <= a.total);
}

#[tokio::test]
async fn market_order_walks_the_book() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let maker = fund(&app, 100);

    service
        .place(maker, limit(contract, Side::Sell, 3, "0.300000"))
        .await
        .unwrap();
    service
        .place(maker, limit(contract, Side::Sell, 5, "0.350000"))
        .await
        .unwrap();
    service
        .place(maker, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();

    let buy = service
        .place(alice, market(contract, Side::Buy, 6))
        .await
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(buy.order.filled, Quantity::new(6));
    let fills: Vec<(u64, i64)> = buy
        .trades
        .iter()
        .map(|t| (t.quantity.as_u64(), t.price.as_micros()))
        .collect();
    assert_eq!(fills, vec![(3, 300_000), (3, 350_000)]);

    let book = service.book_snapshot(contract, 10).unwrap();
    let asks: Vec<(i64, u64)> = book
        .asks
        .iter()
        .map(|l| (l.price.as_micros(), l.quantity.as_u64()))
        .collect();
    assert_eq!(asks, vec![(350_000, 2), (400_000, 10)]);

    // Market buy escrowed 6 × 1.0; paid 0.9 + 1.05, rest released.
    let a = service.balance(alice).unwrap();
    assert_eq!(a.reserved, Credits::ZERO);
    assert_eq!(a.total, Credits::parse("98.050000").unwrap());
}

#[tokio::test]
async fn market_order_on_empty_book_is_rejected_with_refund() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);

    let outcome = service
        .place(alice, market(contract, Side::Buy, 5))
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Rejected);
    assert!(outcome.trades.is_empty());
    assert_eq!(outcome.order.filled, Quantity::zero());
    assert!(outcome.average_price().is_none());

    let view = service.balance(alice).unwrap();
    assert_eq!(view.total, Credits::from_whole(100));
    assert_eq!(view.reserved, Credits::ZERO);
}

#[tokio::test]
async fn self_cross_settles_net_zero() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);

    service
        .place(alice, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();
    let buy = service
        .place(alice, limit(contract, Side::Buy, 10, "0.400000"))
        .await
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert!(buy.trades[0].is_self_cross());

    let view = service.balance(alice).unwrap();
    assert_eq!(view.total, Credits::from_whole(100));
    assert_eq!(view.reserved, Credits::ZERO);
}

#[tokio::test]
async fn closed_contract_refuses_admission() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);

    service.close_contract(contract).unwrap();
    let err = service
        .place(alice, limit(contract, Side::Buy, 1, "0.500000"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONTRACT_CLOSED");
}

#[tokio::test]
async fn cancel_releases_the_remaining_reservation() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);

    let sell = service
        .place(bob, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();
    service
        .place(alice, limit(contract, Side::Buy, 4, "0.400000"))
        .await
        .unwrap();

    let cancelled = service.cancel(bob, sell.order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.filled, Quantity::new(4));

    let b = service.balance(bob).unwrap();
    assert_eq!(b.reserved, Credits::ZERO);
    assert_eq!(b.total, Credits::parse("101.600000").unwrap());

    // A second cancel is a terminal-state conflict.
    let err = service.cancel(bob, sell.order.id).await.unwrap_err();
    assert_eq!(err.code(), "TERMINAL_STATE");
}

#[tokio::test]
async fn published_events_confirm_settlement_and_reach_the_relay() {
    let app = app().await;
    let service = &app.state.service;
    let contract = open_contract(&app);
    let alice = fund(&app, 100);
    let bob = fund(&app, 100);

    let mut rx = app.state.relay.subscribe();

    service
        .place(bob, limit(contract, Side::Sell, 10, "0.400000"))
        .await
        .unwrap();
    let buy = service
        .place(alice, limit(contract, Side::Buy, 10, "0.400000"))
        .await
        .unwrap();
    let trade_id = buy.trades[0].id;

    assert_eq!(app.publisher.drain().await, 1);
    assert!(app.recorder.is_confirmed(trade_id));

    let event = rx.recv().await.unwrap();
    assert_eq!(event.trade_id, trade_id);
    assert_eq!(event.maker_user_id, bob);
    assert_eq!(event.taker_user_id, alice);
    assert_eq!(event.sequence, buy.trades[0].sequence);

    // Replay of the same settlement is a no-op.
    assert!(!service
        .ledger()
        .settle_trade(
            alice,
            bob,
            buy.trades[0].quantity,
            buy.trades[0].price,
            trade_id
        )
        .unwrap());
}
