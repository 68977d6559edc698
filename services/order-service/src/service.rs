//! Order lifecycle orchestration
//!
//! Mediates every client request: validates, reserves funds, persists,
//! submits to the engine, then applies each returned trade as one store
//! transaction plus an idempotent ledger settlement. Also owns startup
//! recovery: outbox settlement replay and order-book reconstruction.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledger::Ledger;
use matching_engine::{EngineRegistry, SubmitOutcome};
use persistence::Store;
use tracing::{error, info, warn};
use types::contract::{Contract, ContractSide};
use types::errors::CoreError;
use types::ids::{ContractId, MarketId, OrderId, TradeId, UserId};
use types::numeric::{Credits, Price, Quantity, CREDIT_SCALE};
use types::order::{Order, OrderKind, OrderStatus, Side};
use types::time::unix_nanos;
use types::trade::Trade;
use types::wallet::EntryKind;

/// Request to place one order, already shape-validated by the edge.
#[derive(Debug, Clone)]
pub struct PlaceRequest {
    pub contract_id: ContractId,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Option<Price>,
}

/// Result of a placement: the final order row and its trades in order.
#[derive(Debug)]
pub struct PlaceOutcome {
    pub order: Order,
    pub trades: Vec<Trade>,
}

impl PlaceOutcome {
    /// Volume-weighted average fill price, if anything filled.
    pub fn average_price(&self) -> Option<rust_decimal::Decimal> {
        if self.order.filled.is_zero() {
            return None;
        }
        let notional: Credits = self.trades.iter().map(|t| t.value()).sum();
        Some(notional.as_decimal() / rust_decimal::Decimal::from(self.order.filled.as_u64()))
    }
}

/// What startup recovery found and repaired.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Unpublished trades whose settlement was replayed.
    pub settlements_replayed: usize,
    /// Resting limit orders re-admitted to their books.
    pub orders_restored: usize,
    /// Trades produced while re-admitting (a crash split a cross).
    pub trades_from_rebuild: usize,
}

/// The order service: ties the ledger, engine, and store together.
pub struct OrderService {
    store: Arc<Store>,
    ledger: Arc<Ledger>,
    engine: Arc<EngineRegistry>,
    dead_letters: Mutex<Vec<TradeId>>,
    retry_budget: u32,
    retry_base: Duration,
}

impl OrderService {
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<Ledger>,
        engine: Arc<EngineRegistry>,
        retry_budget: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            engine,
            dead_letters: Mutex::new(Vec::new()),
            retry_budget,
            retry_base,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Trades whose settlement exhausted the retry budget.
    pub fn dead_letters(&self) -> Vec<TradeId> {
        self.dead_letters.lock().expect("dead-letter set poisoned").clone()
    }

    // ── Contracts (collaborator seam) ───────────────────────────────

    /// Register a contract row. Market metadata management is external;
    /// this is the write the collaborator performs.
    pub fn register_contract(
        &self,
        market_id: MarketId,
        side: ContractSide,
    ) -> Result<Contract, CoreError> {
        let contract = Contract::new(market_id, side, unix_nanos());
        self.store.upsert_contract(&contract)?;
        Ok(contract)
    }

    /// Close a contract to new orders.
    pub fn close_contract(&self, contract_id: ContractId) -> Result<(), CoreError> {
        let mut contract = self
            .store
            .contract(contract_id)
            .ok_or_else(|| CoreError::NotFound(format!("contract {contract_id}")))?;
        contract.closed = true;
        self.store.upsert_contract(&contract)
    }

    // ── Placement ───────────────────────────────────────────────────

    pub async fn place(
        &self,
        user_id: UserId,
        request: PlaceRequest,
    ) -> Result<PlaceOutcome, CoreError> {
        validate(&request)?;

        let contract = self
            .store
            .contract(request.contract_id)
            .ok_or_else(|| CoreError::NotFound(format!("contract {}", request.contract_id)))?;
        if contract.closed {
            return Err(CoreError::ContractClosed(contract.id));
        }

        let now = unix_nanos();
        let mut order = Order::new(
            user_id,
            request.contract_id,
            request.kind,
            request.side,
            request.quantity,
            request.limit_price,
            now,
        );

        // Fund the order before admission.
        let reservation = reservation_for(&order);
        if reservation > Credits::ZERO {
            match self.ledger.reserve(user_id, reservation, order.id) {
                Ok(()) => {}
                Err(err @ CoreError::InsufficientFunds { .. }) => {
                    order.reject(now)?;
                    self.store.put_order(&order)?;
                    info!(order_id = %order.id, %user_id, "order rejected for funds");
                    return Err(err);
                }
                Err(CoreError::NotFound(_)) => {
                    // No wallet yet: nothing is available.
                    order.reject(now)?;
                    self.store.put_order(&order)?;
                    return Err(CoreError::InsufficientFunds {
                        required: reservation,
                        available: Credits::ZERO,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        self.store.put_order(&order)?;

        let result = self.engine.submit(&order)?;
        for trade in &result.trades {
            if let Err(err) = self.apply_trade(trade).await {
                error!(trade_id = %trade.id, %err, "trade application dead-lettered");
                self.dead_letters
                    .lock()
                    .expect("dead-letter set poisoned")
                    .push(trade.id);
            }
        }

        let order = self.finalize_taker(order.id, &result.outcome)?;

        info!(
            order_id = %order.id,
            %user_id,
            status = %order.status,
            trades = result.trades.len(),
            "order placed"
        );
        Ok(PlaceOutcome {
            order,
            trades: result.trades,
        })
    }

    /// One trade's transaction: the store applies the fill to both order
    /// rows and persists trade + outbox in one frame; the ledger legs then
    /// settle idempotently.
    async fn apply_trade(&self, trade: &Trade) -> Result<(), CoreError> {
        self.with_retry("persist trade", || self.store.apply_trade(trade))
            .await?;
        self.with_retry("settle trade", || self.settle_and_release(trade))
            .await?;
        Ok(())
    }

    /// Settle one trade and release the side escrows. Safe to replay: the
    /// settlement is keyed by trade id and the releases only run on first
    /// application.
    fn settle_and_release(&self, trade: &Trade) -> Result<(), CoreError> {
        let maker = self
            .store
            .order(trade.maker_order_id)
            .ok_or_else(|| CoreError::Invariant(format!("maker order {} missing", trade.maker_order_id)))?;
        let taker = self
            .store
            .order(trade.taker_order_id)
            .ok_or_else(|| CoreError::Invariant(format!("taker order {} missing", trade.taker_order_id)))?;

        let (buy_order, sell_order) = match taker.side {
            Side::Buy => (&taker, &maker),
            Side::Sell => (&maker, &taker),
        };

        let newly = self.ledger.settle_trade(
            buy_order.user_id,
            sell_order.user_id,
            trade.quantity,
            trade.price,
            trade.id,
        )?;
        if !newly {
            return Ok(());
        }

        // Buyer held quantity × unit; settlement consumed quantity × price.
        // The improvement, if any, goes back to the available pool.
        let buy_unit = reserved_unit_micros(buy_order);
        let excess = buy_unit - trade.price.as_micros();
        if excess > 0 {
            let amount = Credits::from_micros(excess * trade.quantity.as_u64() as i64);
            self.ledger.release(buy_order.user_id, amount, buy_order.id)?;
        }

        // Seller escrowed the opposite-outcome exposure; the filled shares
        // no longer carry it.
        let sell_unit = reserved_unit_micros(sell_order);
        if sell_unit > 0 {
            let amount = Credits::from_micros(sell_unit * trade.quantity.as_u64() as i64);
            self.ledger
                .release(sell_order.user_id, amount, sell_order.id)?;
        }

        Ok(())
    }

    /// Settle the taker's final status atomically against concurrent fills
    /// of its resting remainder, then refund whatever a discarded market
    /// remainder still holds.
    fn finalize_taker(
        &self,
        order_id: types::ids::OrderId,
        outcome: &SubmitOutcome,
    ) -> Result<Order, CoreError> {
        let now = unix_nanos();
        let order = match outcome {
            // A resting order may have been hit by another taker before we
            // got here; only a still-pending row activates.
            SubmitOutcome::Resting => self.store.update_order(order_id, |o| {
                if o.status == OrderStatus::Pending {
                    o.activate(now)
                } else {
                    Ok(())
                }
            })?,
            SubmitOutcome::Filled | SubmitOutcome::PartiallyFilled { resting: true } => self
                .store
                .order(order_id)
                .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?,
            SubmitOutcome::PartiallyFilled { resting: false } => {
                // Discarded market remainder: give the unused escrow back.
                let order = self
                    .store
                    .order(order_id)
                    .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
                self.refund_remainder(&order)?;
                order
            }
            SubmitOutcome::Rejected => {
                let order = self.store.update_order(order_id, |o| o.reject(now))?;
                self.refund_remainder(&order)?;
                order
            }
        };
        Ok(order)
    }

    fn refund_remainder(&self, order: &Order) -> Result<(), CoreError> {
        let unit = reserved_unit_micros(order);
        let remaining = order.remaining();
        if unit > 0 && !remaining.is_zero() {
            let amount = Credits::from_micros(unit * remaining.as_u64() as i64);
            self.ledger.refund(order.user_id, amount, order.id)?;
        }
        Ok(())
    }

    // ── Cancellation ────────────────────────────────────────────────

    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CoreError> {
        let mut order = self
            .store
            .order(order_id)
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
        if order.user_id != user_id {
            return Err(CoreError::Unauthorized(
                "order belongs to another user".into(),
            ));
        }
        if order.status.is_terminal() {
            return Err(CoreError::TerminalState {
                order_id,
                status: order.status,
            });
        }
        if order.status == OrderStatus::Pending {
            return Err(CoreError::InvalidRequest(
                "order is still being admitted".into(),
            ));
        }

        if self.engine.cancel(order.contract_id, order_id) {
            // Off the book: the remaining quantity is frozen, so the refund
            // computed from the updated row is exact.
            let order = self.store.update_order(order_id, |o| o.cancel(unix_nanos()))?;
            self.refund_remainder(&order)?;
            info!(%order_id, %user_id, "order cancelled");
            return Ok(order);
        }

        // Lost the race with a concurrent match: the book no longer has the
        // order. The matching thread is writing the fill; report the last
        // persisted status once it lands.
        for _ in 0..10 {
            order = self
                .store
                .order(order_id)
                .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
            if order.status.is_terminal() || order.kind == OrderKind::Market {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        info!(%order_id, status = %order.status, "cancel raced a match; reporting final status");
        Ok(order)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CoreError> {
        let order = self
            .store
            .order(order_id)
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
        if order.user_id != user_id {
            return Err(CoreError::Unauthorized(
                "order belongs to another user".into(),
            ));
        }
        Ok(order)
    }

    pub fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Vec<Order> {
        self.store.orders_for_user(user_id, status, limit)
    }

    pub fn book_snapshot(
        &self,
        contract_id: ContractId,
        depth: usize,
    ) -> Result<matching_engine::BookSnapshot, CoreError> {
        if self.store.contract(contract_id).is_none() {
            return Err(CoreError::NotFound(format!("contract {contract_id}")));
        }
        Ok(self.engine.snapshot(contract_id, depth))
    }

    pub fn balance(&self, user_id: UserId) -> Result<ledger::BalanceView, CoreError> {
        // A first touch provisions the wallet; account creation itself is
        // the auth collaborator's concern.
        self.ledger.create_wallet(user_id);
        self.ledger.balance(user_id)
    }

    pub fn deposit(&self, user_id: UserId, amount: Credits) -> Result<Credits, CoreError> {
        if amount <= Credits::ZERO {
            return Err(CoreError::InvalidRequest(
                "deposit amount must be positive".into(),
            ));
        }
        self.ledger.deposit(user_id, amount)
    }

    pub fn transactions(
        &self,
        user_id: UserId,
        kind: Option<EntryKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<types::wallet::LedgerEntry>, CoreError> {
        self.ledger.create_wallet(user_id);
        self.ledger.entries(user_id, kind, limit, offset)
    }

    // ── Recovery ────────────────────────────────────────────────────

    /// Startup repair after a crash: replay settlement for unpublished
    /// trades, restore per-contract trade sequences, and re-admit resting
    /// limit orders to their books.
    pub async fn recover(&self) -> Result<RecoveryReport, CoreError> {
        let mut report = RecoveryReport::default();

        // Trade sequences continue after the highest persisted sequence.
        for (contract_id, highest) in self.store.trade_sequence_highwater() {
            self.engine.prime(contract_id, highest + 1);
        }

        // Settlement replay: every unpublished trade either settled before
        // the crash (no-op) or settles now.
        for row in self.store.unpublished_outbox(usize::MAX) {
            let trade = self.store.trade(row.trade_id).ok_or_else(|| {
                CoreError::Invariant(format!("outbox row without trade {}", row.trade_id))
            })?;
            if !self.ledger.is_settled(trade.id) {
                self.with_retry("recovery settle", || self.settle_and_release(&trade))
                    .await?;
                report.settlements_replayed += 1;
            }
        }

        // Book reconstruction: re-admit resting remainders in arrival order.
        // A crash that split a cross re-matches here and flows through the
        // normal per-trade path.
        for stored in self.store.resting_orders() {
            let result = self.engine.submit(&stored)?;
            for trade in &result.trades {
                report.trades_from_rebuild += 1;
                if let Err(err) = self.apply_trade(trade).await {
                    error!(trade_id = %trade.id, %err, "rebuild trade dead-lettered");
                    self.dead_letters
                        .lock()
                        .expect("dead-letter set poisoned")
                        .push(trade.id);
                }
            }
            report.orders_restored += 1;
        }

        info!(
            settlements = report.settlements_replayed,
            orders = report.orders_restored,
            rebuild_trades = report.trades_from_rebuild,
            "recovery complete"
        );
        Ok(report)
    }

    // ── Retry plumbing ──────────────────────────────────────────────

    async fn with_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Err(err @ CoreError::TransientIo(_)) if attempt < self.retry_budget => {
                    attempt += 1;
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    warn!(%what, attempt, ?delay, %err, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

/// Shape checks that do not need any state.
fn validate(request: &PlaceRequest) -> Result<(), CoreError> {
    match request.kind {
        OrderKind::Limit => {
            if request.limit_price.is_none() {
                return Err(CoreError::InvalidRequest(
                    "limit orders require limit_price".into(),
                ));
            }
        }
        OrderKind::Market => {
            if request.limit_price.is_some() {
                return Err(CoreError::InvalidRequest(
                    "market orders take no limit_price".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Per-share escrow in micros.
///
/// A buyer escrows the price it may pay: the limit price, or 1.0 for a
/// market order (the maximum possible). A seller escrows the opposite
/// outcome, `1 − price`: the limit complement, or the full 1.0 for a market
/// sell whose floor is zero.
fn reserved_unit_micros(order: &Order) -> i64 {
    match (order.side, order.kind) {
        (Side::Buy, OrderKind::Limit) => order
            .limit_price
            .map(|p| p.as_micros())
            .unwrap_or(CREDIT_SCALE),
        (Side::Buy, OrderKind::Market) => CREDIT_SCALE,
        (Side::Sell, OrderKind::Limit) => order
            .limit_price
            .map(|p| p.complement_micros())
            .unwrap_or(CREDIT_SCALE),
        (Side::Sell, OrderKind::Market) => CREDIT_SCALE,
    }
}

/// Total credits held against a new order.
fn reservation_for(order: &Order) -> Credits {
    Credits::from_micros(reserved_unit_micros(order) * order.quantity.as_u64() as i64)
}
