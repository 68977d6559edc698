//! Authoritative store
//!
//! Typed tables for contracts, orders, trades, the transactional outbox, and
//! the wallet-journal mirror. Every mutation is appended to the write-ahead
//! log before the tables change; opening a store replays the log. The trade
//! row and its outbox row are written in a single log frame, so an event can
//! never exist without its trade nor a trade without its event.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use types::contract::Contract;
use types::errors::CoreError;
use types::ids::{ContractId, OrderId, TradeId, UserId};
use types::order::{Order, OrderStatus};
use types::time::unix_nanos;
use types::trade::{Trade, TradeEvent};
use types::wallet::LedgerEntry;

use crate::journal::{WalConfig, WalError, WalWriter};
use crate::reader;

/// One row of the durable outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRow {
    pub id: u64,
    pub trade_id: TradeId,
    pub payload: TradeEvent,
    /// `None` until the background publisher delivers the event.
    pub published_at: Option<i64>,
}

/// Every mutation the store can journal and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreEvent {
    ContractUpserted(Contract),
    OrderUpserted(Order),
    /// One trade's transaction: both order rows after the fill, the trade
    /// row, and its outbox row.
    TradeApplied {
        maker: Order,
        taker: Order,
        trade: Trade,
        outbox_id: u64,
    },
    OutboxPublished {
        outbox_id: u64,
        published_at: i64,
    },
    LedgerEntryRecorded(LedgerEntry),
}

#[derive(Default)]
struct Tables {
    contracts: HashMap<ContractId, Contract>,
    orders: HashMap<OrderId, Order>,
    trades: HashMap<TradeId, Trade>,
    outbox: BTreeMap<u64, OutboxRow>,
    ledger_entries: Vec<LedgerEntry>,
    next_outbox_id: u64,
}

impl Tables {
    fn new() -> Self {
        Self {
            next_outbox_id: 1,
            ..Self::default()
        }
    }

    /// Apply one event; used identically at runtime and during replay.
    fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::ContractUpserted(contract) => {
                self.contracts.insert(contract.id, contract.clone());
            }
            StoreEvent::OrderUpserted(order) => {
                self.orders.insert(order.id, order.clone());
            }
            StoreEvent::TradeApplied {
                maker,
                taker,
                trade,
                outbox_id,
            } => {
                self.orders.insert(maker.id, maker.clone());
                self.orders.insert(taker.id, taker.clone());
                self.trades.insert(trade.id, trade.clone());
                self.outbox.insert(
                    *outbox_id,
                    OutboxRow {
                        id: *outbox_id,
                        trade_id: trade.id,
                        payload: TradeEvent::from(trade),
                        published_at: None,
                    },
                );
                self.next_outbox_id = self.next_outbox_id.max(outbox_id + 1);
            }
            StoreEvent::OutboxPublished {
                outbox_id,
                published_at,
            } => match self.outbox.get_mut(outbox_id) {
                Some(row) => row.published_at = Some(*published_at),
                None => warn!(outbox_id, "published mark for unknown outbox row"),
            },
            StoreEvent::LedgerEntryRecorded(entry) => {
                self.ledger_entries.push(entry.clone());
            }
        }
    }
}

struct StoreInner {
    tables: Tables,
    wal: Option<WalWriter>,
}

/// Durable store handle; cheap to share behind an `Arc`.
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    /// Open (or create) a store at `dir`, replaying the write-ahead log.
    pub fn open(dir: &Path) -> Result<Self, CoreError> {
        let scan = reader::scan_dir(dir).map_err(wal_to_core)?;
        let mut tables = Tables::new();
        let mut undecodable = 0usize;
        for record in &scan.records {
            match bincode::deserialize::<StoreEvent>(&record.payload) {
                Ok(event) => tables.apply(&event),
                Err(err) => {
                    undecodable += 1;
                    warn!(sequence = record.sequence, %err, "skipping undecodable event");
                }
            }
        }
        info!(
            orders = tables.orders.len(),
            trades = tables.trades.len(),
            outbox = tables.outbox.len(),
            ledger_entries = tables.ledger_entries.len(),
            undecodable,
            "store recovered"
        );

        let wal = WalWriter::open(WalConfig::new(dir), scan.next_sequence()).map_err(wal_to_core)?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                tables,
                wal: Some(wal),
            }),
        })
    }

    /// A store without a write-ahead log. State dies with the process.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                tables: Tables::new(),
                wal: None,
            }),
        }
    }

    /// Journal then apply: the write-ahead step fails the whole mutation, so
    /// tables never run ahead of the log.
    fn commit(inner: &mut StoreInner, event: StoreEvent) -> Result<(), CoreError> {
        if let Some(wal) = inner.wal.as_mut() {
            let payload = bincode::serialize(&event)
                .map_err(|e| CoreError::Invariant(format!("event encode failed: {e}")))?;
            wal.append(payload).map_err(wal_to_core)?;
        }
        inner.tables.apply(&event);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store lock poisoned")
    }

    // ── Contracts ───────────────────────────────────────────────────

    pub fn upsert_contract(&self, contract: &Contract) -> Result<(), CoreError> {
        let mut inner = self.lock();
        Self::commit(&mut inner, StoreEvent::ContractUpserted(contract.clone()))
    }

    pub fn contract(&self, id: ContractId) -> Option<Contract> {
        self.lock().tables.contracts.get(&id).cloned()
    }

    // ── Orders ──────────────────────────────────────────────────────

    /// Insert or fully replace an order row.
    pub fn put_order(&self, order: &Order) -> Result<(), CoreError> {
        let mut inner = self.lock();
        Self::commit(&mut inner, StoreEvent::OrderUpserted(order.clone()))
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.lock().tables.orders.get(&id).cloned()
    }

    /// A user's orders, newest first, optionally filtered by status.
    pub fn orders_for_user(
        &self,
        user: UserId,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Vec<Order> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .tables
            .orders
            .values()
            .filter(|o| o.user_id == user)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse((o.created_at, o.id)));
        orders.truncate(limit);
        orders
    }

    /// Limit orders still resting on a book (`ACTIVE` or `PARTIAL`), in
    /// arrival order. Recovery re-admits exactly this set.
    pub fn resting_orders(&self) -> Vec<Order> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .tables
            .orders
            .values()
            .filter(|o| {
                matches!(o.status, OrderStatus::Active | OrderStatus::Partial)
                    && matches!(o.kind, types::order::OrderKind::Limit)
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        orders
    }

    /// Highest persisted trade sequence per contract.
    pub fn trade_sequence_highwater(&self) -> HashMap<ContractId, u64> {
        let inner = self.lock();
        let mut highwater: HashMap<ContractId, u64> = HashMap::new();
        for trade in inner.tables.trades.values() {
            let entry = highwater.entry(trade.contract_id).or_insert(0);
            *entry = (*entry).max(trade.sequence);
        }
        highwater
    }

    // ── Trades & outbox ─────────────────────────────────────────────

    /// Atomically update one order row under the store lock. The closure's
    /// error aborts the update; nothing is journaled or changed.
    pub fn update_order(
        &self,
        order_id: OrderId,
        mutate: impl FnOnce(&mut Order) -> Result<(), CoreError>,
    ) -> Result<Order, CoreError> {
        let mut inner = self.lock();
        let mut order = inner
            .tables
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;
        mutate(&mut order)?;
        Self::commit(&mut inner, StoreEvent::OrderUpserted(order.clone()))?;
        Ok(order)
    }

    /// Persist one trade's transaction: the fill applied to both order rows,
    /// the immutable trade row, and its outbox row — one log frame, all or
    /// nothing, under one lock so concurrent fills of the same maker cannot
    /// lose updates. Returns the rows after the fill, or `None` when the
    /// trade id is already present (idempotent replay).
    pub fn apply_trade(&self, trade: &Trade) -> Result<Option<(Order, Order)>, CoreError> {
        let mut inner = self.lock();
        if inner.tables.trades.contains_key(&trade.id) {
            return Ok(None);
        }
        let mut maker = inner
            .tables
            .orders
            .get(&trade.maker_order_id)
            .cloned()
            .ok_or_else(|| {
                CoreError::Invariant(format!("maker order {} missing", trade.maker_order_id))
            })?;
        let mut taker = inner
            .tables
            .orders
            .get(&trade.taker_order_id)
            .cloned()
            .ok_or_else(|| {
                CoreError::Invariant(format!("taker order {} missing", trade.taker_order_id))
            })?;
        maker.apply_fill(trade.quantity, trade.executed_at)?;
        taker.apply_fill(trade.quantity, trade.executed_at)?;

        let outbox_id = inner.tables.next_outbox_id;
        Self::commit(
            &mut inner,
            StoreEvent::TradeApplied {
                maker: maker.clone(),
                taker: taker.clone(),
                trade: trade.clone(),
                outbox_id,
            },
        )?;
        Ok(Some((maker, taker)))
    }

    pub fn trade(&self, id: TradeId) -> Option<Trade> {
        self.lock().tables.trades.get(&id).cloned()
    }

    /// Trades on one contract in sequence order.
    pub fn trades_for_contract(&self, contract_id: ContractId) -> Vec<Trade> {
        let inner = self.lock();
        let mut trades: Vec<Trade> = inner
            .tables
            .trades
            .values()
            .filter(|t| t.contract_id == contract_id)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.sequence);
        trades
    }

    /// Outbox rows not yet delivered, in insertion order.
    pub fn unpublished_outbox(&self, limit: usize) -> Vec<OutboxRow> {
        let inner = self.lock();
        inner
            .tables
            .outbox
            .values()
            .filter(|row| row.published_at.is_none())
            .take(limit)
            .cloned()
            .collect()
    }

    /// Mark one outbox row delivered.
    pub fn mark_published(&self, outbox_id: u64) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if !inner.tables.outbox.contains_key(&outbox_id) {
            return Err(CoreError::NotFound(format!("outbox row {outbox_id}")));
        }
        Self::commit(
            &mut inner,
            StoreEvent::OutboxPublished {
                outbox_id,
                published_at: unix_nanos(),
            },
        )
    }

    // ── Wallet journal mirror ───────────────────────────────────────

    /// Write-through from the ledger. Append failures are logged, not
    /// surfaced: the balance operation has already committed in memory and
    /// the journal gap is repaired by operator replay, not by failing trades.
    pub fn record_ledger_entry(&self, entry: &LedgerEntry) {
        let mut inner = self.lock();
        if let Err(err) = Self::commit(&mut inner, StoreEvent::LedgerEntryRecorded(entry.clone())) {
            error!(user = %entry.user_id, %err, "ledger entry lost from write-ahead log");
        }
    }

    /// All recovered wallet-journal entries in append order.
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.lock().tables.ledger_entries.clone()
    }

    /// Row counts for health reporting: (orders, trades, unpublished outbox).
    pub fn stats(&self) -> (usize, usize, usize) {
        let inner = self.lock();
        let unpublished = inner
            .tables
            .outbox
            .values()
            .filter(|r| r.published_at.is_none())
            .count();
        (
            inner.tables.orders.len(),
            inner.tables.trades.len(),
            unpublished,
        )
    }
}

fn wal_to_core(err: WalError) -> CoreError {
    CoreError::TransientIo(err.to_string())
}
