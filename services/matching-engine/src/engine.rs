//! Engine registry
//!
//! Owns every in-memory order book, keyed by contract id, creating books
//! lazily on first reference. Each book sits behind its own mutex, so
//! admission within one contract is strictly serialized while independent
//! contracts race freely. Books are never held across I/O; trades come back
//! to the caller for persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;
use types::errors::CoreError;
use types::ids::{ContractId, OrderId};
use types::numeric::Price;
use types::order::Order;
use types::time::unix_nanos;

use crate::book::{BookSnapshot, OrderBook};
use crate::matching::MatchResult;

/// Registry of per-contract order books.
pub struct EngineRegistry {
    books: RwLock<HashMap<ContractId, Arc<Mutex<OrderBook>>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
        }
    }

    fn book_handle(&self, contract_id: ContractId) -> Arc<Mutex<OrderBook>> {
        if let Some(book) = self
            .books
            .read()
            .expect("book registry poisoned")
            .get(&contract_id)
        {
            return book.clone();
        }
        let mut registry = self.books.write().expect("book registry poisoned");
        registry
            .entry(contract_id)
            .or_insert_with(|| {
                debug!(%contract_id, "creating order book");
                Arc::new(Mutex::new(OrderBook::new(contract_id)))
            })
            .clone()
    }

    fn existing(&self, contract_id: ContractId) -> Option<Arc<Mutex<OrderBook>>> {
        self.books
            .read()
            .expect("book registry poisoned")
            .get(&contract_id)
            .cloned()
    }

    /// Admit an order to its contract's book and return the match result.
    pub fn submit(&self, order: &Order) -> Result<MatchResult, CoreError> {
        let handle = self.book_handle(order.contract_id);
        let mut book = handle.lock().expect("order book poisoned");
        let result = book.submit(order, unix_nanos())?;
        debug!(
            order_id = %order.id,
            contract_id = %order.contract_id,
            trades = result.trades.len(),
            outcome = ?result.outcome,
            "order admitted"
        );
        Ok(result)
    }

    /// Ensure a book exists and its trade numbering continues at or after
    /// `next_sequence`. Used by recovery before re-admitting resting orders.
    pub fn prime(&self, contract_id: ContractId, next_sequence: u64) {
        let handle = self.book_handle(contract_id);
        let mut book = handle.lock().expect("order book poisoned");
        book.resume_sequence(next_sequence);
    }

    /// Remove a resting order. `false` when the order is not on the book —
    /// the caller consults the last persisted status to learn why.
    pub fn cancel(&self, contract_id: ContractId, order_id: OrderId) -> bool {
        let Some(handle) = self.existing(contract_id) else {
            return false;
        };
        let mut book = handle.lock().expect("order book poisoned");
        book.cancel(order_id)
    }

    /// Aggregated depth for one contract, as of a consistent instant. A
    /// contract with no book yet snapshots as empty on both sides.
    pub fn snapshot(&self, contract_id: ContractId, depth: usize) -> BookSnapshot {
        match self.existing(contract_id) {
            Some(handle) => handle.lock().expect("order book poisoned").snapshot(depth),
            None => BookSnapshot {
                bids: Vec::new(),
                asks: Vec::new(),
            },
        }
    }

    pub fn best_bid(&self, contract_id: ContractId) -> Option<Price> {
        self.existing(contract_id)?
            .lock()
            .expect("order book poisoned")
            .best_bid()
    }

    pub fn best_ask(&self, contract_id: ContractId) -> Option<Price> {
        self.existing(contract_id)?
            .lock()
            .expect("order book poisoned")
            .best_ask()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
