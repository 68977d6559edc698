//! Bid (buy-side) book
//!
//! Buy orders sorted by price descending: the highest bid matches first.
//! `BTreeMap` keeps iteration deterministic; FIFO inside each level.

use std::collections::BTreeMap;

use types::ids::OrderId;
use types::numeric::{Price, Quantity};

use super::price_level::{LevelEntry, PriceLevel};
use super::BookLevel;

/// Buy side of a contract's book.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        self.levels.entry(price).or_default().insert(entry);
    }

    /// Remove an order at a known price. Returns its remaining quantity.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<Quantity> {
        let level = self.levels.get_mut(&price)?;
        let removed = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Highest bid price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop a level once matching has drained it.
    pub fn remove_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(|l| l.is_empty()) {
            self.levels.remove(&price);
        }
    }

    /// Aggregated top-of-book view, best (highest) prices first.
    pub fn depth_snapshot(&self, depth: usize) -> Vec<BookLevel> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| BookLevel {
                price: *price,
                quantity: level.total_quantity(),
                order_count: level.order_count() as u32,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Flat sum of per-order remaining quantities (snapshot cross-checks).
    pub fn total_resting(&self) -> Quantity {
        self.levels
            .values()
            .flat_map(|l| l.iter())
            .fold(Quantity::zero(), |acc, e| acc + e.remaining)
    }
}
