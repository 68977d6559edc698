//! Order lifecycle types
//!
//! An order is created `PENDING`, becomes `ACTIVE` (or immediately `PARTIAL`/
//! `FILLED`) on engine admission, and ends in one of the terminal states
//! `FILLED`, `CANCELLED`, `REJECTED`. Terminal states never transition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CoreError;
use crate::ids::{ContractId, OrderId, UserId};
use crate::numeric::{Price, Quantity};

/// Order side (buyer or seller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order kind: limit (rests at its price) or market (takes best available).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Limit,
    Market,
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted and funded, not yet admitted to the engine
    Pending,
    /// Resting on the book with no fills
    Active,
    /// Some quantity filled; a limit order in this state is still resting
    Partial,
    /// Completely filled (terminal)
    Filled,
    /// Cancelled by the user (terminal)
    Cancelled,
    /// Failed validation or funding (terminal)
    Rejected,
}

impl OrderStatus {
    /// Check if the status is terminal (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Active => "ACTIVE",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// A single order against one contract.
///
/// `limit_price` is `Some` iff `kind == Limit`. `created_at` is the
/// price-time tie-breaker; books additionally stamp an arrival sequence for
/// equal timestamps under coarse clocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub contract_id: ContractId,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub limit_price: Option<Price>,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Create a new pending order.
    pub fn new(
        user_id: UserId,
        contract_id: ContractId,
        kind: OrderKind,
        side: Side,
        quantity: Quantity,
        limit_price: Option<Price>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            contract_id,
            kind,
            side,
            quantity,
            filled: Quantity::zero(),
            limit_price,
            status: OrderStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Unfilled share count.
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled
    }

    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    pub fn has_fills(&self) -> bool {
        !self.filled.is_zero()
    }

    /// Status coherence check: `filled ≤ quantity` and the status matches the
    /// fill counter.
    pub fn check_invariant(&self) -> bool {
        if self.filled > self.quantity {
            return false;
        }
        match self.status {
            OrderStatus::Filled => self.is_filled(),
            OrderStatus::Partial => self.has_fills() && !self.is_filled(),
            OrderStatus::Pending | OrderStatus::Active => !self.has_fills(),
            OrderStatus::Cancelled | OrderStatus::Rejected => !self.is_filled(),
        }
    }

    /// Record a fill and move the status to `PARTIAL` or `FILLED`.
    pub fn apply_fill(&mut self, fill: Quantity, timestamp: i64) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Invariant(format!(
                "fill applied to terminal order {}",
                self.id
            )));
        }
        let new_filled = self.filled + fill;
        if new_filled > self.quantity {
            return Err(CoreError::Invariant(format!(
                "fill of {fill} overfills order {} ({} of {})",
                self.id, self.filled, self.quantity
            )));
        }
        self.filled = new_filled;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        self.updated_at = timestamp;
        Ok(())
    }

    /// Admission without fills: `PENDING → ACTIVE`.
    pub fn activate(&mut self, timestamp: i64) -> Result<(), CoreError> {
        if self.status != OrderStatus::Pending {
            return Err(CoreError::Invariant(format!(
                "cannot activate order {} from {}",
                self.id, self.status
            )));
        }
        self.status = OrderStatus::Active;
        self.updated_at = timestamp;
        Ok(())
    }

    /// User cancel of a resting order.
    pub fn cancel(&mut self, timestamp: i64) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalState {
                order_id: self.id,
                status: self.status,
            });
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Rejection before or at admission (funding failure, empty book for a
    /// market order).
    pub fn reject(&mut self, timestamp: i64) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalState {
                order_id: self.id,
                status: self.status,
            });
        }
        self.status = OrderStatus::Rejected;
        self.updated_at = timestamp;
        Ok(())
    }
}
