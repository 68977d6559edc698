//! Trade types
//!
//! Trades are generated exclusively by the matching engine and are immutable
//! once written. The execution price is always the maker's resting price.

use serde::{Deserialize, Serialize};

use crate::ids::{ContractId, OrderId, TradeId, UserId};
use crate::numeric::{Credits, Price, Quantity};

/// An atomic exchange between a resting maker order and an incoming taker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub contract_id: ContractId,
    /// Per-contract monotonic sequence assigned at match time.
    pub sequence: u64,

    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,

    pub quantity: Quantity,
    /// The maker's resting limit price, never the taker's.
    pub price: Price,

    pub executed_at: i64, // Unix nanos
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contract_id: ContractId,
        sequence: u64,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_user_id: UserId,
        taker_user_id: UserId,
        quantity: Quantity,
        price: Price,
        executed_at: i64,
    ) -> Self {
        Self {
            id: TradeId::new(),
            contract_id,
            sequence,
            maker_order_id,
            taker_order_id,
            maker_user_id,
            taker_user_id,
            quantity,
            price,
            executed_at,
        }
    }

    /// Credits moved from buyer to seller: `quantity × price`.
    pub fn value(&self) -> Credits {
        self.quantity * self.price
    }

    /// Whether the same user sits on both sides. Permitted; settlement is a
    /// net-zero transfer on the user's total.
    pub fn is_self_cross(&self) -> bool {
        self.maker_user_id == self.taker_user_id
    }
}

/// Wire payload delivered to trade-event subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: TradeId,
    pub contract_id: ContractId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_user_id: UserId,
    pub quantity: Quantity,
    pub price: Price,
    pub executed_at: i64,
    pub sequence: u64,
}

impl From<&Trade> for TradeEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            contract_id: trade.contract_id,
            maker_order_id: trade.maker_order_id,
            taker_order_id: trade.taker_order_id,
            maker_user_id: trade.maker_user_id,
            taker_user_id: trade.taker_user_id,
            quantity: trade.quantity,
            price: trade.price,
            executed_at: trade.executed_at,
            sequence: trade.sequence,
        }
    }
}
