//! Trade construction
//!
//! Stamps each trade with the book's monotonic sequence number. Execution
//! price is the maker's resting price. A user may sit on both sides of a
//! match; the order service settles the legs either way.

use types::ids::{ContractId, OrderId, UserId};
use types::numeric::{Price, Quantity};
use types::trade::Trade;

/// Per-book monotonic trade sequence.
#[derive(Debug)]
pub struct TradeSequencer {
    next: u64,
}

impl TradeSequencer {
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    /// The sequence the next trade will carry.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Build the trade for one fill and advance the sequence.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        contract_id: ContractId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_user_id: UserId,
        taker_user_id: UserId,
        quantity: Quantity,
        price: Price,
        executed_at: i64,
    ) -> Trade {
        let sequence = self.next;
        self.next += 1;
        Trade::new(
            contract_id,
            sequence,
            maker_order_id,
            taker_order_id,
            maker_user_id,
            taker_user_id,
            quantity,
            price,
            executed_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let mut sequencer = TradeSequencer::new(1000);
        let contract = ContractId::new();
        let t1 = sequencer.execute(
            contract,
            OrderId::new(),
            OrderId::new(),
            UserId::new(),
            UserId::new(),
            Quantity::new(1),
            Price::new(500_000),
            1,
        );
        let t2 = sequencer.execute(
            contract,
            OrderId::new(),
            OrderId::new(),
            UserId::new(),
            UserId::new(),
            Quantity::new(1),
            Price::new(500_000),
            2,
        );
        assert_eq!(t1.sequence, 1000);
        assert_eq!(t2.sequence, 1001);
        assert_eq!(sequencer.peek(), 1002);
    }

    #[test]
    fn same_user_both_sides_is_permitted() {
        let mut sequencer = TradeSequencer::new(1);
        let user = UserId::new();
        let trade = sequencer.execute(
            ContractId::new(),
            OrderId::new(),
            OrderId::new(),
            user,
            user,
            Quantity::new(5),
            Price::new(250_000),
            1,
        );
        assert!(trade.is_self_cross());
    }
}
