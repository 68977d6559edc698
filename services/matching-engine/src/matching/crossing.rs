//! Price-cross predicates
//!
//! All comparisons run on fixed-point integers. A market taker never stops
//! on price; it walks the opposite side until filled or the side is empty.

use types::numeric::Price;
use types::order::{OrderKind, Side};

/// Whether a resting bid and a resting ask price cross.
pub fn prices_cross(bid: Price, ask: Price) -> bool {
    bid >= ask
}

/// Whether the incoming taker can trade against the best opposite price.
pub fn taker_crosses(
    kind: OrderKind,
    limit_price: Option<Price>,
    side: Side,
    maker_price: Price,
) -> bool {
    match kind {
        OrderKind::Market => true,
        OrderKind::Limit => {
            let Some(limit) = limit_price else {
                return false;
            };
            match side {
                Side::Buy => limit >= maker_price,
                Side::Sell => limit <= maker_price,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_buy_crosses_at_or_above_ask() {
        let ask = Price::new(400_000);
        assert!(taker_crosses(OrderKind::Limit, Some(Price::new(400_000)), Side::Buy, ask));
        assert!(taker_crosses(OrderKind::Limit, Some(Price::new(500_000)), Side::Buy, ask));
        assert!(!taker_crosses(OrderKind::Limit, Some(Price::new(399_999)), Side::Buy, ask));
    }

    #[test]
    fn limit_sell_crosses_at_or_below_bid() {
        let bid = Price::new(400_000);
        assert!(taker_crosses(OrderKind::Limit, Some(Price::new(400_000)), Side::Sell, bid));
        assert!(taker_crosses(OrderKind::Limit, Some(Price::new(300_000)), Side::Sell, bid));
        assert!(!taker_crosses(OrderKind::Limit, Some(Price::new(400_001)), Side::Sell, bid));
    }

    #[test]
    fn market_orders_never_stop_on_price() {
        assert!(taker_crosses(OrderKind::Market, None, Side::Buy, Price::new(1)));
        assert!(taker_crosses(OrderKind::Market, None, Side::Sell, Price::MAX));
    }

    #[test]
    fn resting_cross_check() {
        assert!(prices_cross(Price::new(400_000), Price::new(400_000)));
        assert!(!prices_cross(Price::new(300_000), Price::new(400_000)));
    }
}
