//! Trade event subscribers
//!
//! Delivery is at-least-once, so every subscriber is idempotent keyed by
//! trade id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledger::Ledger;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use types::ids::TradeId;
use types::trade::TradeEvent;

/// A consumer of published trade events.
#[async_trait]
pub trait TradeSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_trade(&self, event: &TradeEvent);
}

/// Records settlement completion for every published trade.
///
/// Settlement runs before publication, so a published trade whose id the
/// ledger does not recognize points at a broken recovery path.
pub struct SettlementRecorder {
    ledger: Arc<Ledger>,
    confirmed: Mutex<HashSet<TradeId>>,
}

impl SettlementRecorder {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            confirmed: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_confirmed(&self, trade_id: TradeId) -> bool {
        self.confirmed
            .lock()
            .expect("confirmation set poisoned")
            .contains(&trade_id)
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed
            .lock()
            .expect("confirmation set poisoned")
            .len()
    }
}

#[async_trait]
impl TradeSubscriber for SettlementRecorder {
    fn name(&self) -> &'static str {
        "settlement-recorder"
    }

    async fn on_trade(&self, event: &TradeEvent) {
        if !self.ledger.is_settled(event.trade_id) {
            warn!(trade_id = %event.trade_id, "published trade has no settlement");
            return;
        }
        let newly = self
            .confirmed
            .lock()
            .expect("confirmation set poisoned")
            .insert(event.trade_id);
        if newly {
            debug!(trade_id = %event.trade_id, sequence = event.sequence, "settlement confirmed");
        }
    }
}

/// Fans published trades out to live WebSocket sessions.
///
/// Each connection subscribes to the broadcast side and filters for its own
/// user; a lagging consumer drops old events rather than stalling the bus.
pub struct NotificationRelay {
    tx: broadcast::Sender<TradeEvent>,
}

impl NotificationRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl TradeSubscriber for NotificationRelay {
    fn name(&self) -> &'static str {
        "notification-relay"
    }

    async fn on_trade(&self, event: &TradeEvent) {
        // No receivers is fine; nobody is connected.
        let _ = self.tx.send(event.clone());
    }
}
