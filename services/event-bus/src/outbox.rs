//! Outbox relay
//!
//! Background publisher for the transactional outbox: reads unpublished rows
//! in insertion order, delivers each to every subscriber, then marks the row
//! published. A crash between delivery and the mark re-delivers on restart,
//! which is why subscribers deduplicate by trade id.

use std::sync::Arc;
use std::time::Duration;

use persistence::Store;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::subscribers::TradeSubscriber;

const DRAIN_BATCH: usize = 256;

/// Polls the outbox and fans rows out to subscribers.
pub struct OutboxPublisher {
    store: Arc<Store>,
    subscribers: Vec<Arc<dyn TradeSubscriber>>,
    poll_interval: Duration,
}

impl OutboxPublisher {
    pub fn new(store: Arc<Store>, poll_interval: Duration) -> Self {
        Self {
            store,
            subscribers: Vec::new(),
            poll_interval,
        }
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn TradeSubscriber>) {
        info!(subscriber = subscriber.name(), "subscriber registered");
        self.subscribers.push(subscriber);
    }

    /// Deliver every currently-unpublished row once. Returns rows published.
    pub async fn drain(&self) -> usize {
        let mut published = 0;
        loop {
            let batch = self.store.unpublished_outbox(DRAIN_BATCH);
            if batch.is_empty() {
                return published;
            }
            for row in batch {
                for subscriber in &self.subscribers {
                    subscriber.on_trade(&row.payload).await;
                }
                match self.store.mark_published(row.id) {
                    Ok(()) => {
                        published += 1;
                        debug!(
                            outbox_id = row.id,
                            trade_id = %row.trade_id,
                            "outbox row published"
                        );
                    }
                    Err(err) => {
                        // Leave the row for the next pass; subscribers are
                        // idempotent, so redelivery is safe.
                        error!(outbox_id = row.id, %err, "publish mark failed");
                        return published;
                    }
                }
            }
        }
    }

    /// Run the relay until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            subscribers = self.subscribers.len(),
            "outbox publisher started"
        );
        tokio::spawn(async move {
            loop {
                self.drain().await;
                tokio::time::sleep(self.poll_interval).await;
            }
        })
    }
}
