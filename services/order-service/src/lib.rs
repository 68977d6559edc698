//! Order service: lifecycle core and HTTP/WebSocket edge
//!
//! Wires the ledger, matching engine, durable store, and event bus into one
//! process. [`build_app`] assembles everything (including crash recovery);
//! the binary and the integration tests share it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod state;

use std::sync::Arc;

use event_bus::{NotificationRelay, OutboxPublisher, SettlementRecorder};
use ledger::{Ledger, LedgerSink};
use matching_engine::EngineRegistry;
use persistence::Store;
use types::wallet::LedgerEntry;
use types::CoreError;

use crate::auth::TokenVerifier;
use crate::config::ServiceConfig;
use crate::service::{OrderService, RecoveryReport};
use crate::state::AppState;

/// Write-through adapter: wallet journal entries land in the durable store.
struct StoreSink(Arc<Store>);

impl LedgerSink for StoreSink {
    fn record(&self, entry: &LedgerEntry) {
        self.0.record_ledger_entry(entry);
    }
}

/// A fully-wired application.
pub struct App {
    pub state: AppState,
    pub publisher: Arc<OutboxPublisher>,
    pub recorder: Arc<SettlementRecorder>,
    pub recovery: RecoveryReport,
}

/// Assemble the process: open (and replay) the store, restore the ledger
/// from its journal, rebuild the books, and wire the event bus.
pub async fn build_app(config: &ServiceConfig) -> Result<App, CoreError> {
    let store = Arc::new(match &config.data_dir {
        Some(dir) => Store::open(dir)?,
        None => Store::in_memory(),
    });

    let sink: Arc<dyn LedgerSink> = Arc::new(StoreSink(store.clone()));
    let ledger = Arc::new(Ledger::restore(store.ledger_entries(), Some(sink)));
    let engine = Arc::new(EngineRegistry::new());

    let service = Arc::new(OrderService::new(
        store.clone(),
        ledger.clone(),
        engine,
        config.retry_budget,
        config.retry_base,
    ));
    let recovery = service.recover().await?;

    let relay = Arc::new(NotificationRelay::new(1024));
    let recorder = Arc::new(SettlementRecorder::new(ledger));
    let mut publisher = OutboxPublisher::new(store, config.outbox_poll);
    publisher.subscribe(recorder.clone());
    publisher.subscribe(relay.clone());

    let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));
    let state = AppState::new(service, verifier, relay);

    Ok(App {
        state,
        publisher: Arc::new(publisher),
        recorder,
        recovery,
    })
}
