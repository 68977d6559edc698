//! Trade event bus
//!
//! In-process fan-out with a durable source of truth: trade rows and outbox
//! rows commit together, and a background relay delivers unpublished rows to
//! subscribers at-least-once across restarts.

pub mod outbox;
pub mod subscribers;

pub use outbox::OutboxPublisher;
pub use subscribers::{NotificationRelay, SettlementRecorder, TradeSubscriber};
