//! Wallet ledger service
//!
//! Sole owner of per-user credit balances. Funds open orders through
//! reservations and settles matched trades atomically; every balance change
//! lands in an append-only journal.

pub mod accounts;

pub use accounts::{BalanceView, Ledger, LedgerSink};
