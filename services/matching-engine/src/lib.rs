//! Matching engine for binary prediction contracts
//!
//! One order book per contract, strict price-time priority, maker-price
//! execution. The [`EngineRegistry`] is the single entry point: it resolves
//! the book for a contract, serializes admission within it, and hands the
//! resulting trades back to the caller for settlement and persistence.

pub mod book;
pub mod engine;
pub mod matching;

pub use book::{BookLevel, BookSnapshot, OrderBook};
pub use engine::EngineRegistry;
pub use matching::{MatchResult, SubmitOutcome};
