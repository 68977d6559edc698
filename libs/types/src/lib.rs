//! Shared data model for the prediction-contract exchange core
//!
//! Identifiers, fixed-point numerics, and the order/trade/wallet/contract
//! structures every service crate builds on.

pub mod contract;
pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod time;
pub mod trade;
pub mod wallet;

pub use contract::{Contract, ContractSide};
pub use errors::{CoreError, WalletError};
pub use ids::{ContractId, EntryId, MarketId, OrderId, TradeId, UserId};
pub use numeric::{Credits, Price, Quantity, CREDIT_SCALE};
pub use order::{Order, OrderKind, OrderStatus, Side};
pub use trade::{Trade, TradeEvent};
pub use wallet::{EntryKind, LedgerEntry, Wallet};
