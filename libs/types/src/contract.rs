//! Binary contract descriptor

use serde::{Deserialize, Serialize};

use crate::ids::{ContractId, MarketId};

/// Which resolution of the parent market this share class pays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractSide {
    Yes,
    No,
}

/// One tradable YES or NO share class of a market.
///
/// The engine matches each contract independently; only the id matters there.
/// `closed` gates new-order admission once the market expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub market_id: MarketId,
    pub side: ContractSide,
    pub closed: bool,
    pub created_at: i64, // Unix nanos
}

impl Contract {
    pub fn new(market_id: MarketId, side: ContractSide, timestamp: i64) -> Self {
        Self {
            id: ContractId::new(),
            market_id,
            side,
            closed: false,
            created_at: timestamp,
        }
    }
}
