//! Error taxonomy for the trading core
//!
//! Typed values propagated through every component and mapped to HTTP status
//! codes at the edge. Only `TransientIo` is retryable; `Invariant` is fatal
//! and its details never cross the service boundary.

use thiserror::Error;

use crate::ids::{ContractId, OrderId, UserId};
use crate::numeric::Credits;
use crate::order::OrderStatus;

/// Top-level error for all core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Credits,
        available: Credits,
    },

    #[error("order {order_id} already in terminal state {status}")]
    TerminalState {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("contract {0} is closed to new orders")]
    ContractClosed(ContractId),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("transient io failure: {0}")]
    TransientIo(String),
}

impl CoreError {
    /// Stable machine-readable code; the only error detail that crosses the
    /// service boundary together with the display message.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CoreError::TerminalState { .. } => "TERMINAL_STATE",
            CoreError::ContractClosed(_) => "CONTRACT_CLOSED",
            CoreError::Invariant(_) => "INVARIANT_VIOLATION",
            CoreError::TransientIo(_) => "TRANSIENT_IO",
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::TransientIo(_))
    }
}

/// Wallet-level failures raised by balance mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("insufficient available funds: required {required}, available {available}")]
    Insufficient {
        required: Credits,
        available: Credits,
    },

    #[error("release of {amount} exceeds reserved {reserved}")]
    ReleaseExceedsReserved { amount: Credits, reserved: Credits },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Credits),

    #[error("balance invariant violated for user {0}")]
    InvariantViolated(UserId),
}

impl From<WalletError> for CoreError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Insufficient {
                required,
                available,
            } => CoreError::InsufficientFunds {
                required,
                available,
            },
            other => CoreError::Invariant(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_maps_from_wallet_error() {
        let err = WalletError::Insufficient {
            required: Credits::from_whole(5),
            available: Credits::from_whole(1),
        };
        let core: CoreError = err.into();
        assert_eq!(core.code(), "INSUFFICIENT_FUNDS");
        assert!(!core.is_retryable());
    }

    #[test]
    fn invariant_breaches_are_fatal_not_insufficient() {
        let err = WalletError::ReleaseExceedsReserved {
            amount: Credits::from_whole(5),
            reserved: Credits::from_whole(1),
        };
        let core: CoreError = err.into();
        assert_eq!(core.code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn only_transient_io_is_retryable() {
        assert!(CoreError::TransientIo("db".into()).is_retryable());
        assert!(!CoreError::InvalidRequest("bad".into()).is_retryable());
        assert!(!CoreError::Invariant("broken".into()).is_retryable());
    }

    #[test]
    fn display_includes_amounts() {
        let err = CoreError::InsufficientFunds {
            required: Credits::from_whole(5),
            available: Credits::from_whole(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("5.000000"));
        assert!(msg.contains("1.000000"));
    }
}
