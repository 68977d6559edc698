//! Wallet and ledger-journal types
//!
//! A wallet holds `total` and `reserved` credits with the standing invariant
//! `0 ≤ reserved ≤ total`; `available = total − reserved`. Every mutation is
//! mirrored by an append-only [`LedgerEntry`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::WalletError;
use crate::ids::{EntryId, UserId};
use crate::numeric::Credits;

/// Per-user credit balance.
///
/// Exactly one wallet exists per user; wallet totals are owned exclusively by
/// the ledger component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub total: Credits,
    pub reserved: Credits,
    pub updated_at: i64, // Unix nanos
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(user_id: UserId, timestamp: i64) -> Self {
        Self {
            user_id,
            total: Credits::ZERO,
            reserved: Credits::ZERO,
            updated_at: timestamp,
        }
    }

    /// Credits not held against open orders.
    pub fn available(&self) -> Credits {
        self.total - self.reserved
    }

    /// Check the balance invariant: `0 ≤ reserved ≤ total`.
    pub fn check_invariant(&self) -> bool {
        !self.reserved.is_negative() && self.reserved <= self.total
    }

    fn require_positive(amount: Credits) -> Result<(), WalletError> {
        if amount <= Credits::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        Ok(())
    }

    /// Add to total (deposit or trade credit).
    pub fn credit(&mut self, amount: Credits, timestamp: i64) -> Result<(), WalletError> {
        Self::require_positive(amount)?;
        self.total += amount;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Remove from available total (withdrawal).
    pub fn debit(&mut self, amount: Credits, timestamp: i64) -> Result<(), WalletError> {
        Self::require_positive(amount)?;
        if amount > self.available() {
            return Err(WalletError::Insufficient {
                required: amount,
                available: self.available(),
            });
        }
        self.total -= amount;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Hold available credits against an open order.
    pub fn reserve(&mut self, amount: Credits, timestamp: i64) -> Result<(), WalletError> {
        Self::require_positive(amount)?;
        if amount > self.available() {
            return Err(WalletError::Insufficient {
                required: amount,
                available: self.available(),
            });
        }
        self.reserved += amount;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Return reserved credits to the available pool.
    pub fn release(&mut self, amount: Credits, timestamp: i64) -> Result<(), WalletError> {
        Self::require_positive(amount)?;
        if amount > self.reserved {
            return Err(WalletError::ReleaseExceedsReserved {
                amount,
                reserved: self.reserved,
            });
        }
        self.reserved -= amount;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Consume reserved credits (trade settlement debit): reserved and total
    /// both shrink by `amount`.
    pub fn debit_reserved(&mut self, amount: Credits, timestamp: i64) -> Result<(), WalletError> {
        Self::require_positive(amount)?;
        if amount > self.reserved {
            return Err(WalletError::ReleaseExceedsReserved {
                amount,
                reserved: self.reserved,
            });
        }
        self.reserved -= amount;
        self.total -= amount;
        self.updated_at = timestamp;
        if !self.check_invariant() {
            return Err(WalletError::InvariantViolated(self.user_id));
        }
        Ok(())
    }
}

/// Journal entry kind.
///
/// `Deposit`/`Withdrawal`/`TradeDebit`/`TradeCredit` move `total`;
/// `Reserve`/`Release`/`Refund` move `reserved`. `delta` is signed against
/// the balance the kind moves, so summing the total-moving deltas reproduces
/// `total` and summing the reservation-moving deltas reproduces `reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Reserve,
    Release,
    TradeDebit,
    TradeCredit,
    Refund,
}

impl EntryKind {
    /// Whether entries of this kind change `total` (as opposed to `reserved`).
    pub fn moves_total(&self) -> bool {
        matches!(
            self,
            EntryKind::Deposit
                | EntryKind::Withdrawal
                | EntryKind::TradeDebit
                | EntryKind::TradeCredit
        )
    }
}

/// Append-only journal record of one balance mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub kind: EntryKind,
    pub delta: Credits,
    /// `total` after this entry was applied.
    pub balance_after: Credits,
    /// Order id or trade id that caused the entry, if any.
    pub reference_id: Option<Uuid>,
    pub created_at: i64, // Unix nanos
}

impl LedgerEntry {
    pub fn new(
        user_id: UserId,
        kind: EntryKind,
        delta: Credits,
        balance_after: Credits,
        reference_id: Option<Uuid>,
        created_at: i64,
    ) -> Self {
        Self {
            id: EntryId::new(),
            user_id,
            kind,
            delta,
            balance_after,
            reference_id,
            created_at,
        }
    }
}
