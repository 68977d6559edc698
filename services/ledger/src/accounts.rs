//! Wallet registry and balance operations
//!
//! One wallet per user, each behind its own mutex so operations on the same
//! wallet serialize while disjoint wallets run in parallel. Settlement locks
//! both wallets in ascending user-id order. Every mutation appends a journal
//! entry under the same wallet lock, so balances and journal never diverge.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};
use types::ids::{OrderId, TradeId, UserId};
use types::numeric::{Credits, Price, Quantity};
use types::time::unix_nanos;
use types::wallet::{EntryKind, LedgerEntry, Wallet};
use types::CoreError;

/// Write-through sink for journal entries, filled by the durable store so a
/// restart can rebuild every wallet from its entry stream.
pub trait LedgerSink: Send + Sync {
    fn record(&self, entry: &LedgerEntry);
}

/// A wallet together with its slice of the journal.
struct WalletSlot {
    wallet: Wallet,
    journal: Vec<LedgerEntry>,
}

impl WalletSlot {
    fn append(
        &mut self,
        kind: EntryKind,
        delta: Credits,
        reference: Option<uuid::Uuid>,
        sink: Option<&dyn LedgerSink>,
    ) {
        let entry = LedgerEntry::new(
            self.wallet.user_id,
            kind,
            delta,
            self.wallet.total,
            reference,
            unix_nanos(),
        );
        if let Some(sink) = sink {
            sink.record(&entry);
        }
        self.journal.push(entry);
    }
}

/// Balance snapshot returned by [`Ledger::balance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceView {
    pub total: Credits,
    pub reserved: Credits,
    pub available: Credits,
}

/// The wallet ledger: sole owner of balance state.
///
/// All operations are atomic with respect to concurrent callers for the same
/// user. `settle_trade` is idempotent by trade id.
pub struct Ledger {
    wallets: RwLock<HashMap<UserId, Arc<Mutex<WalletSlot>>>>,
    settled: Mutex<HashSet<TradeId>>,
    sink: Option<Arc<dyn LedgerSink>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            settled: Mutex::new(HashSet::new()),
            sink: None,
        }
    }

    /// A ledger whose journal entries write through to `sink`.
    pub fn with_sink(sink: Arc<dyn LedgerSink>) -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            settled: Mutex::new(HashSet::new()),
            sink: Some(sink),
        }
    }

    /// Rebuild wallet state from a recovered entry stream, in append order.
    ///
    /// Balances are fully derived: total is the sum of the total-moving
    /// deltas, reserved the sum of the reservation-moving deltas. Trade ids
    /// referenced by settlement entries seed the idempotency set.
    pub fn restore(
        entries: impl IntoIterator<Item = LedgerEntry>,
        sink: Option<Arc<dyn LedgerSink>>,
    ) -> Self {
        let mut wallets: HashMap<UserId, WalletSlot> = HashMap::new();
        let mut settled = HashSet::new();

        for entry in entries {
            let slot = wallets.entry(entry.user_id).or_insert_with(|| WalletSlot {
                wallet: Wallet::new(entry.user_id, entry.created_at),
                journal: Vec::new(),
            });
            if entry.kind.moves_total() {
                slot.wallet.total += entry.delta;
            } else {
                slot.wallet.reserved += entry.delta;
            }
            slot.wallet.updated_at = entry.created_at;
            if matches!(entry.kind, EntryKind::TradeDebit | EntryKind::TradeCredit) {
                if let Some(reference) = entry.reference_id {
                    settled.insert(TradeId::from_uuid(reference));
                }
            }
            slot.journal.push(entry);
        }

        let restored = wallets.len();
        let ledger = Self {
            wallets: RwLock::new(
                wallets
                    .into_iter()
                    .map(|(user, slot)| (user, Arc::new(Mutex::new(slot))))
                    .collect(),
            ),
            settled: Mutex::new(settled),
            sink,
        };
        info!(wallets = restored, "ledger restored from journal");
        ledger
    }

    fn sink_ref(&self) -> Option<&dyn LedgerSink> {
        self.sink.as_deref()
    }

    fn slot(&self, user: UserId) -> Result<Arc<Mutex<WalletSlot>>, CoreError> {
        self.wallets
            .read()
            .expect("wallet registry poisoned")
            .get(&user)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("wallet for user {user}")))
    }

    fn slot_or_create(&self, user: UserId) -> Arc<Mutex<WalletSlot>> {
        if let Some(slot) = self
            .wallets
            .read()
            .expect("wallet registry poisoned")
            .get(&user)
        {
            return slot.clone();
        }
        let mut registry = self.wallets.write().expect("wallet registry poisoned");
        registry
            .entry(user)
            .or_insert_with(|| {
                info!(%user, "creating wallet");
                Arc::new(Mutex::new(WalletSlot {
                    wallet: Wallet::new(user, unix_nanos()),
                    journal: Vec::new(),
                }))
            })
            .clone()
    }

    /// Create the user's wallet if absent. Returns `true` when newly created.
    pub fn create_wallet(&self, user: UserId) -> bool {
        let existed = self
            .wallets
            .read()
            .expect("wallet registry poisoned")
            .contains_key(&user);
        if !existed {
            self.slot_or_create(user);
        }
        !existed
    }

    /// Credit the user's total. Creates the wallet on first deposit.
    pub fn deposit(&self, user: UserId, amount: Credits) -> Result<Credits, CoreError> {
        let slot = self.slot_or_create(user);
        let mut guard = slot.lock().expect("wallet lock poisoned");
        guard.wallet.credit(amount, unix_nanos())?;
        guard.append(EntryKind::Deposit, amount, None, self.sink_ref());
        debug!(%user, %amount, total = %guard.wallet.total, "deposit");
        Ok(guard.wallet.total)
    }

    /// Debit the user's available total.
    pub fn withdraw(&self, user: UserId, amount: Credits) -> Result<Credits, CoreError> {
        let slot = self.slot(user)?;
        let mut guard = slot.lock().expect("wallet lock poisoned");
        guard.wallet.debit(amount, unix_nanos())?;
        guard.append(EntryKind::Withdrawal, -amount, None, self.sink_ref());
        debug!(%user, %amount, total = %guard.wallet.total, "withdrawal");
        Ok(guard.wallet.total)
    }

    /// Hold `amount` against `order_id`. Fails with `INSUFFICIENT_FUNDS`
    /// when `available < amount`.
    pub fn reserve(&self, user: UserId, amount: Credits, order_id: OrderId) -> Result<(), CoreError> {
        let slot = self.slot(user)?;
        let mut guard = slot.lock().expect("wallet lock poisoned");
        guard.wallet.reserve(amount, unix_nanos())?;
        guard.append(EntryKind::Reserve, amount, Some(*order_id.as_uuid()), self.sink_ref());
        debug!(%user, %amount, %order_id, reserved = %guard.wallet.reserved, "reserve");
        Ok(())
    }

    /// Return reserved credits to the available pool (price improvement or
    /// settlement-side escrow release).
    pub fn release(&self, user: UserId, amount: Credits, order_id: OrderId) -> Result<(), CoreError> {
        self.release_kind(user, amount, order_id, EntryKind::Release)
    }

    /// Return reserved credits after a cancel, reject, or discarded market
    /// remainder.
    pub fn refund(&self, user: UserId, amount: Credits, order_id: OrderId) -> Result<(), CoreError> {
        self.release_kind(user, amount, order_id, EntryKind::Refund)
    }

    fn release_kind(
        &self,
        user: UserId,
        amount: Credits,
        order_id: OrderId,
        kind: EntryKind,
    ) -> Result<(), CoreError> {
        let slot = self.slot(user)?;
        let mut guard = slot.lock().expect("wallet lock poisoned");
        guard.wallet.release(amount, unix_nanos())?;
        guard.append(kind, -amount, Some(*order_id.as_uuid()), self.sink_ref());
        debug!(%user, %amount, %order_id, ?kind, reserved = %guard.wallet.reserved, "release");
        Ok(())
    }

    /// Move `quantity × price` from the buyer's reserved pool to the seller's
    /// total, in one transaction: either all four balance mutations and both
    /// journal entries apply, or none do.
    ///
    /// Idempotent by `trade_id`: a duplicate settle attempt is a silent
    /// no-op, reported as `Ok(false)` so callers skip their follow-up
    /// releases too.
    pub fn settle_trade(
        &self,
        buyer: UserId,
        seller: UserId,
        quantity: Quantity,
        price: Price,
        trade_id: TradeId,
    ) -> Result<bool, CoreError> {
        {
            let settled = self.settled.lock().expect("settled set poisoned");
            if settled.contains(&trade_id) {
                debug!(%trade_id, "duplicate settlement skipped");
                return Ok(false);
            }
        }

        let value = quantity * price;
        let now = unix_nanos();
        let reference = Some(*trade_id.as_uuid());

        if buyer == seller {
            // Self-cross: one wallet, net-zero on total.
            let slot = self.slot(buyer)?;
            let mut guard = slot.lock().expect("wallet lock poisoned");
            if value > guard.wallet.reserved {
                return Err(CoreError::Invariant(format!(
                    "settlement {trade_id} exceeds reservation of buyer {buyer}"
                )));
            }
            guard.wallet.debit_reserved(value, now)?;
            guard.append(EntryKind::TradeDebit, -value, reference, self.sink_ref());
            guard.wallet.credit(value, now)?;
            guard.append(EntryKind::TradeCredit, value, reference, self.sink_ref());
            self.mark_settled(trade_id);
            return Ok(true);
        }

        let buyer_slot = self.slot(buyer)?;
        let seller_slot = self.slot(seller)?;

        // Lock in ascending user-id order to prevent deadlock.
        let (first, second) = if buyer < seller {
            (&buyer_slot, &seller_slot)
        } else {
            (&seller_slot, &buyer_slot)
        };
        let mut first_guard = first.lock().expect("wallet lock poisoned");
        let mut second_guard = second.lock().expect("wallet lock poisoned");
        let (buyer_guard, seller_guard) = if buyer < seller {
            (&mut first_guard, &mut second_guard)
        } else {
            (&mut second_guard, &mut first_guard)
        };

        // Precondition check before any mutation keeps the pair atomic.
        if value > buyer_guard.wallet.reserved {
            warn!(%trade_id, %buyer, %value, reserved = %buyer_guard.wallet.reserved,
                "settlement exceeds buyer reservation");
            return Err(CoreError::Invariant(format!(
                "settlement {trade_id} exceeds reservation of buyer {buyer}"
            )));
        }

        buyer_guard.wallet.debit_reserved(value, now)?;
        buyer_guard.append(EntryKind::TradeDebit, -value, reference, self.sink_ref());
        seller_guard.wallet.credit(value, now)?;
        seller_guard.append(EntryKind::TradeCredit, value, reference, self.sink_ref());

        self.mark_settled(trade_id);
        debug!(%trade_id, %buyer, %seller, %value, "trade settled");
        Ok(true)
    }

    fn mark_settled(&self, trade_id: TradeId) {
        self.settled
            .lock()
            .expect("settled set poisoned")
            .insert(trade_id);
    }

    /// Whether `trade_id` has already been settled.
    pub fn is_settled(&self, trade_id: TradeId) -> bool {
        self.settled
            .lock()
            .expect("settled set poisoned")
            .contains(&trade_id)
    }

    /// Balance triple consistent as of the call's return.
    pub fn balance(&self, user: UserId) -> Result<BalanceView, CoreError> {
        let slot = self.slot(user)?;
        let guard = slot.lock().expect("wallet lock poisoned");
        Ok(BalanceView {
            total: guard.wallet.total,
            reserved: guard.wallet.reserved,
            available: guard.wallet.available(),
        })
    }

    /// Journal slice for the user, newest first.
    pub fn entries(
        &self,
        user: UserId,
        kind: Option<EntryKind>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>, CoreError> {
        let slot = self.slot(user)?;
        let guard = slot.lock().expect("wallet lock poisoned");
        Ok(guard
            .journal
            .iter()
            .rev()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Full journal for the user in append order (invariant checks, recovery).
    pub fn journal(&self, user: UserId) -> Result<Vec<LedgerEntry>, CoreError> {
        let slot = self.slot(user)?;
        let guard = slot.lock().expect("wallet lock poisoned");
        Ok(guard.journal.clone())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
