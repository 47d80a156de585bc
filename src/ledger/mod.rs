//! Points ledger store.
//!
//! Owns every account's cached balance and its append-only event history.
//! A balance and its log mutate together inside one critical section, so
//! no caller can observe one without the other; different accounts are
//! independent and mutate concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::Points;
use crate::model::{AccountId, Cursor, LedgerEvent, Reason};

mod account;
use account::AccountState;
pub use account::AccountSnapshot;

mod error;
pub use error::LedgerError;

/// One page of an account's history, newest first.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub events: Vec<LedgerEvent>,
    /// Cursor to resume from, or None when the history is exhausted.
    pub next: Option<Cursor>,
}

/// The ledger store.
///
/// The account map is read-mostly; each account's state sits behind its
/// own mutex, which is the unit of mutual exclusion for every
/// balance-affecting operation.
pub struct Ledger {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountState>>>>,
    next_event_id: AtomicU64,
}

/// Public API
impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Register an account with a zero balance.
    pub fn open(&self, account: AccountId) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&account) {
            return Err(LedgerError::AccountExists(account));
        }
        accounts.insert(account, Arc::new(Mutex::new(AccountState::new())));
        Ok(())
    }

    /// Soft-disable an account. Accounts are never removed; a disabled
    /// account keeps its history but rejects further appends.
    pub fn disable(&self, account: AccountId) -> Result<(), LedgerError> {
        let handle = self.handle(account)?;
        let mut state = handle.lock();
        state.disabled = true;
        state.version += 1;
        Ok(())
    }

    /// Re-enable a disabled account.
    pub fn enable(&self, account: AccountId) -> Result<(), LedgerError> {
        let handle = self.handle(account)?;
        let mut state = handle.lock();
        state.disabled = false;
        state.version += 1;
        Ok(())
    }

    /// Append one event and update the cached balance, atomically.
    ///
    /// A debit that would drive the balance below zero fails with
    /// `InsufficientBalance` and leaves the account untouched.
    pub fn append(
        &self,
        account: AccountId,
        delta: Points,
        reason: Reason,
        description: &str,
        related: Option<u64>,
    ) -> Result<LedgerEvent, LedgerError> {
        let handle = self.handle(account)?;
        let mut state = handle.lock();
        self.commit(account, &mut state, delta, reason, description, related)
    }

    /// Move `amount` points from one account to another, committing both
    /// events or neither. `amount` must be positive.
    ///
    /// Locks are taken in ascending account-id order so this can never
    /// deadlock against another multi-account operation.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Points,
        description: &str,
        related: Option<u64>,
    ) -> Result<(LedgerEvent, LedgerEvent), LedgerError> {
        debug_assert!(amount.is_credit(), "transfer amount must be positive");
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }

        let from_handle = self.handle(from)?;
        let to_handle = self.handle(to)?;

        let (mut low, mut high) = if from < to {
            (from_handle.lock(), to_handle.lock())
        } else {
            (to_handle.lock(), from_handle.lock())
        };
        let (from_state, to_state) = if from < to {
            (&mut *low, &mut *high)
        } else {
            (&mut *high, &mut *low)
        };

        // Validate both sides before touching either, so the two commits
        // below cannot fail halfway.
        if from_state.disabled {
            return Err(LedgerError::AccountDisabled(from));
        }
        if to_state.disabled {
            return Err(LedgerError::AccountDisabled(to));
        }
        if from_state.balance - amount < Points::ZERO {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                balance: from_state.balance,
                requested: -amount,
            });
        }

        let debit = self.commit(
            from,
            from_state,
            -amount,
            Reason::SwapCompletedDebit,
            description,
            related,
        )?;
        let credit = self.commit(
            to,
            to_state,
            amount,
            Reason::SwapCompletedCredit,
            description,
            related,
        )?;
        Ok((debit, credit))
    }

    /// Cached balance. O(1), never recomputed from history.
    pub fn balance(&self, account: AccountId) -> Result<Points, LedgerError> {
        Ok(self.handle(account)?.lock().balance)
    }

    /// Current version counter of an account.
    pub fn version(&self, account: AccountId) -> Result<u64, LedgerError> {
        Ok(self.handle(account)?.lock().version)
    }

    /// Point-in-time view of one account.
    pub fn snapshot(&self, account: AccountId) -> Result<AccountSnapshot, LedgerError> {
        let handle = self.handle(account)?;
        let state = handle.lock();
        Ok(AccountSnapshot {
            account,
            balance: state.balance,
            version: state.version,
            disabled: state.disabled,
        })
    }

    /// Snapshots of every account, ordered by account id.
    pub fn accounts(&self) -> Vec<AccountSnapshot> {
        let accounts = self.accounts.read();
        let mut snapshots: Vec<AccountSnapshot> = accounts
            .iter()
            .map(|(&account, handle)| {
                let state = handle.lock();
                AccountSnapshot {
                    account,
                    balance: state.balance,
                    version: state.version,
                    disabled: state.disabled,
                }
            })
            .collect();
        snapshots.sort_by_key(|s| s.account);
        snapshots
    }

    /// One page of an account's history, newest first, resuming from
    /// `cursor`. Restartable: any returned cursor can be fed back later.
    pub fn history(
        &self,
        account: AccountId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<HistoryPage, LedgerError> {
        let handle = self.handle(account)?;
        let state = handle.lock();

        let events: Vec<LedgerEvent> = state
            .events
            .iter()
            .rev()
            .filter(|e| cursor.is_none_or(|c| c.admits(e)))
            .take(limit)
            .cloned()
            .collect();

        let next = events
            .last()
            .map(Cursor::of)
            .filter(|c| state.events.iter().any(|e| c.admits(e)));

        Ok(HistoryPage { events, next })
    }
}

/// Private API
impl Ledger {
    fn handle(&self, account: AccountId) -> Result<Arc<Mutex<AccountState>>, LedgerError> {
        self.accounts
            .read()
            .get(&account)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account))
    }

    /// Write one event and the matching balance update. Callers hold the
    /// account lock; the event id is drawn under it, so per-account id
    /// order equals commit order.
    fn commit(
        &self,
        account: AccountId,
        state: &mut AccountState,
        delta: Points,
        reason: Reason,
        description: &str,
        related: Option<u64>,
    ) -> Result<LedgerEvent, LedgerError> {
        if state.disabled {
            return Err(LedgerError::AccountDisabled(account));
        }
        if delta.is_debit() && state.balance + delta < Points::ZERO {
            return Err(LedgerError::InsufficientBalance {
                account,
                balance: state.balance,
                requested: delta,
            });
        }

        let event = LedgerEvent {
            event_id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            account_id: account,
            delta,
            reason,
            description: description.to_string(),
            created_at: Utc::now(),
            related_entity_id: related,
        };

        state.events.push(event.clone());
        state.balance += delta;
        state.version += 1;
        Ok(event)
    }

    /// Cached balance, recomputed balance and version, read in one
    /// critical section. Reconciler input.
    pub(crate) fn inspect(&self, account: AccountId) -> Result<(Points, Points, u64), LedgerError> {
        let handle = self.handle(account)?;
        let state = handle.lock();
        Ok((state.balance, state.computed_balance(), state.version))
    }

    /// Backfill the event the log is missing so that the log sum matches
    /// the cached balance again. The cache is left as-is: the drift is
    /// recorded as an explicit adjustment, never papered over by
    /// rewriting history.
    ///
    /// Fails with `VersionConflict` if the account changed since the
    /// caller inspected it.
    pub(crate) fn reconcile_commit(
        &self,
        account: AccountId,
        expected_version: u64,
    ) -> Result<Option<LedgerEvent>, LedgerError> {
        let handle = self.handle(account)?;
        let mut state = handle.lock();
        if state.version != expected_version {
            return Err(LedgerError::VersionConflict {
                account,
                expected: expected_version,
                actual: state.version,
            });
        }

        let cached = state.balance;
        let computed = state.computed_balance();
        if cached == computed {
            return Ok(None);
        }

        let event = LedgerEvent {
            event_id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            account_id: account,
            delta: cached - computed,
            reason: Reason::AdminAdjustment,
            description: format!("Balance reconciliation: cached {cached}, ledger sum {computed}"),
            created_at: Utc::now(),
            related_entity_id: None,
        };
        state.events.push(event.clone());
        state.version += 1;
        Ok(Some(event))
    }

    /// Overwrite a cached balance without recording an event, simulating
    /// external tampering or a crashed half-commit.
    #[cfg(test)]
    pub(crate) fn corrupt_balance(&self, account: AccountId, balance: Points) {
        let handle = self.handle(account).expect("account must exist");
        handle.lock().balance = balance;
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    fn award(ledger: &Ledger, account: AccountId, delta: i64) -> Result<LedgerEvent, LedgerError> {
        ledger.append(
            account,
            Points::new(delta),
            Reason::AdminAdjustment,
            "test award",
            None,
        )
    }

    #[test]
    fn open_creates_account_with_zero_balance() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();

        assert_eq!(ledger.balance(1).unwrap(), Points::ZERO);
        assert_eq!(ledger.version(1).unwrap(), 0);
    }

    #[test]
    fn open_twice_fails() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();

        let result = ledger.open(1);
        assert!(matches!(result, Err(LedgerError::AccountExists(1))));
    }

    #[test]
    fn append_updates_balance_and_version_together() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();

        let event = ledger
            .append(
                1,
                Points::new(10),
                Reason::ListingCreated,
                "Created new listing: wool coat",
                Some(7),
            )
            .unwrap();

        assert_eq!(event.account_id, 1);
        assert_eq!(event.delta, Points::new(10));
        assert_eq!(event.reason, Reason::ListingCreated);
        assert_eq!(event.related_entity_id, Some(7));
        assert_eq!(ledger.balance(1).unwrap(), Points::new(10));
        assert_eq!(ledger.version(1).unwrap(), 1);
    }

    #[test]
    fn append_to_unknown_account_fails() {
        let ledger = Ledger::new();
        let result = award(&ledger, 99, 10);
        assert!(matches!(result, Err(LedgerError::AccountNotFound(99))));
    }

    #[test]
    fn debit_to_exactly_zero_succeeds() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 10).unwrap();
        award(&ledger, 1, -10).unwrap();

        assert_eq!(ledger.balance(1).unwrap(), Points::ZERO);
    }

    #[test]
    fn overdraw_fails_and_leaves_account_untouched() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 10).unwrap();

        let result = award(&ledger, 1, -11);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { account: 1, .. })
        ));

        assert_eq!(ledger.balance(1).unwrap(), Points::new(10));
        assert_eq!(ledger.version(1).unwrap(), 1);
        let page = ledger.history(1, None, 10).unwrap();
        assert_eq!(page.events.len(), 1);
    }

    #[test]
    fn disabled_account_rejects_appends() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 10).unwrap();
        ledger.disable(1).unwrap();

        let result = award(&ledger, 1, 5);
        assert!(matches!(result, Err(LedgerError::AccountDisabled(1))));

        // Re-enabling restores service; the history survived the toggle.
        ledger.enable(1).unwrap();
        award(&ledger, 1, 5).unwrap();
        assert_eq!(ledger.balance(1).unwrap(), Points::new(15));
    }

    #[test]
    fn event_ids_increase_in_commit_order() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();

        let first = award(&ledger, 1, 1).unwrap();
        let second = award(&ledger, 1, 2).unwrap();
        let third = award(&ledger, 1, 3).unwrap();

        assert!(first.event_id < second.event_id);
        assert!(second.event_id < third.event_id);
    }

    #[test]
    fn history_is_newest_first() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 1).unwrap();
        award(&ledger, 1, 2).unwrap();
        award(&ledger, 1, 3).unwrap();

        let page = ledger.history(1, None, 10).unwrap();
        let deltas: Vec<i64> = page.events.iter().map(|e| e.delta.get()).collect();
        assert_eq!(deltas, vec![3, 2, 1]);
        assert!(page.next.is_none());
    }

    #[test]
    fn history_pages_cover_everything_without_duplicates() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        for i in 1..=7 {
            award(&ledger, 1, i).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = ledger.history(1, cursor, 3).unwrap();
            seen.extend(page.events.iter().map(|e| e.event_id));
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 7);
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 7, "pages must not overlap");
        assert!(seen.windows(2).all(|w| w[0] > w[1]), "newest first across pages");
    }

    #[test]
    fn history_cursor_is_restartable() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        for i in 1..=4 {
            award(&ledger, 1, i).unwrap();
        }

        let first = ledger.history(1, None, 2).unwrap();
        let resume = first.next.unwrap();

        // Same cursor, same page, even after new appends.
        award(&ledger, 1, 99).unwrap();
        let second = ledger.history(1, Some(resume), 2).unwrap();
        let deltas: Vec<i64> = second.events.iter().map(|e| e.delta.get()).collect();
        assert_eq!(deltas, vec![2, 1]);
    }

    #[test]
    fn transfer_moves_points_and_records_both_sides() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        ledger.open(2).unwrap();
        award(&ledger, 1, 20).unwrap();

        let (debit, credit) = ledger
            .transfer(1, 2, Points::new(15), "swap settlement", Some(42))
            .unwrap();

        assert_eq!(debit.delta, Points::new(-15));
        assert_eq!(debit.reason, Reason::SwapCompletedDebit);
        assert_eq!(credit.delta, Points::new(15));
        assert_eq!(credit.reason, Reason::SwapCompletedCredit);
        assert_eq!(credit.related_entity_id, Some(42));
        assert_eq!(ledger.balance(1).unwrap(), Points::new(5));
        assert_eq!(ledger.balance(2).unwrap(), Points::new(15));
    }

    #[test]
    fn transfer_with_insufficient_balance_touches_neither_account() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        ledger.open(2).unwrap();
        award(&ledger, 1, 5).unwrap();

        let result = ledger.transfer(1, 2, Points::new(10), "swap settlement", None);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { account: 1, .. })
        ));

        assert_eq!(ledger.balance(1).unwrap(), Points::new(5));
        assert_eq!(ledger.balance(2).unwrap(), Points::ZERO);
        assert!(ledger.history(2, None, 10).unwrap().events.is_empty());
    }

    #[test]
    fn transfer_to_disabled_account_touches_neither_account() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        ledger.open(2).unwrap();
        award(&ledger, 1, 20).unwrap();
        ledger.disable(2).unwrap();

        let result = ledger.transfer(1, 2, Points::new(10), "swap settlement", None);
        assert!(matches!(result, Err(LedgerError::AccountDisabled(2))));
        assert_eq!(ledger.balance(1).unwrap(), Points::new(20));
    }

    #[test]
    fn transfer_to_self_fails() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 20).unwrap();

        let result = ledger.transfer(1, 1, Points::new(5), "swap settlement", None);
        assert!(matches!(result, Err(LedgerError::SelfTransfer(1))));
    }

    #[test]
    fn reconcile_commit_detects_concurrent_mutation() {
        let ledger = Ledger::new();
        ledger.open(1).unwrap();
        award(&ledger, 1, 10).unwrap();

        let stale = ledger.version(1).unwrap();
        award(&ledger, 1, 5).unwrap();

        let result = ledger.reconcile_commit(1, stale);
        assert!(matches!(
            result,
            Err(LedgerError::VersionConflict { account: 1, .. })
        ));
        assert_eq!(ledger.balance(1).unwrap(), Points::new(15));
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let ledger = Arc::new(Ledger::new());
        ledger.open(1).unwrap();
        award(&ledger, 1, 5).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.append(
                        1,
                        Points::new(-5),
                        Reason::AdminAdjustment,
                        "racing debit",
                        None,
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let overdraws = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientBalance { .. })))
            .count();

        assert_eq!(successes, 1, "exactly one debit may win");
        assert_eq!(overdraws, 1);
        assert_eq!(ledger.balance(1).unwrap(), Points::ZERO);
    }

    #[test]
    fn accounts_snapshot_is_ordered_by_id() {
        let ledger = Ledger::new();
        for id in [3, 1, 2] {
            ledger.open(id).unwrap();
        }
        award(&ledger, 2, 8).unwrap();

        let snapshots = ledger.accounts();
        let ids: Vec<AccountId> = snapshots.iter().map(|s| s.account).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshots[1].balance, Points::new(8));
    }
}
