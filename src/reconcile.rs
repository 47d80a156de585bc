//! Balance reconciliation.
//!
//! Detects drift between an account's cached balance and its event log
//! and repairs it by backfilling the adjustment the log is missing. The
//! usual source of drift is a code path that moved the balance without
//! recording the matching event; repair writes that event after the fact
//! instead of rewriting anything. Runs on admin demand or from a
//! periodic sweep, never on the request hot path.

use thiserror::Error;
use tracing::warn;

use crate::Points;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{AccountId, LedgerEvent};

/// Result of comparing an account's cached balance to its event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub consistent: bool,
    pub cached: Points,
    pub computed: Points,
}

/// Error from a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The account mutated between inspection and repair, or its state
    /// cannot be made consistent by appending. The caller retries.
    #[error("account {0} could not be reconciled; retry")]
    ConsistencyViolation(AccountId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Consistency checker and repairer for cached balances.
pub struct Reconciler<'a> {
    ledger: &'a Ledger,
}

impl<'a> Reconciler<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Compare the cached balance to the event-log sum. Read-only.
    pub fn verify(&self, account: AccountId) -> Result<Verification, ReconcileError> {
        let (cached, computed, _) = self.ledger.inspect(account)?;
        Ok(Verification {
            consistent: cached == computed,
            cached,
            computed,
        })
    }

    /// Repair a drifted balance by appending one corrective event.
    ///
    /// Returns the corrective event, or None when the account was already
    /// consistent. A concurrent mutation between inspection and the
    /// corrective append surfaces as [`ReconcileError::ConsistencyViolation`]
    /// rather than committing a correction computed against stale state.
    pub fn repair(&self, account: AccountId) -> Result<Option<LedgerEvent>, ReconcileError> {
        let (cached, computed, version) = self.ledger.inspect(account)?;
        if cached == computed {
            return Ok(None);
        }
        if cached < Points::ZERO {
            // A negative cache cannot be canonicalized by an append;
            // balances never go below zero.
            return Err(ReconcileError::ConsistencyViolation(account));
        }

        warn!(
            account,
            cached = %cached,
            computed = %computed,
            "balance drift detected, appending corrective event"
        );

        match self.ledger.reconcile_commit(account, version) {
            Ok(event) => Ok(event),
            Err(LedgerError::VersionConflict { .. }) => {
                Err(ReconcileError::ConsistencyViolation(account))
            }
            Err(e) => Err(e.into()),
        }
    }
}
