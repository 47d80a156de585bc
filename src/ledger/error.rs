//! Error types for ledger mutations.

use thiserror::Error;

use crate::Points;
use crate::model::AccountId;

/// Error from a ledger store operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("account {0} already exists")]
    AccountExists(AccountId),

    #[error("account {0} is disabled")]
    AccountDisabled(AccountId),

    #[error("insufficient balance for account {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Points,
        requested: Points,
    },

    #[error("account {account} changed concurrently: expected version {expected}, now {actual}")]
    VersionConflict {
        account: AccountId,
        expected: u64,
        actual: u64,
    },

    #[error("cannot transfer from account {0} to itself")]
    SelfTransfer(AccountId),
}
