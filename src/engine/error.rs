//! Error types for command processing.

use thiserror::Error;

use crate::Points;
use crate::auth::AuthError;
use crate::ledger::LedgerError;
use crate::model::{AccountId, ListingId};
use crate::reconcile::ReconcileError;
use crate::swap::SwapError;

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("account {0} lacks the admin role")]
    Unauthorized(AccountId),

    #[error("ledger operation failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Swap(#[from] SwapError),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("listing {0} already registered")]
    ListingExists(ListingId),

    #[error("listing {0} not found")]
    ListingNotFound(ListingId),

    #[error("listing {listing} has a non-positive point value {value}")]
    InvalidPointValue { listing: ListingId, value: Points },
}
