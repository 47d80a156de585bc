//! Error types for swap lifecycle operations.

use thiserror::Error;

use super::SwapStatus;
use crate::ledger::LedgerError;
use crate::model::{AccountId, ListingId, SwapId};

/// The lifecycle operation being attempted on an existing swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOperation {
    Complete,
    Cancel,
}

/// Why a listing cannot be proposed for a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// The listing is unknown to the directory.
    NotFound,
    /// The listing has not passed moderation.
    NotApproved,
    /// Another non-terminal swap already references the listing.
    AlreadySwapping,
    /// Sender and receiver are the same account.
    SelfSwap,
}

/// Error from a swap lifecycle operation.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("swap {0} not found")]
    SwapNotFound(SwapId),

    #[error("{0:?}: swap {1} is already {2}")]
    InvalidTransition(SwapOperation, SwapId, SwapStatus),

    #[error("listing {listing} is not available: {why:?}")]
    ListingNotAvailable {
        listing: ListingId,
        why: Unavailability,
    },

    #[error("{0:?}: account {2} is not a participant of swap {1}")]
    Unauthorized(SwapOperation, SwapId, AccountId),

    #[error("swap settlement failed: {0}")]
    Ledger(#[from] LedgerError),
}
