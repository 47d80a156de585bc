//! Swap lifecycle.
//!
//! A swap moves through `pending -> completed | cancelled` and never
//! leaves a terminal state. Completion is the one operation in the
//! system that touches two components at once: the swap record and the
//! listing owner's ledger account. The swap lock is taken before the
//! account lock, and the status only flips after the credit commits, so
//! a failed credit leaves the swap pending.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::Points;
use crate::auth::Caller;
use crate::ledger::Ledger;
use crate::listing::{ListingInfo, ListingStatus};
use crate::model::{AccountId, ListingId, Reason, SwapId};

mod error;
pub use error::{SwapError, SwapOperation, Unavailability};

/// Lifecycle state of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed exchange of one listing between two accounts.
#[derive(Debug, Clone)]
pub struct Swap {
    pub swap_id: SwapId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub listing: ListingId,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Swap {
    fn involves(&self, account: AccountId) -> bool {
        self.sender == account || self.receiver == account
    }
}

/// The swap state machine.
///
/// Each swap sits behind its own lock, so concurrent complete/cancel
/// calls on one swap serialize and the first writer wins; the loser sees
/// `InvalidTransition`, never a silent no-op.
pub struct SwapBook {
    swaps: RwLock<HashMap<SwapId, Arc<Mutex<Swap>>>>,
    /// Listings with a non-terminal swap. At most one active swap may
    /// reference a listing at a time.
    active_by_listing: Mutex<HashMap<ListingId, SwapId>>,
    next_swap_id: AtomicU64,
}

/// Public API
impl SwapBook {
    pub fn new() -> Self {
        Self {
            swaps: RwLock::new(HashMap::new()),
            active_by_listing: Mutex::new(HashMap::new()),
            next_swap_id: AtomicU64::new(1),
        }
    }

    /// Current state of one swap.
    pub fn get(&self, swap_id: SwapId) -> Result<Swap, SwapError> {
        Ok(self.handle(swap_id)?.lock().clone())
    }

    /// Propose a swap of `listing` from `sender` to `receiver`.
    ///
    /// No ledger effect: points move only on completion.
    pub fn propose(
        &self,
        listing: &ListingInfo,
        sender: AccountId,
        receiver: AccountId,
    ) -> Result<Swap, SwapError> {
        if sender == receiver {
            return Err(SwapError::ListingNotAvailable {
                listing: listing.listing,
                why: Unavailability::SelfSwap,
            });
        }
        if listing.status != ListingStatus::Approved {
            return Err(SwapError::ListingNotAvailable {
                listing: listing.listing,
                why: Unavailability::NotApproved,
            });
        }

        let mut active = self.active_by_listing.lock();
        if active.contains_key(&listing.listing) {
            return Err(SwapError::ListingNotAvailable {
                listing: listing.listing,
                why: Unavailability::AlreadySwapping,
            });
        }

        let swap_id = self.next_swap_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let swap = Swap {
            swap_id,
            sender,
            receiver,
            listing: listing.listing,
            status: SwapStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        active.insert(listing.listing, swap_id);
        self.swaps
            .write()
            .insert(swap_id, Arc::new(Mutex::new(swap.clone())));
        Ok(swap)
    }

    /// Complete a pending swap, crediting the listing owner `credit`
    /// points on the given ledger.
    ///
    /// The status transition and the ledger append commit together:
    /// if the append fails, the swap stays pending.
    pub fn complete(
        &self,
        swap_id: SwapId,
        caller: &Caller,
        owner: AccountId,
        credit: Points,
        ledger: &Ledger,
    ) -> Result<Swap, SwapError> {
        let handle = self.handle(swap_id)?;
        let mut swap = handle.lock();

        if swap.status != SwapStatus::Pending {
            return Err(SwapError::InvalidTransition(
                SwapOperation::Complete,
                swap_id,
                swap.status,
            ));
        }
        if !caller.is_admin() && !swap.involves(caller.account) {
            return Err(SwapError::Unauthorized(
                SwapOperation::Complete,
                swap_id,
                caller.account,
            ));
        }

        ledger.append(
            owner,
            credit,
            Reason::SwapCompletedCredit,
            &format!("Swap {swap_id} completed"),
            Some(swap_id),
        )?;

        swap.status = SwapStatus::Completed;
        swap.updated_at = Utc::now();
        self.active_by_listing.lock().remove(&swap.listing);
        Ok(swap.clone())
    }

    /// Cancel a pending swap. No ledger effect.
    pub fn cancel(&self, swap_id: SwapId, caller: &Caller) -> Result<Swap, SwapError> {
        let handle = self.handle(swap_id)?;
        let mut swap = handle.lock();

        if swap.status != SwapStatus::Pending {
            return Err(SwapError::InvalidTransition(
                SwapOperation::Cancel,
                swap_id,
                swap.status,
            ));
        }
        if !caller.is_admin() && !swap.involves(caller.account) {
            return Err(SwapError::Unauthorized(
                SwapOperation::Cancel,
                swap_id,
                caller.account,
            ));
        }

        swap.status = SwapStatus::Cancelled;
        swap.updated_at = Utc::now();
        self.active_by_listing.lock().remove(&swap.listing);
        Ok(swap.clone())
    }

    /// The non-terminal swap referencing a listing, if any.
    pub fn active_swap_for(&self, listing: ListingId) -> Option<SwapId> {
        self.active_by_listing.lock().get(&listing).copied()
    }
}

/// Private API
impl SwapBook {
    fn handle(&self, swap_id: SwapId) -> Result<Arc<Mutex<Swap>>, SwapError> {
        self.swaps
            .read()
            .get(&swap_id)
            .cloned()
            .ok_or(SwapError::SwapNotFound(swap_id))
    }
}

impl Default for SwapBook {
    fn default() -> Self {
        Self::new()
    }
}
