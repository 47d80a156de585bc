//! Core domain types for the ledger engine.

use chrono::{DateTime, Utc};

use crate::Points;
use crate::listing::ListingStatus;

/// Account identifier.
pub type AccountId = u32;

/// Ledger event identifier, assigned by the store in commit order.
pub type EventId = u64;

/// Listing identifier.
pub type ListingId = u64;

/// Swap identifier, assigned by the swap book.
pub type SwapId = u64;

/// Why points moved on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Award for publishing a new listing.
    ListingCreated,
    /// Manual correction or grant by an admin.
    AdminAdjustment,
    /// Listing owner credited when a swap completes.
    SwapCompletedCredit,
    /// Debit side of a point transfer between accounts.
    SwapCompletedDebit,
    /// Referrer credited when a referred user registers.
    ReferralBonus,
}

impl Reason {
    /// Stable string code, matching the `points_history.action` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingCreated => "listing_created",
            Self::AdminAdjustment => "admin_adjustment",
            Self::SwapCompletedCredit => "swap_completed_credit",
            Self::SwapCompletedDebit => "swap_completed_debit",
            Self::ReferralBonus => "referral_bonus",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "listing_created" => Some(Self::ListingCreated),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            "swap_completed_credit" => Some(Self::SwapCompletedCredit),
            "swap_completed_debit" => Some(Self::SwapCompletedDebit),
            "referral_bonus" => Some(Self::ReferralBonus),
            _ => None,
        }
    }
}

/// Immutable record of one balance change. Never updated or deleted once
/// appended.
#[derive(Debug, Clone)]
pub struct LedgerEvent {
    pub event_id: EventId,
    pub account_id: AccountId,
    pub delta: Points,
    pub reason: Reason,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Listing or swap the event relates to, if any.
    pub related_entity_id: Option<u64>,
}

/// Pagination cursor over an account's history.
///
/// Two events can share a timestamp, so the event id breaks ties; history
/// pages contain events strictly older than the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub event_id: EventId,
}

impl Cursor {
    pub fn of(event: &LedgerEvent) -> Self {
        Cursor {
            created_at: event.created_at,
            event_id: event.event_id,
        }
    }

    /// Whether `event` is strictly older than this cursor position.
    pub fn admits(&self, event: &LedgerEvent) -> bool {
        (event.created_at, event.event_id) < (self.created_at, self.event_id)
    }
}

/// A command representing the possible inputs of the engine.
///
/// Tokens are opaque credentials resolved through the identity gate; the
/// engine never trusts a caller-supplied role.
#[derive(Debug, Clone)]
pub enum Command {
    /// Register a new account with a zero balance. Names the referrer's
    /// account when the registration used a referral code.
    Open {
        account: AccountId,
        referrer: Option<AccountId>,
    },
    /// Soft-disable an account (admin). Disabled accounts reject appends.
    Disable { account: AccountId, token: String },
    /// Re-enable a disabled account (admin).
    Enable { account: AccountId, token: String },
    /// Append a manual adjustment to an account's ledger (admin).
    Award {
        account: AccountId,
        points: Points,
        description: String,
        token: String,
    },
    /// Register a pending listing owned by the caller; pays the
    /// listing-creation award.
    Listing {
        listing: ListingId,
        title: String,
        value: Points,
        token: String,
    },
    /// Set a listing's moderation status (admin).
    Moderate {
        listing: ListingId,
        status: ListingStatus,
        token: String,
    },
    /// Propose a swap of a listing; the resolved caller is the sender.
    Propose {
        listing: ListingId,
        receiver: AccountId,
        token: String,
    },
    /// Complete a pending swap; credits the listing owner.
    Complete { swap: SwapId, token: String },
    /// Cancel a pending swap; no ledger effect.
    Cancel { swap: SwapId, token: String },
    /// Verify an account's cached balance and repair it if it drifted
    /// (admin).
    Reconcile { account: AccountId, token: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(event_id: EventId, secs: i64) -> LedgerEvent {
        LedgerEvent {
            event_id,
            account_id: 1,
            delta: Points::new(5),
            reason: Reason::AdminAdjustment,
            description: String::new(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            related_entity_id: None,
        }
    }

    #[test]
    fn reason_codes_round_trip() {
        for reason in [
            Reason::ListingCreated,
            Reason::AdminAdjustment,
            Reason::SwapCompletedCredit,
            Reason::SwapCompletedDebit,
            Reason::ReferralBonus,
        ] {
            assert_eq!(Reason::parse(reason.as_str()), Some(reason));
        }
    }

    #[test]
    fn reason_parse_rejects_unknown_code() {
        assert_eq!(Reason::parse("swap_started"), None);
    }

    #[test]
    fn cursor_admits_strictly_older_events() {
        let cursor = Cursor::of(&event(10, 100));
        assert!(cursor.admits(&event(9, 99)));
        assert!(!cursor.admits(&event(10, 100)));
        assert!(!cursor.admits(&event(11, 101)));
    }

    #[test]
    fn cursor_breaks_timestamp_ties_by_event_id() {
        let cursor = Cursor::of(&event(10, 100));
        assert!(cursor.admits(&event(9, 100)));
        assert!(!cursor.admits(&event(11, 100)));
    }
}
