//! Listing metadata surface.
//!
//! Listing CRUD (images, categories, browse filters) belongs to the
//! marketplace service; the ledger core only needs read-only metadata to
//! decide whether a listing can be swapped and what it pays out. The
//! [`ListingDirectory`] is that lookup surface, fed by the host.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::Points;
use crate::model::{AccountId, ListingId};

/// Point value assigned to a listing when the owner does not set one.
pub const DEFAULT_POINT_VALUE: Points = Points::new(10);

/// Moderation status of a listing. Only approved listings can be swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Spam,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Spam => "spam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "spam" => Some(Self::Spam),
            _ => None,
        }
    }
}

/// Metadata the ledger core needs about one listing.
#[derive(Debug, Clone)]
pub struct ListingInfo {
    pub listing: ListingId,
    pub owner: AccountId,
    pub title: String,
    pub value: Points,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

/// In-memory listing lookup, keyed by listing id.
#[derive(Debug, Default)]
pub struct ListingDirectory {
    listings: RwLock<HashMap<ListingId, ListingInfo>>,
}

impl ListingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, listing: ListingId) -> Option<ListingInfo> {
        self.listings.read().get(&listing).cloned()
    }

    pub fn contains(&self, listing: ListingId) -> bool {
        self.listings.read().contains_key(&listing)
    }

    pub fn insert(&self, info: ListingInfo) {
        self.listings.write().insert(info.listing, info);
    }

    /// Update a listing's moderation status. Returns false if the listing
    /// is unknown.
    pub fn set_status(&self, listing: ListingId, status: ListingStatus) -> bool {
        match self.listings.write().get_mut(&listing) {
            Some(info) => {
                info.status = status;
                true
            }
            None => false,
        }
    }
}
