//! Command processing engine.
//!
//! The engine applies marketplace commands on top of the ledger store,
//! the swap book and the listing directory, resolving every credential
//! through the identity gate before touching privileged state.
//! Also supports an async stream of commands.

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Points;
use crate::auth::{Caller, IdentityGate, TokenGate};
use crate::ledger::Ledger;
use crate::listing::{ListingDirectory, ListingInfo, ListingStatus};
use crate::model::{AccountId, Command, ListingId, Reason, SwapId};
use crate::reconcile::Reconciler;
use crate::swap::{SwapBook, SwapError, Unavailability};

mod error;
pub use error::EngineError;

/// Points awarded to the owner when a listing is created.
pub const LISTING_CREATED_AWARD: Points = Points::new(5);

/// Points awarded to the referrer when a referred account registers.
pub const REFERRAL_BONUS: Points = Points::new(25);

/// The command processing engine.
///
/// Holds the ledger, the swap book and the listing directory; all state
/// is internally synchronized, so one engine serves concurrent callers.
pub struct Engine {
    ledger: Ledger,
    swaps: SwapBook,
    listings: ListingDirectory,
    gate: Box<dyn IdentityGate>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self::with_gate(Box::new(TokenGate))
    }

    /// Build an engine around a custom identity gate.
    pub fn with_gate(gate: Box<dyn IdentityGate>) -> Self {
        Self {
            ledger: Ledger::new(),
            swaps: SwapBook::new(),
            listings: ListingDirectory::new(),
            gate,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn swaps(&self) -> &SwapBook {
        &self.swaps
    }

    pub fn listings(&self) -> &ListingDirectory {
        &self.listings
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(cmd) = stream.next().await {
            // any error should not stop the engine, so we just ignore the application result
            let _ = self.apply(cmd);
        }
    }

    /// Apply a single command on top of the current engine state
    pub fn apply(&self, cmd: Command) -> Result<(), EngineError> {
        match cmd {
            Command::Open { account, referrer } => {
                let result = self.open(account, referrer);
                Self::log_result("open", account as u64, None, &result);
                result?;
            }
            Command::Disable { account, token } => {
                let result = self.disable(account, &token);
                Self::log_result("disable", account as u64, None, &result);
                result?;
            }
            Command::Enable { account, token } => {
                let result = self.enable(account, &token);
                Self::log_result("enable", account as u64, None, &result);
                result?;
            }
            Command::Award {
                account,
                points,
                description,
                token,
            } => {
                let result = self.award(account, points, &description, &token);
                Self::log_result("award", account as u64, Some(points), &result);
                result?;
            }
            Command::Listing {
                listing,
                title,
                value,
                token,
            } => {
                let result = self.listing(listing, &title, value, &token);
                Self::log_result("listing", listing, Some(value), &result);
                result?;
            }
            Command::Moderate {
                listing,
                status,
                token,
            } => {
                let result = self.moderate(listing, status, &token);
                Self::log_result("moderate", listing, None, &result);
                result?;
            }
            Command::Propose {
                listing,
                receiver,
                token,
            } => {
                let result = self.propose(listing, receiver, &token);
                Self::log_result("propose", listing, None, &result);
                result?;
            }
            Command::Complete { swap, token } => {
                let result = self.complete(swap, &token);
                Self::log_result("complete", swap, None, &result);
                result?;
            }
            Command::Cancel { swap, token } => {
                let result = self.cancel(swap, &token);
                Self::log_result("cancel", swap, None, &result);
                result?;
            }
            Command::Reconcile { account, token } => {
                let result = self.reconcile(account, &token);
                Self::log_result("reconcile", account as u64, None, &result);
                result?;
            }
        }
        Ok(())
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result<E: std::fmt::Display>(
        op: &str,
        subject: u64,
        points: Option<Points>,
        result: &Result<(), E>,
    ) {
        match (result, points) {
            (Ok(()), Some(pts)) => {
                info!(
                    subject = %subject,
                    points = %pts,
                    "{op} applied"
                );
            }
            (Ok(()), None) => {
                info!(
                    subject = %subject,
                    "{op} applied"
                );
            }
            (Err(e), Some(pts)) => {
                info!(
                    subject = %subject,
                    points = %pts,
                    reason = %e,
                    "{op} skipped"
                );
            }
            (Err(e), None) => {
                info!(
                    subject = %subject,
                    reason = %e,
                    "{op} skipped"
                );
            }
        }
    }

    /// Resolve a token and require the admin role.
    fn admin(&self, token: &str) -> Result<Caller, EngineError> {
        let caller = self.gate.resolve(token)?;
        if !caller.is_admin() {
            return Err(EngineError::Unauthorized(caller.account));
        }
        Ok(caller)
    }

    fn open(&self, account: AccountId, referrer: Option<AccountId>) -> Result<(), EngineError> {
        // A bad referral must leave nothing behind, so the referrer is
        // checked before the account is opened.
        if let Some(referrer) = referrer {
            self.ledger.balance(referrer)?;
        }

        self.ledger.open(account)?;

        if let Some(referrer) = referrer {
            self.ledger.append(
                referrer,
                REFERRAL_BONUS,
                Reason::ReferralBonus,
                &format!("Referred new account {account}"),
                Some(account as u64),
            )?;
        }
        Ok(())
    }

    fn disable(&self, account: AccountId, token: &str) -> Result<(), EngineError> {
        self.admin(token)?;
        self.ledger.disable(account)?;
        Ok(())
    }

    fn enable(&self, account: AccountId, token: &str) -> Result<(), EngineError> {
        self.admin(token)?;
        self.ledger.enable(account)?;
        Ok(())
    }

    fn award(
        &self,
        account: AccountId,
        points: Points,
        description: &str,
        token: &str,
    ) -> Result<(), EngineError> {
        self.admin(token)?;
        self.ledger.append(
            account,
            points,
            Reason::AdminAdjustment,
            description,
            None,
        )?;
        Ok(())
    }

    fn listing(
        &self,
        listing: ListingId,
        title: &str,
        value: Points,
        token: &str,
    ) -> Result<(), EngineError> {
        let caller = self.gate.resolve(token)?;
        if !value.is_credit() {
            return Err(EngineError::InvalidPointValue { listing, value });
        }
        if self.listings.contains(listing) {
            return Err(EngineError::ListingExists(listing));
        }

        // The award commits first; a listing without a creditable owner
        // is not registered at all.
        self.ledger.append(
            caller.account,
            LISTING_CREATED_AWARD,
            Reason::ListingCreated,
            &format!("Created new listing: {title}"),
            Some(listing),
        )?;

        self.listings.insert(ListingInfo {
            listing,
            owner: caller.account,
            title: title.to_string(),
            value,
            status: ListingStatus::Pending,
            created_at: chrono::Utc::now(),
        });
        Ok(())
    }

    fn moderate(
        &self,
        listing: ListingId,
        status: ListingStatus,
        token: &str,
    ) -> Result<(), EngineError> {
        self.admin(token)?;
        if !self.listings.set_status(listing, status) {
            return Err(EngineError::ListingNotFound(listing));
        }
        Ok(())
    }

    fn propose(
        &self,
        listing: ListingId,
        receiver: AccountId,
        token: &str,
    ) -> Result<(), EngineError> {
        let caller = self.gate.resolve(token)?;
        let info = self
            .listings
            .get(listing)
            .ok_or(SwapError::ListingNotAvailable {
                listing,
                why: Unavailability::NotFound,
            })?;
        self.swaps.propose(&info, caller.account, receiver)?;
        Ok(())
    }

    fn complete(&self, swap: SwapId, token: &str) -> Result<(), EngineError> {
        let caller = self.gate.resolve(token)?;
        let pending = self.swaps.get(swap)?;
        let info = self
            .listings
            .get(pending.listing)
            .ok_or(EngineError::ListingNotFound(pending.listing))?;
        self.swaps
            .complete(swap, &caller, info.owner, info.value, &self.ledger)?;
        Ok(())
    }

    fn cancel(&self, swap: SwapId, token: &str) -> Result<(), EngineError> {
        let caller = self.gate.resolve(token)?;
        self.swaps.cancel(swap, &caller)?;
        Ok(())
    }

    fn reconcile(&self, account: AccountId, token: &str) -> Result<(), EngineError> {
        self.admin(token)?;
        Reconciler::new(&self.ledger).repair(account)?;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
