use crate::Points;
use crate::model::LedgerEvent;

/// One account's balance, version and event history.
/// The whole struct is guarded by a single lock: the balance and the log
/// can never be observed out of step with each other.
#[derive(Debug, Default)]
pub struct AccountState {
    pub(crate) balance: Points,
    pub(crate) version: u64,
    pub(crate) disabled: bool,
    pub(crate) events: Vec<LedgerEvent>,
}

impl AccountState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Balance recomputed from the event log.
    pub(crate) fn computed_balance(&self) -> Points {
        self.events.iter().map(|e| e.delta).sum()
    }
}

/// Read-only view of one account, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account: crate::model::AccountId,
    pub balance: Points,
    pub version: u64,
    pub disabled: bool,
}
