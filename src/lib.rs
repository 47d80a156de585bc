pub mod auth;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod listing;
pub mod model;
pub mod points;
pub mod reconcile;
pub mod swap;

pub use engine::Engine;
pub use ledger::{AccountSnapshot, Ledger};
pub use model::{AccountId, Command, Cursor, EventId, LedgerEvent, ListingId, Reason, SwapId};
pub use points::Points;
pub use reconcile::Reconciler;
pub use swap::SwapBook;
