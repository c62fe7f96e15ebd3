//! Ledgerwatch Ports
//!
//! Port definitions (traits) for the Ledgerwatch synchronization engine.
//! These define the boundaries between the engine and infrastructure:
//! the request/response ledger API and the server-push transport.

mod error;
mod ledger;
mod transport;

pub use error::{FetchError, FetchResult, TransportError};
pub use ledger::{LedgerApi, PageRequest, SortOrder};
pub use transport::{PushStream, PushTransport};
