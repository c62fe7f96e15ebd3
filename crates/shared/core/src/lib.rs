//! Ledgerwatch Core Domain
//!
//! Pure domain types for the Ledgerwatch synchronization engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod asset;
pub mod entities;
pub mod key;
pub mod values;

// Re-export commonly used types at crate root
pub use asset::{Asset, AssetParseError};
pub use entities::{
    AccountRecord, Balance, CollectionPage, EffectRecord, Embedded, Link, OfferRecord,
    OrderbookRecord, PageLinks, PriceLevel, TransactionRecord,
};
pub use key::{AccountKey, EntityKey, OrderbookKey};
pub use values::{AccountId, Amount, Cursor, Timestamp};
