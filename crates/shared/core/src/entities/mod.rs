mod account;
mod effect;
mod offer;
mod orderbook;
mod page;
mod transaction;

pub use account::{AccountRecord, Balance};
pub use effect::EffectRecord;
pub use offer::OfferRecord;
pub use orderbook::{OrderbookRecord, PriceLevel};
pub use page::{CollectionPage, Embedded, Link, PageLinks};
pub use transaction::TransactionRecord;
