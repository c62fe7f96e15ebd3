use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

mod cursor;

pub use cursor::Cursor;

/// Asset amount or price - uses Decimal for precision
pub type Amount = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Public key of a ledger account (`G...`)
pub type AccountId = String;
