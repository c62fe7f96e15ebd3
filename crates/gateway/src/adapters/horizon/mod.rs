//! Horizon adapter
//!
//! Talks to a Horizon server over plain HTTP. Every request carries the
//! client identification as query parameters.

mod client;
mod config;
mod failover;
mod query;

pub use client::HorizonClient;
pub use config::HorizonConfig;
pub use failover::select_horizon;
pub use query::{orderbook_query, ORDERBOOK_LIMIT};
