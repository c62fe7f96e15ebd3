//! Ledger API adapters

pub mod horizon;
