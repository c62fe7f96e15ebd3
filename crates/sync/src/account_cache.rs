//! Last known account records
//!
//! Filled by existence waits and by the account feed, read by the account
//! feed's init so a resubscription does not wait again.

use std::sync::Arc;

use dashmap::DashMap;
use ledgerwatch_core::{AccountKey, AccountRecord};

#[derive(Clone, Default)]
pub struct AccountCache {
    records: Arc<DashMap<AccountKey, AccountRecord>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AccountKey) -> Option<AccountRecord> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: AccountKey, record: AccountRecord) {
        self.records.insert(key, record);
    }

    pub fn remove(&self, key: &AccountKey) -> Option<AccountRecord> {
        self.records.remove(key).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
