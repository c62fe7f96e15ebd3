//! Subscription registry
//!
//! Process-wide map from entity key to its live subscription. Lookups and
//! creation go through the map's entry lock, so concurrent requests for the
//! same key end up with the same subscription and one driver.

use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::subscription::Subscription;

pub struct SubscriptionRegistry<K, T> {
    entries: DashMap<K, Subscription<T>>,
}

impl<K, T> Default for SubscriptionRegistry<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        SubscriptionRegistry {
            entries: DashMap::new(),
        }
    }
}

impl<K, T> SubscriptionRegistry<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscription for `key`, created with `create` if there is none.
    ///
    /// A finished subscription is replaced; `create` runs at most once per
    /// call and only while the entry is locked.
    pub fn get_or_create<F>(&self, key: K, create: F) -> Subscription<T>
    where
        F: FnOnce() -> Subscription<T>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_finished() {
                    tracing::debug!("Replacing finished subscription {}", entry.get().key());
                    entry.insert(create());
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(create()).clone(),
        }
    }

    pub fn get(&self, key: &K) -> Option<Subscription<T>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Drop the entry and close its subscription
    pub fn remove(&self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some((_, subscription)) => {
                subscription.close();
                true
            }
            None => false,
        }
    }

    /// Close and drop every entry
    pub fn clear(&self) {
        let keys: Vec<K> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            self.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
