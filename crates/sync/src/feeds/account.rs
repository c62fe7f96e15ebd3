use std::time::Duration;

use async_trait::async_trait;
use ledgerwatch_core::{AccountKey, AccountRecord, Cursor};

use crate::account_cache::AccountCache;
use crate::error::SyncError;
use crate::existence::ExistencePoller;
use crate::multiplexer::{FeedAdapter, UpdateSource};
use crate::reader::GovernedLedger;
use crate::subscription::Trigger;

/// Account record, re-read after every effect of the account
pub struct AccountFeed {
    key: AccountKey,
    reader: GovernedLedger,
    existence: ExistencePoller,
    cache: AccountCache,
    trigger: Option<Trigger>,
    poll_interval: Option<Duration>,
    last_snapshot: Option<String>,
}

impl AccountFeed {
    pub fn new(
        key: AccountKey,
        reader: GovernedLedger,
        existence: ExistencePoller,
        cache: AccountCache,
        trigger: Trigger,
        poll_interval: Option<Duration>,
    ) -> Self {
        AccountFeed {
            key,
            reader,
            existence,
            cache,
            trigger: Some(trigger),
            poll_interval,
            last_snapshot: None,
        }
    }
}

#[async_trait]
impl FeedAdapter for AccountFeed {
    type Value = AccountRecord;

    fn name(&self) -> &'static str {
        "account"
    }

    async fn init(&mut self) -> Result<Option<AccountRecord>, SyncError> {
        let record = match self.cache.get(&self.key) {
            Some(record) => record,
            None => {
                let existence = self
                    .existence
                    .await_existence(&self.key.account_id, None)
                    .await?;
                self.cache.insert(self.key.clone(), existence.record.clone());
                existence.record
            }
        };
        self.last_snapshot = Some(record.change_snapshot());
        Ok(Some(record))
    }

    async fn fetch_update(
        &mut self,
        pushed: Option<AccountRecord>,
    ) -> Result<Option<AccountRecord>, SyncError> {
        match pushed {
            Some(record) => Ok(Some(record)),
            None => self.reader.account(&self.key.account_id).await,
        }
    }

    fn should_apply_update(&self, candidate: &AccountRecord) -> bool {
        self.last_snapshot.as_deref() != Some(candidate.change_snapshot().as_str())
    }

    fn apply_update(&mut self, candidate: AccountRecord) -> AccountRecord {
        self.last_snapshot = Some(candidate.change_snapshot());
        self.cache.insert(self.key.clone(), candidate.clone());
        candidate
    }

    fn cursor_of(&self, value: &AccountRecord) -> Option<Cursor> {
        Some(Cursor::new(value.sequence.clone()))
    }

    fn source(&mut self) -> UpdateSource<AccountRecord> {
        match self.trigger.take() {
            Some(trigger) => UpdateSource::Derived(trigger),
            None => UpdateSource::None,
        }
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}
