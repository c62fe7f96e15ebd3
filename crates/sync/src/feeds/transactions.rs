use std::time::Duration;

use async_trait::async_trait;
use ledgerwatch_core::{AccountKey, Cursor, Timestamp, TransactionRecord};
use ledgerwatch_ports::{PageRequest, SortOrder};

use crate::error::SyncError;
use crate::existence::ExistencePoller;
use crate::multiplexer::{FeedAdapter, UpdateSource};
use crate::reader::GovernedLedger;
use crate::subscription::Trigger;

/// Transactions of an account that are newer than the last emitted batch
///
/// Reads the newest page on every effect. The baseline is that page; each
/// update carries only the transactions above the high-water mark.
pub struct TransactionsFeed {
    key: AccountKey,
    reader: GovernedLedger,
    existence: ExistencePoller,
    page_size: u32,
    trigger: Option<Trigger>,
    poll_interval: Option<Duration>,
    /// Newest transaction seen so far
    high_water: Option<(Cursor, Timestamp)>,
}

impl TransactionsFeed {
    pub fn new(
        key: AccountKey,
        reader: GovernedLedger,
        existence: ExistencePoller,
        page_size: u32,
        trigger: Trigger,
        poll_interval: Option<Duration>,
    ) -> Self {
        TransactionsFeed {
            key,
            reader,
            existence,
            page_size,
            trigger: Some(trigger),
            poll_interval,
            high_water: None,
        }
    }

    async fn newest_page(&mut self) -> Result<Vec<TransactionRecord>, SyncError> {
        let request = PageRequest::new()
            .with_limit(self.page_size)
            .with_order(SortOrder::Desc);
        let page = self
            .reader
            .transactions(&self.key.account_id, &request, true)
            .await?;
        Ok(page.into_records())
    }
}

fn newest(records: &[TransactionRecord]) -> Option<&TransactionRecord> {
    records.iter().max_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.paging_token.cmp(&b.paging_token))
    })
}

#[async_trait]
impl FeedAdapter for TransactionsFeed {
    type Value = Vec<TransactionRecord>;

    fn name(&self) -> &'static str {
        "transactions"
    }

    async fn init(&mut self) -> Result<Option<Vec<TransactionRecord>>, SyncError> {
        self.existence
            .await_existence(&self.key.account_id, None)
            .await?;
        let records = self.newest_page().await?;
        Ok(Some(self.apply_update(records)))
    }

    async fn fetch_update(
        &mut self,
        pushed: Option<Vec<TransactionRecord>>,
    ) -> Result<Option<Vec<TransactionRecord>>, SyncError> {
        match pushed {
            Some(records) => Ok(Some(records)),
            None => self.newest_page().await.map(Some),
        }
    }

    fn should_apply_update(&self, candidate: &Vec<TransactionRecord>) -> bool {
        let Some(top) = newest(candidate) else {
            return false;
        };
        match &self.high_water {
            None => true,
            Some((_, created_at)) => top.created_at > *created_at,
        }
    }

    fn apply_update(&mut self, candidate: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
        let previous = self.high_water.take();
        self.high_water = newest(&candidate)
            .map(|top| (top.paging_token.clone(), top.created_at))
            .or(previous.clone());

        match previous {
            Some((cursor, _)) => candidate
                .into_iter()
                .filter(|tx| tx.paging_token > cursor)
                .collect(),
            None => candidate,
        }
    }

    fn cursor_of(&self, value: &Vec<TransactionRecord>) -> Option<Cursor> {
        newest(value).map(|top| top.paging_token.clone())
    }

    fn source(&mut self) -> UpdateSource<Vec<TransactionRecord>> {
        match self.trigger.take() {
            Some(trigger) => UpdateSource::Derived(trigger),
            None => UpdateSource::None,
        }
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}
