use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledgerwatch_core::{OrderbookKey, OrderbookRecord};

use crate::error::SyncError;
use crate::multiplexer::{FeedAdapter, PushChannel, Pushed, UpdateSource};
use crate::reader::GovernedLedger;

/// Order book of an asset pair, pushed by the order book stream
pub struct OrderbookFeed {
    key: OrderbookKey,
    reader: GovernedLedger,
    poll_interval: Option<Duration>,
    last_snapshot: Option<String>,
}

impl OrderbookFeed {
    pub fn new(key: OrderbookKey, reader: GovernedLedger, poll_interval: Option<Duration>) -> Self {
        OrderbookFeed {
            key,
            reader,
            poll_interval,
            last_snapshot: None,
        }
    }

    fn snapshot(book: &OrderbookRecord) -> Option<String> {
        serde_json::to_string(book).ok()
    }
}

#[async_trait]
impl FeedAdapter for OrderbookFeed {
    type Value = OrderbookRecord;

    fn name(&self) -> &'static str {
        "orderbook"
    }

    async fn init(&mut self) -> Result<Option<OrderbookRecord>, SyncError> {
        let book = self
            .reader
            .orderbook(&self.key.selling, &self.key.buying)
            .await?;
        Ok(Some(self.apply_update(book)))
    }

    async fn fetch_update(
        &mut self,
        pushed: Option<OrderbookRecord>,
    ) -> Result<Option<OrderbookRecord>, SyncError> {
        match pushed {
            Some(book) => Ok(Some(book)),
            None => self
                .reader
                .orderbook(&self.key.selling, &self.key.buying)
                .await
                .map(Some),
        }
    }

    fn should_apply_update(&self, candidate: &OrderbookRecord) -> bool {
        Self::snapshot(candidate) != self.last_snapshot
    }

    fn apply_update(&mut self, candidate: OrderbookRecord) -> OrderbookRecord {
        self.last_snapshot = Self::snapshot(&candidate);
        candidate
    }

    fn source(&mut self) -> UpdateSource<OrderbookRecord> {
        let api = Arc::clone(self.reader.api());
        let (selling, buying) = (self.key.selling.clone(), self.key.buying.clone());
        let url_factory = Arc::new(move || api.orderbook_stream_url(&selling, &buying));
        let decode = Box::new(|message: &str| -> Result<Pushed<OrderbookRecord>, SyncError> {
            Ok(Pushed {
                value: serde_json::from_str(message)?,
                terminal: false,
            })
        });

        UpdateSource::Push(PushChannel {
            url_factory,
            decode,
        })
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}
