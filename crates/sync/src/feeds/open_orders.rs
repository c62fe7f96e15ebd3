use std::time::Duration;

use async_trait::async_trait;
use ledgerwatch_core::{AccountKey, Amount, Cursor, OfferRecord};
use ledgerwatch_ports::PageRequest;

use crate::error::SyncError;
use crate::existence::ExistencePoller;
use crate::multiplexer::{FeedAdapter, UpdateSource};
use crate::reader::GovernedLedger;
use crate::subscription::Trigger;

/// Horizon's page ceiling; an account rarely has more open offers
const OFFERS_LIMIT: u32 = 200;

/// What the gate compares between two offer sets
#[derive(Debug, Clone, PartialEq)]
struct OfferSetState {
    /// Paging token of the offer with the highest id
    max_token: Option<Cursor>,
    /// (id, remaining amount) sorted by id
    fingerprint: Vec<(Cursor, Amount)>,
}

impl OfferSetState {
    fn of(offers: &[OfferRecord]) -> Self {
        let max_token = offers
            .iter()
            .max_by_key(|offer| offer.id_cursor())
            .map(|offer| offer.paging_token.clone());
        let mut fingerprint: Vec<_> = offers
            .iter()
            .map(|offer| (offer.id_cursor(), offer.amount))
            .collect();
        fingerprint.sort();
        OfferSetState {
            max_token,
            fingerprint,
        }
    }

    fn is_empty(&self) -> bool {
        self.fingerprint.is_empty()
    }
}

/// Open offers of an account, re-read after every effect
pub struct OpenOrdersFeed {
    key: AccountKey,
    reader: GovernedLedger,
    existence: ExistencePoller,
    trigger: Option<Trigger>,
    poll_interval: Option<Duration>,
    last: Option<OfferSetState>,
}

impl OpenOrdersFeed {
    pub fn new(
        key: AccountKey,
        reader: GovernedLedger,
        existence: ExistencePoller,
        trigger: Trigger,
        poll_interval: Option<Duration>,
    ) -> Self {
        OpenOrdersFeed {
            key,
            reader,
            existence,
            trigger: Some(trigger),
            poll_interval,
            last: None,
        }
    }

    async fn read(&mut self) -> Result<Vec<OfferRecord>, SyncError> {
        let request = PageRequest::new().with_limit(OFFERS_LIMIT);
        let page = self
            .reader
            .open_orders(&self.key.account_id, &request)
            .await?;
        Ok(page.into_records())
    }
}

#[async_trait]
impl FeedAdapter for OpenOrdersFeed {
    type Value = Vec<OfferRecord>;

    fn name(&self) -> &'static str {
        "open_orders"
    }

    async fn init(&mut self) -> Result<Option<Vec<OfferRecord>>, SyncError> {
        self.existence
            .await_existence(&self.key.account_id, None)
            .await?;
        let offers = self.read().await?;
        Ok(Some(self.apply_update(offers)))
    }

    async fn fetch_update(
        &mut self,
        pushed: Option<Vec<OfferRecord>>,
    ) -> Result<Option<Vec<OfferRecord>>, SyncError> {
        match pushed {
            Some(offers) => Ok(Some(offers)),
            None => self.read().await.map(Some),
        }
    }

    fn should_apply_update(&self, candidate: &Vec<OfferRecord>) -> bool {
        let Some(last) = &self.last else {
            return true;
        };
        let next = OfferSetState::of(candidate);
        if last.is_empty() != next.is_empty() {
            return true;
        }
        !next.is_empty() && (next.max_token != last.max_token || next.fingerprint != last.fingerprint)
    }

    fn apply_update(&mut self, candidate: Vec<OfferRecord>) -> Vec<OfferRecord> {
        self.last = Some(OfferSetState::of(&candidate));
        candidate
    }

    fn source(&mut self) -> UpdateSource<Vec<OfferRecord>> {
        match self.trigger.take() {
            Some(trigger) => UpdateSource::Derived(trigger),
            None => UpdateSource::None,
        }
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}
