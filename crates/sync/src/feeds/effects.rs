use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledgerwatch_core::{AccountKey, Cursor, EffectRecord, Timestamp};
use parking_lot::Mutex;

use crate::error::SyncError;
use crate::existence::ExistencePoller;
use crate::multiplexer::{FeedAdapter, PushChannel, Pushed, UpdateSource};
use crate::reader::GovernedLedger;

/// Newest effect of an account, pushed by the effects stream
///
/// This is the root feed of an account: account, transactions and open
/// orders re-fetch on each of its updates. An `account_removed` effect for
/// the account ends the feed.
pub struct EffectsFeed {
    key: AccountKey,
    reader: GovernedLedger,
    existence: ExistencePoller,
    /// Newest paging token received on the stream; reconnects resume here
    stream_cursor: Arc<Mutex<Option<Cursor>>>,
    /// Last accepted effect
    latest: Option<(Cursor, Timestamp)>,
}

impl EffectsFeed {
    pub fn new(key: AccountKey, reader: GovernedLedger, existence: ExistencePoller) -> Self {
        EffectsFeed {
            key,
            reader,
            existence,
            stream_cursor: Arc::new(Mutex::new(None)),
            latest: None,
        }
    }

    fn remember(&mut self, effect: &EffectRecord) {
        self.latest = Some((effect.paging_token.clone(), effect.created_at));
    }
}

#[async_trait]
impl FeedAdapter for EffectsFeed {
    type Value = EffectRecord;

    fn name(&self) -> &'static str {
        "effects"
    }

    async fn init(&mut self) -> Result<Option<EffectRecord>, SyncError> {
        let account_id = &self.key.account_id;
        let mut latest = self.reader.latest_effect(account_id).await?;
        if latest.is_none() {
            self.existence.await_existence(account_id, None).await?;
            latest = self.reader.latest_effect(account_id).await?;
        }

        if let Some(effect) = &latest {
            self.remember(effect);
            *self.stream_cursor.lock() = Some(effect.paging_token.clone());
        }
        Ok(latest)
    }

    async fn fetch_update(
        &mut self,
        pushed: Option<EffectRecord>,
    ) -> Result<Option<EffectRecord>, SyncError> {
        match pushed {
            Some(effect) => Ok(Some(effect)),
            None => self.reader.latest_effect(&self.key.account_id).await,
        }
    }

    fn should_apply_update(&self, candidate: &EffectRecord) -> bool {
        match &self.latest {
            None => true,
            Some((token, created_at)) => {
                candidate.created_at >= *created_at && candidate.paging_token != *token
            }
        }
    }

    fn apply_update(&mut self, candidate: EffectRecord) -> EffectRecord {
        self.remember(&candidate);
        candidate
    }

    fn cursor_of(&self, value: &EffectRecord) -> Option<Cursor> {
        Some(value.paging_token.clone())
    }

    fn source(&mut self) -> UpdateSource<EffectRecord> {
        let api = Arc::clone(self.reader.api());
        let account_id = self.key.account_id.clone();
        let cursor = Arc::clone(&self.stream_cursor);
        let url_factory = Arc::new(move || {
            let cursor = cursor.lock().clone().unwrap_or_else(Cursor::now);
            api.effects_stream_url(&account_id, &cursor)
        });

        let account_id = self.key.account_id.clone();
        let cursor = Arc::clone(&self.stream_cursor);
        let decode = Box::new(move |message: &str| -> Result<Pushed<EffectRecord>, SyncError> {
            let effect: EffectRecord = serde_json::from_str(message)?;
            *cursor.lock() = Some(effect.paging_token.clone());
            let terminal = effect.removes_account(&account_id);
            Ok(Pushed {
                value: effect,
                terminal,
            })
        });

        UpdateSource::Push(PushChannel {
            url_factory,
            decode,
        })
    }

    fn poll_interval(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffConfig;
    use crate::governor::FetchGovernor;
    use crate::mock::{MockLedger, effect_record};

    fn feed() -> EffectsFeed {
        let ledger = Arc::new(MockLedger::new("https://h"));
        let reader = GovernedLedger::new(ledger, Arc::new(FetchGovernor::new(2)));
        let existence = ExistencePoller::new(reader.clone(), BackoffConfig::existence());
        EffectsFeed::new(AccountKey::new("https://h", "GA"), reader, existence)
    }

    #[test]
    fn test_gate() {
        let mut feed = feed();
        let first = effect_record("GA", "100-1", "account_credited", 10);
        assert!(feed.should_apply_update(&first));
        feed.apply_update(first.clone());

        // Same token again
        assert!(!feed.should_apply_update(&first));
        // Older
        assert!(!feed.should_apply_update(&effect_record("GA", "99-1", "trade", 9)));
        // Same ledger close time, new token
        assert!(feed.should_apply_update(&effect_record("GA", "100-2", "trade", 10)));
    }

    #[test]
    fn test_push_channel() {
        let mut feed = feed();
        let UpdateSource::Push(channel) = feed.source() else {
            panic!("effects feed must push");
        };
        assert_eq!(
            (channel.url_factory)(),
            "https://h/accounts/GA/effects?cursor=now"
        );

        let removed = serde_json::to_string(&effect_record("GA", "200-1", "account_removed", 20))
            .unwrap();
        let pushed = (channel.decode)(&removed).unwrap();
        assert!(pushed.terminal);
        assert_eq!(
            (channel.url_factory)(),
            "https://h/accounts/GA/effects?cursor=200-1"
        );

        assert!(matches!(
            (channel.decode)("not json"),
            Err(SyncError::Decode(_))
        ));
    }
}
