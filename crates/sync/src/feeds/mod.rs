//! Feeds
//!
//! The adapters for each resource kind and the [`Feeds`] facade that owns
//! the shared machinery. Every account-scoped feed hangs off the account's
//! effects feed:
//!
//! ```text
//!   effects (push) ──► account        (derived)
//!                  ├─► transactions   (derived)
//!                  └─► open orders    (derived)
//!   order book (push)
//! ```

mod account;
mod effects;
mod open_orders;
mod orderbook;
mod transactions;

pub use account::AccountFeed;
pub use effects::EffectsFeed;
pub use open_orders::OpenOrdersFeed;
pub use orderbook::OrderbookFeed;
pub use transactions::TransactionsFeed;

use std::sync::Arc;

use ledgerwatch_core::{
    AccountKey, AccountRecord, Asset, CollectionPage, EffectRecord, EntityKey, OfferRecord,
    OrderbookKey, OrderbookRecord, TransactionRecord,
};
use ledgerwatch_ports::{LedgerApi, PageRequest, PushTransport};
use tokio_util::sync::CancellationToken;

use crate::account_cache::AccountCache;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::existence::{Existence, ExistencePoller};
use crate::governor::FetchGovernor;
use crate::multiplexer::{self, FeedAdapter, MultiplexerContext};
use crate::reader::GovernedLedger;
use crate::registry::SubscriptionRegistry;
use crate::stream_client::ReconnectingStreamClient;
use crate::subscription::Subscription;

/// Entry point of the engine: one live subscription per resource
///
/// Subscribing spawns a driver task, so subscription methods must be called
/// from inside a tokio runtime.
pub struct Feeds {
    reader: GovernedLedger,
    governor: Arc<FetchGovernor>,
    existence: ExistencePoller,
    context: MultiplexerContext,
    cache: AccountCache,
    config: SyncConfig,
    accounts: SubscriptionRegistry<AccountKey, AccountRecord>,
    effects: SubscriptionRegistry<AccountKey, EffectRecord>,
    transactions: SubscriptionRegistry<AccountKey, Vec<TransactionRecord>>,
    open_orders: SubscriptionRegistry<AccountKey, Vec<OfferRecord>>,
    orderbooks: SubscriptionRegistry<OrderbookKey, OrderbookRecord>,
}

impl Feeds {
    pub fn new(
        api: Arc<dyn LedgerApi>,
        transport: Arc<dyn PushTransport>,
        config: SyncConfig,
    ) -> Self {
        let governor = Arc::new(FetchGovernor::new(config.max_concurrent_fetches));
        let reader = GovernedLedger::new(api, Arc::clone(&governor));
        let existence = ExistencePoller::new(reader.clone(), config.existence_backoff);
        let streams = ReconnectingStreamClient::new(transport, config.reconnect_backoff)
            .with_max_consecutive_failures(config.max_consecutive_stream_failures);

        tracing::info!(
            "Feeds ready for {} ({} concurrent fetches)",
            reader.horizon_url(),
            config.max_concurrent_fetches
        );

        Feeds {
            reader,
            governor,
            existence,
            context: MultiplexerContext {
                streams: Arc::new(streams),
                channel_capacity: config.channel_capacity,
            },
            cache: AccountCache::new(),
            config,
            accounts: SubscriptionRegistry::new(),
            effects: SubscriptionRegistry::new(),
            transactions: SubscriptionRegistry::new(),
            open_orders: SubscriptionRegistry::new(),
            orderbooks: SubscriptionRegistry::new(),
        }
    }

    pub fn horizon_url(&self) -> &str {
        self.reader.horizon_url()
    }

    pub fn governor(&self) -> &Arc<FetchGovernor> {
        &self.governor
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn account_cache(&self) -> &AccountCache {
        &self.cache
    }

    fn account_key(&self, account_id: &str) -> AccountKey {
        AccountKey::new(self.reader.horizon_url(), account_id)
    }

    fn start<A: FeedAdapter>(&self, key: impl Into<EntityKey>, adapter: A) -> Subscription<A::Value> {
        let subscription = Subscription::new(key, self.config.channel_capacity);
        multiplexer::spawn(adapter, subscription.clone(), self.context.clone());
        subscription
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    /// Newest effect of an account
    pub fn account_effects(&self, account_id: &str) -> Subscription<EffectRecord> {
        let key = self.account_key(account_id);
        self.effects.get_or_create(key.clone(), || {
            let feed = EffectsFeed::new(key.clone(), self.reader.clone(), self.existence.clone());
            self.start(key, feed)
        })
    }

    /// Account record; waits for the account to exist
    pub fn account(&self, account_id: &str) -> Subscription<AccountRecord> {
        let key = self.account_key(account_id);
        self.accounts.get_or_create(key.clone(), || {
            let trigger = self.account_effects(account_id).trigger();
            let feed = AccountFeed::new(
                key.clone(),
                self.reader.clone(),
                self.existence.clone(),
                self.cache.clone(),
                trigger,
                self.config.poll_interval,
            );
            self.start(key, feed)
        })
    }

    /// Batches of new transactions of an account
    pub fn transactions(&self, account_id: &str) -> Subscription<Vec<TransactionRecord>> {
        let key = self.account_key(account_id);
        self.transactions.get_or_create(key.clone(), || {
            let trigger = self.account_effects(account_id).trigger();
            let feed = TransactionsFeed::new(
                key.clone(),
                self.reader.clone(),
                self.existence.clone(),
                self.config.transactions_page_size,
                trigger,
                self.config.poll_interval,
            );
            self.start(key, feed)
        })
    }

    /// Open offers of an account
    pub fn open_orders(&self, account_id: &str) -> Subscription<Vec<OfferRecord>> {
        let key = self.account_key(account_id);
        self.open_orders.get_or_create(key.clone(), || {
            let trigger = self.account_effects(account_id).trigger();
            let feed = OpenOrdersFeed::new(
                key.clone(),
                self.reader.clone(),
                self.existence.clone(),
                trigger,
                self.config.poll_interval,
            );
            self.start(key, feed)
        })
    }

    /// Order book of `selling` against `buying`
    ///
    /// A pair of identical assets resolves to one empty book without any
    /// network call.
    pub fn orderbook(&self, selling: Asset, buying: Asset) -> Subscription<OrderbookRecord> {
        let key = OrderbookKey::new(self.reader.horizon_url(), selling, buying);
        if key.is_self_pair() {
            let book = OrderbookRecord::empty(key.selling.clone(), key.buying.clone());
            return Subscription::resolved(key, book);
        }

        self.orderbooks.get_or_create(key.clone(), || {
            let feed = OrderbookFeed::new(key.clone(), self.reader.clone(), self.config.poll_interval);
            self.start(key, feed)
        })
    }

    // ---------------------------------------------------------------------
    // One-shot reads
    // ---------------------------------------------------------------------

    pub async fn fetch_account(&self, account_id: &str) -> SyncResult<AccountRecord> {
        let record = self
            .reader
            .account(account_id)
            .await?
            .ok_or_else(|| SyncError::NotFoundYet(account_id.to_string()))?;
        self.cache.insert(self.account_key(account_id), record.clone());
        Ok(record)
    }

    pub async fn fetch_latest_effect(&self, account_id: &str) -> SyncResult<Option<EffectRecord>> {
        self.reader.latest_effect(account_id).await
    }

    pub async fn fetch_transactions(
        &self,
        account_id: &str,
        page: &PageRequest,
        empty_on_404: bool,
    ) -> SyncResult<CollectionPage<TransactionRecord>> {
        self.reader.transactions(account_id, page, empty_on_404).await
    }

    pub async fn fetch_open_orders(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> SyncResult<CollectionPage<OfferRecord>> {
        self.reader.open_orders(account_id, page).await
    }

    pub async fn fetch_orderbook(&self, selling: &Asset, buying: &Asset) -> SyncResult<OrderbookRecord> {
        if selling == buying {
            return Ok(OrderbookRecord::empty(selling.clone(), buying.clone()));
        }
        self.reader.orderbook(selling, buying).await
    }

    /// Resolve once the account exists; see [`ExistencePoller::await_existence`]
    pub async fn await_account(
        &self,
        account_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> SyncResult<Existence> {
        let existence = self.existence.await_existence(account_id, cancel).await?;
        self.cache
            .insert(self.account_key(account_id), existence.record.clone());
        Ok(existence)
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    /// Close every feed of an account and forget its cached record
    pub fn remove_account(&self, account_id: &str) {
        let key = self.account_key(account_id);
        self.accounts.remove(&key);
        self.transactions.remove(&key);
        self.open_orders.remove(&key);
        self.effects.remove(&key);
        self.cache.remove(&key);
    }

    pub fn remove_orderbook(&self, selling: Asset, buying: Asset) {
        let key = OrderbookKey::new(self.reader.horizon_url(), selling, buying);
        self.orderbooks.remove(&key);
    }

    /// Close every subscription
    pub fn clear(&self) {
        self.accounts.clear();
        self.transactions.clear();
        self.open_orders.clear();
        self.effects.clear();
        self.orderbooks.clear();
        tracing::info!("All feeds closed");
    }

    /// Number of live subscriptions across all kinds
    pub fn subscription_count(&self) -> usize {
        self.accounts.len()
            + self.effects.len()
            + self.transactions.len()
            + self.open_orders.len()
            + self.orderbooks.len()
    }
}

impl Drop for Feeds {
    fn drop(&mut self) {
        self.clear();
    }
}
