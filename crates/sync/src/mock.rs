//! In-memory ledger and push transport
//!
//! Deterministic stand-ins for Horizon, for tests and offline runs. The
//! ledger serves whatever state the caller sets and counts every read; the
//! transport hands out streams the caller feeds by hand.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use ledgerwatch_core::{
    AccountRecord, Amount, Asset, Balance, CollectionPage, Cursor, EffectRecord, Embedded,
    OfferRecord, OrderbookRecord, PageLinks, TransactionRecord,
};
use ledgerwatch_ports::{
    FetchError, FetchResult, LedgerApi, PageRequest, PushStream, PushTransport, TransportError,
};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Map;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Timestamp `seconds` after a fixed epoch
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0)
        .single()
        .unwrap_or_default()
}

pub fn account_record(id: &str, sequence: &str) -> AccountRecord {
    AccountRecord {
        id: id.to_string(),
        sequence: sequence.to_string(),
        balances: vec![Balance {
            asset_type: "native".to_string(),
            asset_code: None,
            asset_issuer: None,
            balance: Amount::from(100i64),
            limit: None,
        }],
        subentry_count: 0,
        last_modified_ledger: 1,
        extra: Map::new(),
    }
}

pub fn effect_record(account: &str, token: &str, kind: &str, created_at: i64) -> EffectRecord {
    EffectRecord {
        id: format!("{:0>19}", token),
        paging_token: Cursor::new(token),
        account: account.to_string(),
        kind: kind.to_string(),
        created_at: at(created_at),
        extra: Map::new(),
    }
}

pub fn transaction_record(account: &str, token: &str, created_at: i64) -> TransactionRecord {
    TransactionRecord {
        id: format!("tx{}", token),
        hash: format!("tx{}", token),
        paging_token: Cursor::new(token),
        source_account: account.to_string(),
        created_at: at(created_at),
        successful: true,
        extra: Map::new(),
    }
}

pub fn offer_record(seller: &str, id: u64, amount: i64) -> OfferRecord {
    OfferRecord {
        id: id.to_string(),
        paging_token: Cursor::new(id.to_string()),
        seller: seller.to_string(),
        selling: Asset::Native,
        buying: Asset::credit("USD", "GISSUER"),
        amount: Amount::from(amount),
        price: Amount::from(1i64),
        extra: Map::new(),
    }
}

fn page<T>(url: String, records: Vec<T>) -> CollectionPage<T> {
    let mut links = PageLinks::default();
    links.self_link.href = url;
    CollectionPage {
        embedded: Embedded { records },
        links,
    }
}

#[derive(Default)]
struct LedgerState {
    account: Option<AccountRecord>,
    account_script: VecDeque<FetchResult<Option<AccountRecord>>>,
    latest_effect: Option<EffectRecord>,
    /// Newest first
    transactions: Vec<TransactionRecord>,
    offers: Vec<OfferRecord>,
    orderbook: Option<OrderbookRecord>,
    failing: HashMap<&'static str, FetchError>,
    calls: HashMap<&'static str, Vec<Instant>>,
}

/// Scriptable `LedgerApi` for a single account
pub struct MockLedger {
    horizon: String,
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new(horizon: &str) -> Self {
        MockLedger {
            horizon: horizon.trim_end_matches('/').to_string(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn set_account(&self, account: Option<AccountRecord>) {
        self.state.lock().account = account;
    }

    /// Queue one answer served before the value from `set_account`
    pub fn script_account(&self, response: FetchResult<Option<AccountRecord>>) {
        self.state.lock().account_script.push_back(response);
    }

    pub fn set_latest_effect(&self, effect: Option<EffectRecord>) {
        self.state.lock().latest_effect = effect;
    }

    pub fn set_transactions(&self, transactions: Vec<TransactionRecord>) {
        self.state.lock().transactions = transactions;
    }

    pub fn set_offers(&self, offers: Vec<OfferRecord>) {
        self.state.lock().offers = offers;
    }

    pub fn set_orderbook(&self, book: OrderbookRecord) {
        self.state.lock().orderbook = Some(book);
    }

    /// Make every read of `kind` fail until cleared with `None`
    pub fn set_failing(&self, kind: &'static str, error: Option<FetchError>) {
        let mut state = self.state.lock();
        match error {
            Some(error) => state.failing.insert(kind, error),
            None => state.failing.remove(kind),
        };
    }

    /// Reads of `kind`: "account", "latest_effect", "transactions",
    /// "open_orders" or "orderbook"
    pub fn calls(&self, kind: &str) -> usize {
        self.state.lock().calls.get(kind).map_or(0, Vec::len)
    }

    pub fn call_times(&self, kind: &str) -> Vec<Instant> {
        self.state.lock().calls.get(kind).cloned().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().map(Vec::len).sum()
    }

    fn record(&self, kind: &'static str) -> Result<MutexGuard<'_, LedgerState>, FetchError> {
        let mut state = self.state.lock();
        state.calls.entry(kind).or_default().push(Instant::now());
        match state.failing.get(kind) {
            Some(error) => Err(error.clone()),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl LedgerApi for MockLedger {
    fn horizon_url(&self) -> &str {
        &self.horizon
    }

    async fn fetch_account(&self, account_id: &str) -> FetchResult<Option<AccountRecord>> {
        let mut state = self.record("account")?;
        if let Some(response) = state.account_script.pop_front() {
            return response;
        }
        Ok(state.account.clone().filter(|a| a.id == account_id))
    }

    async fn fetch_latest_effect(&self, _account_id: &str) -> FetchResult<Option<EffectRecord>> {
        let state = self.record("latest_effect")?;
        Ok(state.latest_effect.clone())
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        page_request: &PageRequest,
        empty_on_404: bool,
    ) -> FetchResult<CollectionPage<TransactionRecord>> {
        let state = self.record("transactions")?;
        let url = format!("{}/accounts/{}/transactions", self.horizon, account_id);
        if state.account.is_none() {
            return if empty_on_404 {
                Ok(CollectionPage::empty(&url))
            } else {
                Err(FetchError::RequestFailed { status: 404, url })
            };
        }
        let limit = page_request.limit.unwrap_or(10) as usize;
        let records = state.transactions.iter().take(limit).cloned().collect();
        Ok(page(url, records))
    }

    async fn fetch_open_orders(
        &self,
        account_id: &str,
        _page_request: &PageRequest,
    ) -> FetchResult<CollectionPage<OfferRecord>> {
        let state = self.record("open_orders")?;
        let url = format!("{}/accounts/{}/offers", self.horizon, account_id);
        Ok(page(url, state.offers.clone()))
    }

    async fn fetch_orderbook(
        &self,
        selling: &Asset,
        buying: &Asset,
    ) -> FetchResult<OrderbookRecord> {
        let state = self.record("orderbook")?;
        Ok(state
            .orderbook
            .clone()
            .unwrap_or_else(|| OrderbookRecord::empty(selling.clone(), buying.clone())))
    }

    fn effects_stream_url(&self, account_id: &str, cursor: &Cursor) -> String {
        format!(
            "{}/accounts/{}/effects?cursor={}",
            self.horizon, account_id, cursor
        )
    }

    fn orderbook_stream_url(&self, selling: &Asset, buying: &Asset) -> String {
        format!(
            "{}/order_book?selling={}&buying={}&cursor=now",
            self.horizon, selling, buying
        )
    }
}

type Frame = Result<String, TransportError>;

#[derive(Default)]
struct TransportState {
    urls: Vec<String>,
    connections: Vec<(String, mpsc::UnboundedSender<Frame>)>,
    refusals: VecDeque<TransportError>,
}

/// `PushTransport` whose streams are fed by the test
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next connect with `error`
    pub fn refuse_next(&self, error: TransportError) {
        self.state.lock().refusals.push_back(error);
    }

    /// Every URL passed to `connect`, in order
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// Open connections whose URL contains `fragment`
    pub fn open_connections(&self, fragment: &str) -> usize {
        let mut state = self.state.lock();
        state.connections.retain(|(_, tx)| !tx.is_closed());
        state
            .connections
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .count()
    }

    /// Send `message` on every open connection whose URL contains
    /// `fragment`; returns the number of receivers
    pub fn push(&self, fragment: &str, message: impl Into<String>) -> usize {
        let message = message.into();
        let mut state = self.state.lock();
        state.connections.retain(|(_, tx)| !tx.is_closed());
        state
            .connections
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .filter(|(_, tx)| tx.send(Ok(message.clone())).is_ok())
            .count()
    }

    /// End every connection whose URL contains `fragment`
    pub fn disconnect(&self, fragment: &str) {
        self.state
            .lock()
            .connections
            .retain(|(url, _)| !url.contains(fragment));
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn connect(&self, url: &str) -> Result<PushStream, TransportError> {
        let mut state = self.state.lock();
        state.urls.push(url.to_string());
        if let Some(error) = state.refusals.pop_front() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.push((url.to_string(), tx));

        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        Ok(frames.boxed())
    }
}
