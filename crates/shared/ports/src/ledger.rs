use async_trait::async_trait;
use ledgerwatch_core::{
    AccountRecord, Asset, CollectionPage, Cursor, EffectRecord, OfferRecord, OrderbookRecord,
    TransactionRecord,
};

use crate::error::FetchResult;

/// Sort order of a paginated read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Pagination parameters of a collection read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: Option<u32>,
    pub order: Option<SortOrder>,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

/// Port for the read-only ledger API
///
/// One implementation is bound to one Horizon base URL. Reads are plain
/// request/response calls; admission control and retries are the caller's
/// business.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Base URL this API talks to, used to build entity keys
    fn horizon_url(&self) -> &str;

    /// `GET /accounts/{id}`; `Ok(None)` when the account does not exist (404)
    async fn fetch_account(&self, account_id: &str) -> FetchResult<Option<AccountRecord>>;

    /// Most recent effect of an account; `Ok(None)` for 404 or no effects
    async fn fetch_latest_effect(&self, account_id: &str) -> FetchResult<Option<EffectRecord>>;

    /// `GET /accounts/{id}/transactions`. With `empty_on_404` a missing
    /// account yields an empty page instead of an error.
    async fn fetch_transactions(
        &self,
        account_id: &str,
        page: &PageRequest,
        empty_on_404: bool,
    ) -> FetchResult<CollectionPage<TransactionRecord>>;

    /// `GET /accounts/{id}/offers`
    async fn fetch_open_orders(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> FetchResult<CollectionPage<OfferRecord>>;

    /// `GET /order_book`
    async fn fetch_orderbook(&self, selling: &Asset, buying: &Asset)
    -> FetchResult<OrderbookRecord>;

    /// Push URL of the effects of an account, resuming after `cursor`
    fn effects_stream_url(&self, account_id: &str, cursor: &Cursor) -> String;

    /// Push URL of an order book, starting at the current ledger
    fn orderbook_stream_url(&self, selling: &Asset, buying: &Asset) -> String;
}
