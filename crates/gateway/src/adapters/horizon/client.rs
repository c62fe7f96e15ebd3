use async_trait::async_trait;
use ledgerwatch_core::{
    AccountRecord, Asset, CollectionPage, Cursor, EffectRecord, OfferRecord, OrderbookRecord,
    TransactionRecord,
};
use ledgerwatch_ports::{FetchError, FetchResult, LedgerApi, PageRequest, SortOrder};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::config::HorizonConfig;
use super::query::orderbook_query;
use crate::error::HorizonError;

/// REST client for one Horizon server
/// Infrastructure component - handles HTTP communication
#[derive(Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: Url,
    config: HorizonConfig,
}

impl HorizonClient {
    pub fn new(config: HorizonConfig) -> Result<Self, HorizonError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(HorizonClient {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &HorizonConfig {
        &self.config
    }

    /// Absolute URL for `path` with identification and `query` appended
    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, HorizonError> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.config.identification() {
                pairs.append_pair(key, value);
            }
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn page_query(page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(cursor) = &page.cursor {
            query.push(("cursor", cursor.to_string()));
        }
        if let Some(limit) = page.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(order) = page.order {
            query.push(("order", order.as_str().to_string()));
        }
        query
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, HorizonError> {
        tracing::trace!("GET {}", url);
        Ok(self.client.get(url).send().await?)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, HorizonError> {
        let status = resp.status();
        let url = resp.url().to_string();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(HorizonError::Status {
                status: status.as_u16(),
                url,
            });
        }

        serde_json::from_str(&text).map_err(|e| HorizonError::Parse(e.to_string()))
    }

    /// Like `handle_response`, but a 404 is `Ok(None)`
    async fn handle_optional<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<Option<T>, HorizonError> {
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.handle_response(resp).await.map(Some)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<AccountRecord>, HorizonError> {
        let url = self.url(&format!("/accounts/{}", account_id), &[])?;
        let resp = self.get(url).await?;
        self.handle_optional(resp).await
    }

    pub async fn get_latest_effect(
        &self,
        account_id: &str,
    ) -> Result<Option<EffectRecord>, HorizonError> {
        let page = PageRequest::new().with_limit(1).with_order(SortOrder::Desc);
        let url = self.url(
            &format!("/accounts/{}/effects", account_id),
            &Self::page_query(&page),
        )?;
        let resp = self.get(url).await?;
        let page: Option<CollectionPage<EffectRecord>> = self.handle_optional(resp).await?;
        Ok(page.and_then(|p| p.into_records().into_iter().next()))
    }

    pub async fn get_transactions(
        &self,
        account_id: &str,
        page: &PageRequest,
        empty_on_404: bool,
    ) -> Result<CollectionPage<TransactionRecord>, HorizonError> {
        let url = self.url(
            &format!("/accounts/{}/transactions", account_id),
            &Self::page_query(page),
        )?;
        let resp = self.get(url.clone()).await?;

        if empty_on_404 && resp.status() == StatusCode::NOT_FOUND {
            return Ok(CollectionPage::empty(url.as_str()));
        }
        self.handle_response(resp).await
    }

    pub async fn get_open_orders(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> Result<CollectionPage<OfferRecord>, HorizonError> {
        let url = self.url(
            &format!("/accounts/{}/offers", account_id),
            &Self::page_query(page),
        )?;
        let resp = self.get(url).await?;
        self.handle_response(resp).await
    }

    pub async fn get_orderbook(
        &self,
        selling: &Asset,
        buying: &Asset,
    ) -> Result<OrderbookRecord, HorizonError> {
        if selling == buying {
            return Ok(OrderbookRecord::empty(buying.clone(), buying.clone()));
        }

        let url = self.url("/order_book", &orderbook_query(selling, buying))?;
        let resp = self.get(url).await?;
        self.handle_response(resp).await
    }

    fn stream_url(&self, path: &str, query: &[(&str, String)]) -> String {
        match self.url(path, query) {
            Ok(url) => url.into(),
            // Base URL was validated in `new` and paths are built here, so
            // joining cannot fail; keep a best-effort string regardless
            Err(_) => format!("{}{}", self.config.base_url.trim_end_matches('/'), path),
        }
    }
}

/// Implement LedgerApi port for HorizonClient (Dependency Inversion)
///
/// Converts infrastructure HorizonError to port FetchError.
#[async_trait]
impl LedgerApi for HorizonClient {
    fn horizon_url(&self) -> &str {
        &self.config.base_url
    }

    async fn fetch_account(&self, account_id: &str) -> FetchResult<Option<AccountRecord>> {
        self.get_account(account_id).await.map_err(FetchError::from)
    }

    async fn fetch_latest_effect(&self, account_id: &str) -> FetchResult<Option<EffectRecord>> {
        self.get_latest_effect(account_id)
            .await
            .map_err(FetchError::from)
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        page: &PageRequest,
        empty_on_404: bool,
    ) -> FetchResult<CollectionPage<TransactionRecord>> {
        self.get_transactions(account_id, page, empty_on_404)
            .await
            .map_err(FetchError::from)
    }

    async fn fetch_open_orders(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> FetchResult<CollectionPage<OfferRecord>> {
        self.get_open_orders(account_id, page)
            .await
            .map_err(FetchError::from)
    }

    async fn fetch_orderbook(
        &self,
        selling: &Asset,
        buying: &Asset,
    ) -> FetchResult<OrderbookRecord> {
        self.get_orderbook(selling, buying)
            .await
            .map_err(FetchError::from)
    }

    fn effects_stream_url(&self, account_id: &str, cursor: &Cursor) -> String {
        self.stream_url(
            &format!("/accounts/{}/effects", account_id),
            &[("cursor", cursor.to_string())],
        )
    }

    fn orderbook_stream_url(&self, selling: &Asset, buying: &Asset) -> String {
        let mut query = orderbook_query(selling, buying);
        query.push(("cursor", Cursor::NOW.to_string()));
        self.stream_url("/order_book", &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HorizonClient {
        HorizonClient::new(
            HorizonConfig::new("https://horizon.example.org").with_client("Solar", "1.2.3"),
        )
        .unwrap()
    }

    #[test]
    fn test_url_carries_identification() {
        let url = client()
            .url("/accounts/GABC", &[("cursor", "42".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://horizon.example.org/accounts/GABC?X-Client-Name=Solar&X-Client-Version=1.2.3&cursor=42"
        );
    }

    #[test]
    fn test_page_query_skips_missing_fields() {
        let query = HorizonClient::page_query(&PageRequest::new().with_limit(15));
        assert_eq!(query, vec![("limit", "15".to_string())]);

        let query = HorizonClient::page_query(
            &PageRequest::new()
                .with_cursor(Some(Cursor::new("7")))
                .with_order(SortOrder::Desc),
        );
        assert_eq!(
            query,
            vec![("cursor", "7".to_string()), ("order", "desc".to_string())]
        );
    }

    #[test]
    fn test_effects_stream_url() {
        let url = client().effects_stream_url("GABC", &Cursor::now());
        assert!(url.starts_with("https://horizon.example.org/accounts/GABC/effects?"));
        assert!(url.ends_with("&cursor=now"));
    }

    #[test]
    fn test_orderbook_stream_url() {
        let url = client().orderbook_stream_url(&Asset::Native, &Asset::credit("USD", "GISSUER"));
        assert!(url.contains("selling_asset_type=native"));
        assert!(url.contains("buying_asset_code=USD"));
        assert!(url.ends_with("cursor=now"));
    }

    #[tokio::test]
    async fn test_self_pair_orderbook_needs_no_network() {
        // No server listens on this host; a request would fail
        let client = HorizonClient::new(HorizonConfig::new("http://127.0.0.1:9")).unwrap();
        let book = client
            .get_orderbook(&Asset::Native, &Asset::Native)
            .await
            .unwrap();
        assert!(book.is_empty());
        assert_eq!(book.base, Asset::Native);
    }
}
