//! Governed reads
//!
//! Wraps the `LedgerApi` port so every read goes through the shared
//! [`FetchGovernor`] with the priority of its kind.

use std::sync::Arc;

use ledgerwatch_core::{
    AccountRecord, Asset, CollectionPage, EffectRecord, OfferRecord, OrderbookRecord,
    TransactionRecord,
};
use ledgerwatch_ports::{LedgerApi, PageRequest};

use crate::error::SyncResult;
use crate::governor::{FetchGovernor, FetchPriority};

#[derive(Clone)]
pub struct GovernedLedger {
    api: Arc<dyn LedgerApi>,
    governor: Arc<FetchGovernor>,
}

impl GovernedLedger {
    pub fn new(api: Arc<dyn LedgerApi>, governor: Arc<FetchGovernor>) -> Self {
        GovernedLedger { api, governor }
    }

    pub fn api(&self) -> &Arc<dyn LedgerApi> {
        &self.api
    }

    pub fn horizon_url(&self) -> &str {
        self.api.horizon_url()
    }

    pub async fn account(&self, account_id: &str) -> SyncResult<Option<AccountRecord>> {
        let record = self
            .governor
            .submit(FetchPriority::Baseline, || self.api.fetch_account(account_id))
            .await?;
        Ok(record)
    }

    pub async fn latest_effect(&self, account_id: &str) -> SyncResult<Option<EffectRecord>> {
        let effect = self
            .governor
            .submit(FetchPriority::Probe, || {
                self.api.fetch_latest_effect(account_id)
            })
            .await?;
        Ok(effect)
    }

    pub async fn transactions(
        &self,
        account_id: &str,
        page: &PageRequest,
        empty_on_404: bool,
    ) -> SyncResult<CollectionPage<TransactionRecord>> {
        let page = self
            .governor
            .submit(FetchPriority::Collection, || {
                self.api.fetch_transactions(account_id, page, empty_on_404)
            })
            .await?;
        Ok(page)
    }

    pub async fn open_orders(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> SyncResult<CollectionPage<OfferRecord>> {
        let page = self
            .governor
            .submit(FetchPriority::Collection, || {
                self.api.fetch_open_orders(account_id, page)
            })
            .await?;
        Ok(page)
    }

    pub async fn orderbook(&self, selling: &Asset, buying: &Asset) -> SyncResult<OrderbookRecord> {
        let book = self
            .governor
            .submit(FetchPriority::Collection, || {
                self.api.fetch_orderbook(selling, buying)
            })
            .await?;
        Ok(book)
    }
}
