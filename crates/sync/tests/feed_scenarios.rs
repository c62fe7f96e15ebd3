//! End-to-end feed scenarios
//!
//! Runs the `Feeds` facade against the in-memory ledger and push transport,
//! with tokio's paused clock so poll and backoff timers are deterministic.

use std::sync::Arc;
use std::time::Duration;

use ledgerwatch_core::{Asset, OrderbookRecord, PriceLevel};
use ledgerwatch_ports::FetchError;
use ledgerwatch_sync::mock::{
    MockLedger, MockTransport, account_record, effect_record, offer_record, transaction_record,
};
use ledgerwatch_sync::{Feeds, Subscriber, SubscriptionStatus, SyncConfig, SyncError};
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::time::{sleep, timeout};

const HORIZON: &str = "https://horizon.test";
const ACCOUNT: &str = "GACCOUNT";

struct Fixture {
    ledger: Arc<MockLedger>,
    transport: Arc<MockTransport>,
    feeds: Feeds,
}

fn fixture(config: SyncConfig) -> Fixture {
    let ledger = Arc::new(MockLedger::new(HORIZON));
    ledger.set_account(Some(account_record(ACCOUNT, "1")));
    ledger.set_latest_effect(Some(effect_record(ACCOUNT, "100-1", "account_created", 10)));
    ledger.set_transactions(vec![transaction_record(ACCOUNT, "100", 10)]);
    ledger.set_offers(vec![offer_record(ACCOUNT, 7, 10)]);

    let transport = Arc::new(MockTransport::new());
    let feeds = Feeds::new(ledger.clone(), transport.clone(), config);
    Fixture {
        ledger,
        transport,
        feeds,
    }
}

fn push_only() -> SyncConfig {
    SyncConfig::default().with_poll_interval(None)
}

fn effect_json(token: &str, kind: &str, created_at: i64) -> String {
    serde_json::to_string(&effect_record(ACCOUNT, token, kind, created_at)).unwrap()
}

/// Let every spawned task run to its next timer
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// Next value, or `None` if nothing arrives within a short quiet period
async fn next_value<T: Clone + Serialize>(consumer: &mut Subscriber<T>) -> Option<Result<T, SyncError>> {
    timeout(Duration::from_millis(50), consumer.next())
        .await
        .ok()
        .flatten()
}

#[tokio::test(start_paused = true)]
async fn test_effect_push_refetches_each_derived_feed_once() {
    let fx = fixture(push_only());
    let mut transactions = fx.feeds.transactions(ACCOUNT).subscribe();
    let mut orders = fx.feeds.open_orders(ACCOUNT).subscribe();
    settle().await;

    let baseline = next_value(&mut transactions).await.unwrap().unwrap();
    assert_eq!(baseline.len(), 1);
    let baseline = next_value(&mut orders).await.unwrap().unwrap();
    assert_eq!(baseline.len(), 1);
    assert_eq!(fx.ledger.calls("transactions"), 1);
    assert_eq!(fx.ledger.calls("open_orders"), 1);

    // Both derived feeds share one effects stream, resumed from the latest effect
    assert_eq!(fx.transport.connects(), 1);
    assert!(fx.transport.urls()[0].ends_with("/accounts/GACCOUNT/effects?cursor=100-1"));

    // Nothing changed upstream: one re-fetch each, no emission
    assert_eq!(fx.transport.push("/effects", effect_json("100-2", "trade", 11)), 1);
    settle().await;
    assert_eq!(fx.ledger.calls("transactions"), 2);
    assert_eq!(fx.ledger.calls("open_orders"), 2);
    assert!(next_value(&mut transactions).await.is_none());
    assert!(next_value(&mut orders).await.is_none());

    // Offer partially filled
    fx.ledger.set_offers(vec![offer_record(ACCOUNT, 7, 4)]);
    fx.transport.push("/effects", effect_json("100-3", "trade", 12));
    settle().await;
    let offers = next_value(&mut orders).await.unwrap().unwrap();
    assert_eq!(offers[0].amount, dec!(4));
    assert!(next_value(&mut transactions).await.is_none());

    // New transaction on top
    fx.ledger.set_transactions(vec![
        transaction_record(ACCOUNT, "101", 13),
        transaction_record(ACCOUNT, "100", 10),
    ]);
    fx.transport.push("/effects", effect_json("100-4", "account_debited", 13));
    settle().await;
    let batch = next_value(&mut transactions).await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].paging_token.as_str(), "101");
    assert_eq!(fx.ledger.calls("transactions"), 4);
    assert_eq!(fx.ledger.calls("open_orders"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_account_feed_suppresses_unchanged_records() {
    let fx = fixture(push_only());
    let mut account = fx.feeds.account(ACCOUNT).subscribe();
    settle().await;
    assert_eq!(next_value(&mut account).await.unwrap().unwrap().sequence, "1");

    fx.transport.push("/effects", effect_json("100-2", "trade", 11));
    settle().await;
    assert!(next_value(&mut account).await.is_none());

    fx.ledger.set_account(Some(account_record(ACCOUNT, "2")));
    fx.transport.push("/effects", effect_json("100-3", "trade", 12));
    settle().await;
    assert_eq!(next_value(&mut account).await.unwrap().unwrap().sequence, "2");
    assert_eq!(
        fx.feeds
            .account_cache()
            .get(&ledgerwatch_core::AccountKey::new(HORIZON, ACCOUNT))
            .map(|record| record.sequence),
        Some("2".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribers_share_one_init() {
    let fx = fixture(push_only());
    let feeds = Arc::new(fx.feeds);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let feeds = Arc::clone(&feeds);
            tokio::spawn(async move { feeds.account(ACCOUNT) })
        })
        .collect();
    let mut subscriptions = Vec::new();
    for handle in handles {
        subscriptions.push(handle.await.unwrap());
    }
    assert!(subscriptions.iter().all(|s| s.ptr_eq(&subscriptions[0])));

    let mut consumer = subscriptions[0].subscribe();
    let record = timeout(Duration::from_secs(5), consumer.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(record.id, ACCOUNT);
    assert_eq!(fx.ledger.calls("account"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_self_pair_orderbook_is_synthetic() {
    let fx = fixture(SyncConfig::default());
    let book = fx.feeds.orderbook(Asset::Native, Asset::Native);
    let mut consumer = book.subscribe();

    let snapshot = consumer.next().await.unwrap().unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(consumer.next().await, None);
    assert_eq!(book.status(), SubscriptionStatus::Completed);

    settle().await;
    assert_eq!(fx.ledger.total_calls(), 0);
    assert_eq!(fx.transport.connects(), 0);
    assert_eq!(fx.feeds.subscription_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_orderbook_push_is_deduplicated() {
    let fx = fixture(push_only());
    let usd = Asset::credit("USD", "GISSUER");
    let mut book = fx.feeds.orderbook(Asset::Native, usd.clone()).subscribe();
    settle().await;
    assert!(next_value(&mut book).await.unwrap().unwrap().is_empty());
    assert!(fx.transport.urls()[0].contains("cursor=now"));

    let mut update = OrderbookRecord::empty(Asset::Native, usd);
    update.bids.push(PriceLevel {
        price: dec!(0.25),
        amount: dec!(100),
    });
    let message = serde_json::to_string(&update).unwrap();
    fx.transport.push("/order_book", message.clone());
    fx.transport.push("/order_book", message);
    settle().await;

    assert_eq!(next_value(&mut book).await, Some(Ok(update)));
    assert!(next_value(&mut book).await.is_none());
    assert_eq!(fx.ledger.calls("orderbook"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_account_removed_completes_account_feeds() {
    let fx = fixture(push_only());
    let effects = fx.feeds.account_effects(ACCOUNT);
    let account = fx.feeds.account(ACCOUNT);
    let transactions = fx.feeds.transactions(ACCOUNT);
    settle().await;
    assert!(account.status().is_live());

    fx.transport
        .push("/effects", effect_json("200-1", "account_removed", 20));
    settle().await;

    assert_eq!(effects.status(), SubscriptionStatus::Completed);
    assert_eq!(
        effects.latest().map(|e| e.kind),
        Some("account_removed".to_string())
    );
    assert_eq!(account.status(), SubscriptionStatus::Completed);
    assert_eq!(transactions.status(), SubscriptionStatus::Completed);
    assert_eq!(fx.transport.open_connections("/effects"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_reaches_consumers() {
    let fx = fixture(push_only());
    fx.ledger.set_failing(
        "latest_effect",
        Some(FetchError::RequestFailed {
            status: 500,
            url: format!("{}/accounts/{}/effects", HORIZON, ACCOUNT),
        }),
    );

    let effects = fx.feeds.account_effects(ACCOUNT);
    let transactions = fx.feeds.transactions(ACCOUNT);
    let mut consumer = effects.subscribe();
    assert_eq!(
        consumer.next().await,
        Some(Err(SyncError::RequestFailed { status: 500 }))
    );
    assert_eq!(consumer.next().await, None);

    // The derived feed fails with its root
    settle().await;
    assert_eq!(transactions.status(), SubscriptionStatus::Failed);

    // A failed entry is replaced on the next request
    fx.ledger.set_failing("latest_effect", None);
    let again = fx.feeds.account_effects(ACCOUNT);
    assert!(!again.ptr_eq(&effects));
    settle().await;
    assert!(again.status().is_live());
}

#[tokio::test(start_paused = true)]
async fn test_account_feed_falls_back_to_polling() {
    let fx = fixture(SyncConfig::default().with_poll_interval(Some(Duration::from_secs(10))));
    let mut account = fx.feeds.account(ACCOUNT).subscribe();
    settle().await;
    next_value(&mut account).await.unwrap().unwrap();

    // The push stream is silent; the change only shows up through the poll
    fx.ledger.set_account(Some(account_record(ACCOUNT, "5")));
    let record = timeout(Duration::from_secs(11), account.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(record.sequence, "5");
}

#[tokio::test(start_paused = true)]
async fn test_remove_account_closes_feeds_and_stream() {
    let fx = fixture(push_only());
    let account = fx.feeds.account(ACCOUNT);
    settle().await;
    assert_eq!(fx.transport.open_connections("/effects"), 1);

    fx.feeds.remove_account(ACCOUNT);
    settle().await;
    assert_eq!(account.status(), SubscriptionStatus::Completed);
    assert_eq!(fx.transport.open_connections("/effects"), 0);
    assert_eq!(fx.feeds.subscription_count(), 0);
}
