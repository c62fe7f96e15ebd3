//! Ledgerwatch runner
//!
//! Usage: `ledgerwatch [config.json]`. Without an argument the embedded
//! default configuration is used. Subscribes to every account and order
//! book of the watch list and logs their updates until Ctrl-C.

mod config;

use std::sync::Arc;
use std::time::Duration;

use ledgerwatch_gateway::{HorizonClient, SseTransport, select_horizon};
use ledgerwatch_sync::{Feeds, Subscriber};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::{ConfigError, RunnerConfigFile};

fn load(path: Option<String>) -> Result<RunnerConfigFile, ConfigError> {
    let config = match path {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path);
            config::load_config(path)?
        }
        None => config::load_default_config()?,
    };
    config.validate()?;
    Ok(config)
}

/// Log every value of `subscriber` until it finishes
fn log_updates<T>(
    label: String,
    mut subscriber: Subscriber<T>,
    describe: fn(&T) -> String,
) -> JoinHandle<()>
where
    T: Clone + Serialize + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = subscriber.next().await {
            match item {
                Ok(value) => tracing::info!("{}: {}", label, describe(&value)),
                Err(e) => tracing::error!("{}: {}", label, e),
            }
        }
        tracing::info!("{}: closed", label);
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ledgerwatch=info".parse()?))
        .init();

    let config = load(std::env::args().nth(1))?;

    let base_url = match &config.horizon.fallback_url {
        Some(fallback) => {
            let probe = reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?;
            select_horizon(&probe, &config.horizon.url, fallback).await?
        }
        None => config.horizon.url.clone(),
    };
    tracing::info!("Using Horizon at {}", base_url);

    let client = HorizonClient::new(config.horizon_config(&base_url))?;
    let transport = SseTransport::new()?;
    let feeds = Feeds::new(Arc::new(client), Arc::new(transport), config.sync_config());

    let mut watchers = Vec::new();
    for account in &config.watch.accounts {
        watchers.push(log_updates(
            format!("account {}", account),
            feeds.account(account).subscribe(),
            |record| {
                format!(
                    "sequence {}, native balance {}",
                    record.sequence,
                    record
                        .native_balance()
                        .map_or_else(|| "-".to_string(), |b| b.to_string())
                )
            },
        ));
        watchers.push(log_updates(
            format!("transactions {}", account),
            feeds.transactions(account).subscribe(),
            |batch| {
                let hashes: Vec<&str> = batch.iter().map(|tx| tx.hash.as_str()).collect();
                format!("{} new: {}", batch.len(), hashes.join(", "))
            },
        ));
        watchers.push(log_updates(
            format!("open orders {}", account),
            feeds.open_orders(account).subscribe(),
            |offers| format!("{} open", offers.len()),
        ));
    }

    for (selling, buying) in config.orderbook_pairs()? {
        watchers.push(log_updates(
            format!("order book {}/{}", selling, buying),
            feeds.orderbook(selling, buying).subscribe(),
            |book| match (book.best_bid(), book.best_ask()) {
                (Some(bid), Some(ask)) => format!("bid {} / ask {}", bid.price, ask.price),
                _ => format!("{} bids, {} asks", book.bids.len(), book.asks.len()),
            },
        ));
    }

    tracing::info!(
        "Watching {} accounts and {} order books",
        config.watch.accounts.len(),
        config.watch.orderbooks.len()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    feeds.clear();
    for watcher in watchers {
        let _ = watcher.await;
    }

    Ok(())
}
