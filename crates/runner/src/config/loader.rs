use std::path::Path;
use std::time::Duration;

use ledgerwatch_core::{Asset, AssetParseError};
use ledgerwatch_gateway::HorizonConfig;
use ledgerwatch_sync::SyncConfig;
use thiserror::Error;

use super::types::RunnerConfigFile;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Missing Horizon URL")]
    MissingHorizonUrl,
    #[error("Invalid asset {0}: {1}")]
    InvalidAsset(String, AssetParseError),
}

/// Load runner configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunnerConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RunnerConfigFile = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<RunnerConfigFile, ConfigError> {
    let config: RunnerConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<RunnerConfigFile, ConfigError> {
    let default_config = include_str!("default_config.json");
    load_config_from_str(default_config)
}

fn parse_asset(id: &str) -> Result<Asset, ConfigError> {
    Asset::parse(id).map_err(|e| ConfigError::InvalidAsset(id.to_string(), e))
}

impl RunnerConfigFile {
    /// Sync engine settings
    pub fn sync_config(&self) -> SyncConfig {
        let sync = &self.sync;
        SyncConfig::default()
            .with_max_concurrent_fetches(sync.max_concurrent_fetches)
            .with_poll_interval(sync.poll_interval_secs.map(Duration::from_secs))
            .with_channel_capacity(sync.channel_capacity)
            .with_transactions_page_size(sync.transactions_page_size)
            .with_max_consecutive_stream_failures(sync.max_consecutive_stream_failures)
    }

    /// Horizon client settings for the selected base URL
    pub fn horizon_config(&self, base_url: &str) -> HorizonConfig {
        let horizon = &self.horizon;
        let mut config = HorizonConfig::new(base_url)
            .with_request_timeout(Duration::from_secs(horizon.request_timeout_secs));
        if let Some(name) = &horizon.client_name {
            let version = horizon
                .client_version
                .clone()
                .unwrap_or_else(|| config.client_version.clone());
            config = config.with_client(name.clone(), version);
        }
        config
    }

    /// Parsed order book pairs of the watch list
    pub fn orderbook_pairs(&self) -> Result<Vec<(Asset, Asset)>, ConfigError> {
        self.watch
            .orderbooks
            .iter()
            .map(|pair| Ok((parse_asset(&pair.selling)?, parse_asset(&pair.buying)?)))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon.url.trim().is_empty() {
            return Err(ConfigError::MissingHorizonUrl);
        }
        self.orderbook_pairs()?;
        Ok(())
    }
}
