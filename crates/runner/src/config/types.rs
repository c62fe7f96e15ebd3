use serde::{Deserialize, Serialize};

/// Root of the runner's JSON configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfigFile {
    pub horizon: HorizonSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub watch: WatchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonSection {
    pub url: String,
    /// Used when `url` does not answer
    #[serde(default)]
    pub fallback_url: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// `null` disables the fallback poll
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_transactions_page_size")]
    pub transactions_page_size: u32,
    #[serde(default)]
    pub max_consecutive_stream_failures: Option<u32>,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            poll_interval_secs: default_poll_interval_secs(),
            channel_capacity: default_channel_capacity(),
            transactions_page_size: default_transactions_page_size(),
            max_consecutive_stream_failures: None,
        }
    }
}

/// What to subscribe to on startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSection {
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub orderbooks: Vec<OrderbookPair>,
}

/// Asset ids in `XLM` or `CODE:ISSUER` form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookPair {
    pub selling: String,
    pub buying: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_poll_interval_secs() -> Option<u64> {
    Some(10)
}

fn default_channel_capacity() -> usize {
    256
}

fn default_transactions_page_size() -> u32 {
    15
}
