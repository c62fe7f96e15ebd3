use std::time::Duration;

/// Configuration of one Horizon connection
#[derive(Debug, Clone)]
pub struct HorizonConfig {
    /// Absolute base URL, e.g. `https://horizon.stellar.org`
    pub base_url: String,
    /// Sent as `X-Client-Name`
    pub client_name: String,
    /// Sent as `X-Client-Version`
    pub client_version: String,
    /// Timeout of a single request/response read
    pub request_timeout: Duration,
}

impl HorizonConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        HorizonConfig {
            base_url: base_url.into(),
            client_name: "Ledgerwatch".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_client(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Identification query parameters carried by every request
    pub fn identification(&self) -> [(&'static str, &str); 2] {
        [
            ("X-Client-Name", self.client_name.as_str()),
            ("X-Client-Version", self.client_version.as_str()),
        ]
    }
}
