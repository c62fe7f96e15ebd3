//! Reconnecting push stream client
//!
//! Keeps one logical push connection alive on top of a `PushTransport`.
//! Every connect asks the URL factory for a fresh URL so a reconnect resumes
//! from the newest cursor the caller knows about.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use ledgerwatch_ports::PushTransport;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::config::BackoffConfig;
use crate::error::SyncError;

pub type UrlFactory = Arc<dyn Fn() -> String + Send + Sync>;

/// Receiver of one logical connection's events
#[async_trait]
pub trait StreamHandlers: Send + Sync + 'static {
    /// One inbound message, in arrival order
    async fn on_message(&self, message: String);

    /// The connection is gone for good
    async fn on_unexpected_error(&self, error: SyncError);
}

/// Owner of a running connection loop
///
/// Closing (or dropping) stops the loop, including a pending reconnect.
#[derive(Debug)]
pub struct LiveHandle {
    cancel: CancellationToken,
}

impl LiveHandle {
    pub fn close(self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct ReconnectingStreamClient {
    transport: Arc<dyn PushTransport>,
    backoff: BackoffConfig,
    max_consecutive_failures: Option<u32>,
}

impl ReconnectingStreamClient {
    pub fn new(transport: Arc<dyn PushTransport>, backoff: BackoffConfig) -> Self {
        ReconnectingStreamClient {
            transport,
            backoff,
            max_consecutive_failures: None,
        }
    }

    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Start the connection loop
    pub fn open(&self, url_factory: UrlFactory, handlers: Arc<dyn StreamHandlers>) -> LiveHandle {
        let cancel = CancellationToken::new();
        let connection = Connection {
            transport: Arc::clone(&self.transport),
            backoff: Backoff::new(self.backoff),
            max_consecutive_failures: self.max_consecutive_failures,
            url_factory,
            handlers,
            cancel: cancel.clone(),
        };
        tokio::spawn(connection.run());
        LiveHandle { cancel }
    }
}

struct Connection {
    transport: Arc<dyn PushTransport>,
    backoff: Backoff,
    max_consecutive_failures: Option<u32>,
    url_factory: UrlFactory,
    handlers: Arc<dyn StreamHandlers>,
    cancel: CancellationToken,
}

impl Connection {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            let url = (self.url_factory)();
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.transport.connect(&url) => result,
            };

            match connected {
                Ok(mut stream) => {
                    tracing::debug!("Stream connected: {}", url);
                    self.backoff.reset();
                    failures = 0;

                    loop {
                        let frame = tokio::select! {
                            _ = self.cancel.cancelled() => return,
                            frame = stream.next() => frame,
                        };
                        match frame {
                            Some(Ok(message)) => self.handlers.on_message(message).await,
                            Some(Err(e)) => {
                                tracing::warn!("Stream {} interrupted: {}", url, e);
                                break;
                            }
                            None => {
                                tracing::debug!("Stream {} closed by server", url);
                                break;
                            }
                        }
                    }
                }
                Err(e) if !e.is_recoverable() => {
                    tracing::error!("Stream {} rejected: {}", url, e);
                    self.handlers.on_unexpected_error(e.into()).await;
                    return;
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!("Stream {} connect failed ({} in a row): {}", url, failures, e);
                    if let Some(max) = self.max_consecutive_failures
                        && failures > max
                    {
                        self.handlers
                            .on_unexpected_error(SyncError::Stream(format!(
                                "giving up after {} failed connects: {}",
                                failures, e
                            )))
                            .await;
                        return;
                    }
                }
            }

            let delay = self.backoff.next_delay();
            tracing::debug!("Reconnecting in {:?}", delay);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
