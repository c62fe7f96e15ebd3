//! Server-sent-events transport over reqwest

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use ledgerwatch_ports::{PushStream, PushTransport, TransportError};
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use super::decoder::SseDecoder;
use crate::error::HorizonError;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens one SSE connection per `connect` call
///
/// Only the connect phase is bounded by a timeout; an open stream may stay
/// idle for as long as the server keeps it.
#[derive(Clone)]
pub struct SseTransport {
    client: Client,
}

impl SseTransport {
    pub fn new() -> Result<Self, HorizonError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, HorizonError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self { client })
    }
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn connect(&self, url: &str) -> Result<PushStream, TransportError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!("SSE connected: {}", url);

        let state = SseState {
            body: resp
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        };

        let messages = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(data) = state.pending.pop_front() {
                    return Some((Ok(data), state));
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        for event in state.decoder.push(&chunk) {
                            // Horizon opens every stream with a named "open" hello
                            if event.is_message() {
                                state.pending.push_back(event.data);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(TransportError::Stream(e.to_string())), state));
                    }
                    None => return None,
                }
            }
        });

        Ok(messages.boxed())
    }
}
