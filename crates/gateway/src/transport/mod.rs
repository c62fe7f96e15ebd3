//! Push transport layer
//!
//! Horizon pushes records as server-sent events. The decoder turns raw body
//! bytes into events and the transport plugs an SSE connection into the
//! `PushTransport` port so the sync engine never sees HTTP.

pub mod decoder;
pub mod sse;

pub use decoder::{SseDecoder, SseEvent};
pub use sse::SseTransport;
