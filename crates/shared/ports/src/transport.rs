use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::TransportError;

/// Raw text frames of one push connection, in arrival order.
/// The stream ends when the server closes the connection.
pub type PushStream = BoxStream<'static, Result<String, TransportError>>;

/// Port for a server-push connection primitive
///
/// `connect` opens exactly one connection; reconnection policy lives above
/// this port.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<PushStream, TransportError>;
}
