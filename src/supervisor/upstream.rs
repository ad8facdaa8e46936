use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Discrete signal from the upstream live connection.
///
/// Lifecycle signals drive supervisor transitions independently of message
/// content.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamSignal {
    /// Handshake completed; the feed is live
    Opened,
    /// Raw, unvalidated event payload
    Message(Value),
    /// Connection-level failure or timeout
    Error(String),
    /// Upstream closed the connection
    Closed,
}

/// Opens the single live connection to the upstream location feed.
///
/// The returned stream ends when the connection is gone; dropping it must
/// release the connection.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Short identifier used in logs (e.g., "nats")
    fn name(&self) -> &str;

    /// Open a connection. Errors are reported as failed handshakes.
    async fn connect(&self) -> Result<BoxStream<'static, UpstreamSignal>>;
}
