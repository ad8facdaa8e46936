use crate::supervisor::{UpstreamConnector, UpstreamSignal};
use anyhow::{Context, Result};
use async_nats::{ConnectOptions, Event, ServerError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Fixed subject carrying driver location changes
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subject() -> String {
    "fleet.locations".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            subject: default_subject(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// Upstream connector backed by a core NATS subscription.
///
/// Each `connect` opens a dedicated client; the client lives exactly as
/// long as the returned signal stream.
pub struct NatsConnector {
    config: NatsConfig,
}

impl NatsConnector {
    pub fn new(config: NatsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UpstreamConnector for NatsConnector {
    fn name(&self) -> &str {
        "nats"
    }

    async fn connect(&self) -> Result<BoxStream<'static, UpstreamSignal>> {
        info!(url = %self.config.url, subject = %self.config.subject, "Connecting to NATS");

        let (tx, rx) = mpsc::unbounded_channel();

        // Lifecycle events arrive on the client's own task
        let events_tx = tx.clone();
        let client = ConnectOptions::new()
            .connection_timeout(Duration::from_secs(self.config.connect_timeout_seconds))
            .event_callback(move |event| {
                let events_tx = events_tx.clone();
                async move {
                    match signal_for_event(&event) {
                        Some(signal) => {
                            let _ = events_tx.send(signal);
                        }
                        None => debug!(event = %event, "NATS connection event"),
                    }
                }
            })
            .connect(&self.config.url)
            .await
            .context("Failed to connect to NATS")?;

        let mut subscriber = client
            .subscribe(self.config.subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", self.config.subject))?;

        let _ = tx.send(UpstreamSignal::Opened);

        let subject = self.config.subject.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Receiver dropped: the hub released this connection
                    _ = tx.closed() => break,

                    msg = subscriber.next() => {
                        let Some(msg) = msg else {
                            warn!(subject = %subject, "NATS subscription ended");
                            let _ = tx.send(UpstreamSignal::Closed);
                            break;
                        };

                        // Undecodable bytes still reach the hub so they trigger a resync
                        let payload = serde_json::from_slice::<Value>(&msg.payload).unwrap_or_else(|_| {
                            Value::String(String::from_utf8_lossy(&msg.payload).into_owned())
                        });

                        if tx.send(UpstreamSignal::Message(payload)).is_err() {
                            break;
                        }
                    }
                }
            }

            let _ = subscriber.unsubscribe().await;
            drop(client);
            debug!(subject = %subject, "NATS connection released");
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Client events that mean the live feed is gone.
///
/// A remote close ends the subscription stream, which the reader task
/// reports as `Closed`; no lifecycle event is needed for it.
fn signal_for_event(event: &Event) -> Option<UpstreamSignal> {
    match event {
        Event::Disconnected
        | Event::ClientError(_)
        | Event::ServerError(ServerError::AuthorizationViolation) => {
            Some(UpstreamSignal::Error(format!("NATS {}", event)))
        }
        _ => None,
    }
}
