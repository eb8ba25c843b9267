//! Oracle WebSocket Feed - Price-Service Push Subscription
//!
//! Connects to the oracle price service over WebSocket, subscribes to
//! a list of feed ids and forwards every `price_update` as an
//! `OracleUpdate` on the reconciler's channel.
//!
//! Each subscription runs in its own task and reconnects its socket
//! with a fixed backoff until the owning handle is closed.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use crate::domain::market::FeedId;
use crate::domain::price::OracleUpdate;
use crate::ports::market_feed::{OracleStream, SubscriptionHandle};

/// Socket reconnect delay while a subscription is open.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    ids: &'a [FeedId],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    PriceUpdate {
        price_feed: PriceFeedMsg,
    },
    Response {
        status: String,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct PriceFeedMsg {
    id: String,
    price: PriceMsg,
}

/// The mantissa is sent as a decimal string.
#[derive(Debug, Deserialize)]
struct PriceMsg {
    price: String,
    expo: i32,
    publish_time: i64,
}

/// Decode one text frame. `Ok(None)` for frames that carry no price.
fn parse_message(text: &str) -> Result<Option<OracleUpdate>> {
    let msg: ServerMessage = serde_json::from_str(text).context("Invalid oracle JSON")?;

    match msg {
        ServerMessage::PriceUpdate { price_feed } => {
            let mantissa: i64 = price_feed
                .price
                .price
                .parse()
                .context("Invalid price mantissa")?;
            Ok(Some(OracleUpdate {
                feed_id: price_feed.id,
                mantissa,
                exponent: price_feed.price.expo,
                publish_time: price_feed.price.publish_time,
            }))
        }
        ServerMessage::Response { status, error } => {
            if status != "success" {
                warn!(status = %status, error = ?error, "Oracle service rejected request");
            }
            Ok(None)
        }
        ServerMessage::Other => Ok(None),
    }
}

/// Oracle price service client.
pub struct PythOracleStream {
    /// WebSocket URL of the price service.
    ws_url: String,
    /// Delay between socket reconnects.
    reconnect_delay: Duration,
}

impl PythOracleStream {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

#[async_trait]
impl OracleStream for PythOracleStream {
    #[instrument(skip(self, feed_ids, updates), fields(feeds = feed_ids.len()))]
    async fn subscribe(
        &self,
        feed_ids: Vec<FeedId>,
        updates: mpsc::Sender<OracleUpdate>,
    ) -> Result<SubscriptionHandle> {
        anyhow::ensure!(!feed_ids.is_empty(), "No oracle feeds to subscribe to");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let session = Session {
            ws_url: self.ws_url.clone(),
            reconnect_delay: self.reconnect_delay,
            feed_ids,
            updates,
        };

        let task = tokio::spawn(session.run(shutdown_rx));
        Ok(SubscriptionHandle::new(shutdown_tx, task))
    }
}

/// Why a streaming session ended.
enum SessionEnd {
    /// Handle closed or the reconciler went away.
    Stopped,
    /// Socket dropped; reconnect.
    Dropped(anyhow::Error),
}

struct Session {
    ws_url: String,
    reconnect_delay: Duration,
    feed_ids: Vec<FeedId>,
    updates: mpsc::Sender<OracleUpdate>,
}

impl Session {
    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(url = %self.ws_url, feeds = self.feed_ids.len(), "Connecting to oracle service");

        loop {
            match self.connect_and_stream(&mut shutdown_rx).await {
                SessionEnd::Stopped => {
                    info!("Oracle subscription shut down");
                    return;
                }
                SessionEnd::Dropped(e) => {
                    warn!(
                        error = %e,
                        delay_ms = self.reconnect_delay.as_millis() as u64,
                        "Oracle WebSocket disconnected, reconnecting"
                    );
                    tokio::select! {
                        _ = &mut shutdown_rx => return,
                        () = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    async fn connect_and_stream(&self, shutdown_rx: &mut oneshot::Receiver<()>) -> SessionEnd {
        let ws_stream = tokio::select! {
            _ = &mut *shutdown_rx => return SessionEnd::Stopped,
            connected = connect_async(self.ws_url.as_str()) => match connected {
                Ok((stream, _)) => stream,
                Err(e) => return SessionEnd::Dropped(anyhow::anyhow!("connect failed: {e}")),
            },
        };

        let (mut write, mut read) = ws_stream.split();

        let request = SubscribeRequest {
            kind: "subscribe",
            ids: &self.feed_ids,
        };
        let payload = match serde_json::to_string(&request) {
            Ok(payload) => payload,
            Err(e) => return SessionEnd::Dropped(e.into()),
        };
        if let Err(e) = write.send(Message::Text(payload)).await {
            return SessionEnd::Dropped(anyhow::anyhow!("subscribe failed: {e}"));
        }

        info!("Oracle WebSocket connected");

        loop {
            tokio::select! {
                _ = &mut *shutdown_rx => {
                    let _ = write.close().await;
                    return SessionEnd::Stopped;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_message(&text) {
                        Ok(Some(update)) => {
                            if self.updates.send(update).await.is_err() {
                                return SessionEnd::Stopped;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => debug!(error = %e, "Failed to parse oracle message"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Dropped(anyhow::anyhow!("closed by server: {frame:?}"));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Dropped(anyhow::anyhow!("WebSocket error: {e}")),
                    None => return SessionEnd::Dropped(anyhow::anyhow!("WebSocket stream ended")),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_update() {
        let text = r#"{
            "type": "price_update",
            "price_feed": {
                "id": "f9c0172ba10dfa4d19088d94f5bf61d3b54d5bd7483a322a982e1373ee8ea31b",
                "price": {"price": "4325012345678", "conf": "1500000", "expo": -8, "publish_time": 1700000000},
                "ema_price": {"price": "4324000000000", "conf": "1400000", "expo": -8, "publish_time": 1700000000}
            }
        }"#;

        let update = parse_message(text).unwrap().unwrap();
        assert_eq!(update.exponent, -8);
        assert_eq!(update.publish_time, 1_700_000_000);
        assert_eq!(update.decimal_price().unwrap(), dec!(43250.12345678));
    }

    #[test]
    fn test_parse_response_and_unknown_frames() {
        assert!(parse_message(r#"{"type":"response","status":"success"}"#).unwrap().is_none());
        assert!(parse_message(r#"{"type":"heartbeat"}"#).unwrap().is_none());
        assert!(parse_message("not json").is_err());
    }

    #[test]
    fn test_subscribe_request_shape() {
        let ids = vec!["aa".to_string(), "bb".to_string()];
        let json = serde_json::to_string(&SubscribeRequest { kind: "subscribe", ids: &ids }).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","ids":["aa","bb"]}"#);
    }
}
