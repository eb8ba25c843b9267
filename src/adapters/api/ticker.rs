//! Ticker Adapter - REST Ticker and Candle Queries
//!
//! Implements `TickerSource` on top of the data HTTP client and
//! converts wire DTOs into domain tickers. The CAP price comes from a
//! GraphQL subgraph through the same client.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument};

use crate::domain::market::MarketId;
use crate::domain::price::{Candle, Ticker, TickerKind};
use crate::ports::market_feed::TickerSource;

use super::client::DataClient;
use super::types::{CandlesResponse, TickerAllResponse, TokenDayDataResponse};

/// Subgraph endpoint and the token whose daily close is the CAP price.
#[derive(Debug, Clone)]
struct CapSubgraph {
    url: String,
    token: Address,
}

/// Ticker adapter that wraps the data HTTP client.
pub struct RestTickerSource {
    client: Arc<DataClient>,
    cap: Option<CapSubgraph>,
}

impl RestTickerSource {
    pub fn new(client: Arc<DataClient>) -> Self {
        Self { client, cap: None }
    }

    pub fn with_cap_subgraph(mut self, url: String, token: Address) -> Self {
        self.cap = Some(CapSubgraph { url, token });
        self
    }
}

/// Latest-day close query; the subgraph keys tokens by lowercase hex.
fn cap_price_query(token: &Address) -> serde_json::Value {
    let query = format!(
        "query {{ token(id: \"{token:#x}\") {{ tokenDayData(first: 1, orderBy: date, orderDirection: desc) {{ close }} }} }}"
    );
    json!({ "query": query })
}

#[async_trait]
impl TickerSource for RestTickerSource {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn fetch_tickers(&self, kind: &TickerKind) -> Result<HashMap<MarketId, Ticker>> {
        let path = format!("/ticker/all?type={}", kind.as_str());
        let response = self
            .client
            .get(&path)
            .await
            .context("Failed to fetch tickers")?;

        let body: TickerAllResponse = response
            .json()
            .await
            .context("Failed to parse ticker response")?;

        debug!(markets = body.len(), "Tickers fetched");

        Ok(body
            .into_iter()
            .map(|(market, dto)| (market, Ticker::from(dto)))
            .collect())
    }

    #[instrument(skip(self))]
    async fn fetch_candles(&self, market: &str, resolution: u64, end: i64) -> Result<Vec<Candle>> {
        let path = format!("/candles/{market}?resolution={resolution}&end={end}");
        let response = self
            .client
            .get(&path)
            .await
            .context("Failed to fetch candles")?;

        let body: CandlesResponse = response
            .json()
            .await
            .context("Failed to parse candle response")?;

        Ok(body.into_iter().map(Candle::from).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_cap_price(&self) -> Result<Option<Decimal>> {
        let Some(cap) = &self.cap else {
            anyhow::bail!("CAP subgraph not configured");
        };

        let response = self
            .client
            .post_json(&cap.url, &cap_price_query(&cap.token))
            .await
            .context("Failed to query CAP subgraph")?;

        let body: TokenDayDataResponse = response
            .json()
            .await
            .context("Failed to parse CAP subgraph response")?;

        let close = body.latest_close();
        debug!(close = ?close, "CAP price fetched");
        Ok(close)
    }
}
