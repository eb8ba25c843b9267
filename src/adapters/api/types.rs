//! Data API Response Types
//!
//! Wire shapes of the ticker and candle endpoints and of the subgraph's
//! token day data. Prices may arrive as JSON numbers or strings; both
//! deserialize into `Decimal`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::price::Ticker;

/// One OHLC entry. `latest` snapshots may carry only `c` and `t`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerDto {
  #[serde(default)]
  pub o: Option<Decimal>,
  #[serde(default)]
  pub h: Option<Decimal>,
  #[serde(default)]
  pub l: Option<Decimal>,
  /// Close price.
  pub c: Decimal,
  /// Close timestamp.
  pub t: i64,
}

impl From<TickerDto> for Ticker {
  fn from(dto: TickerDto) -> Self {
    Self {
      o: dto.o.unwrap_or(dto.c),
      h: dto.h.unwrap_or(dto.c),
      l: dto.l.unwrap_or(dto.c),
      c: dto.c,
      t: dto.t,
    }
  }
}

/// `GET /ticker/all` body: market → ticker.
pub type TickerAllResponse = HashMap<String, TickerDto>;

/// `GET /candles/{market}` body.
pub type CandlesResponse = Vec<TickerDto>;

/// Subgraph reply to a `token { tokenDayData { close } }` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenDayDataResponse {
  #[serde(default)]
  pub data: Option<TokenData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenData {
  #[serde(default)]
  pub token: Option<TokenDayData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenDayData {
  #[serde(rename = "tokenDayData", default)]
  pub day_data: Vec<DayClose>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayClose {
  pub close: Decimal,
}

impl TokenDayDataResponse {
  /// Close of the most recent day, if the token has any day data.
  pub fn latest_close(&self) -> Option<Decimal> {
    self
      .data
      .as_ref()?
      .token
      .as_ref()?
      .day_data
      .first()
      .map(|d| d.close)
  }
}
