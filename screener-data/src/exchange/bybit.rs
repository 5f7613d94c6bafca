//! Bybit linear perpetual REST snapshot source.
//!
//! See docs: <https://bybit-exchange.github.io/docs/v5/market/tickers>

use crate::{
    de::{coerce_f64, de_opt_str_f64},
    error::DataError,
    exchange::{ExchangeId, SnapshotSource, get_json},
    snapshot::InstrumentSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

/// Bybit REST API base url.
pub const BASE_URL: &str = "https://api.bybit.com";

/// REST snapshot source for Bybit USDT-margined linear perpetuals.
///
/// A single tickers call carries price, volume, open interest, and funding,
/// so one request covers the whole universe.
#[derive(Debug, Clone)]
pub struct Bybit {
    liquidity_floor_usd: f64,
}

impl Bybit {
    pub fn new(liquidity_floor_usd: f64) -> Self {
        Self {
            liquidity_floor_usd,
        }
    }
}

/// Standard Bybit v5 REST envelope.
#[derive(Debug, Deserialize)]
struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: T,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    list: Vec<BybitTicker>,
}

/// Subset of `/v5/market/tickers?category=linear`.
#[derive(Debug, Deserialize)]
struct BybitTicker {
    symbol: String,
    #[serde(rename = "lastPrice", deserialize_with = "de_opt_str_f64", default)]
    last_price: Option<f64>,
    #[serde(rename = "prevPrice24h", deserialize_with = "de_opt_str_f64", default)]
    prev_price_24h: Option<f64>,
    #[serde(rename = "turnover24h", deserialize_with = "de_opt_str_f64", default)]
    turnover_24h: Option<f64>,
    #[serde(rename = "openInterest", deserialize_with = "de_opt_str_f64", default)]
    open_interest: Option<f64>,
    #[serde(rename = "fundingRate", deserialize_with = "de_opt_str_f64", default)]
    funding_rate: Option<f64>,
}

#[async_trait]
impl SnapshotSource for Bybit {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<InstrumentSnapshot>, DataError> {
        let response: BybitResponse<TickerResult> = get_json(
            client,
            &format!("{BASE_URL}/v5/market/tickers?category=linear"),
        )
        .await?;

        if response.ret_code != 0 {
            return Err(DataError::Api {
                exchange: "bybit",
                code: response.ret_code.to_string(),
                message: response.ret_msg,
            });
        }

        let observed_at =
            DateTime::from_timestamp_millis(response.time).unwrap_or_else(Utc::now);

        let snapshots: Vec<InstrumentSnapshot> = response
            .result
            .list
            .into_iter()
            .filter(|t| t.symbol.ends_with("USDT"))
            .filter(|t| t.turnover_24h.unwrap_or(0.0) > self.liquidity_floor_usd)
            .map(|ticker| InstrumentSnapshot {
                last_price: coerce_f64(&ticker.symbol, "lastPrice", ticker.last_price),
                open_price_24h: coerce_f64(&ticker.symbol, "prevPrice24h", ticker.prev_price_24h),
                quote_volume_24h: coerce_f64(&ticker.symbol, "turnover24h", ticker.turnover_24h),
                open_interest: coerce_f64(&ticker.symbol, "openInterest", ticker.open_interest),
                funding_rate: coerce_f64(&ticker.symbol, "fundingRate", ticker.funding_rate),
                observed_at,
                symbol: SmolStr::new(&ticker.symbol),
            })
            .collect();

        debug!("{} Bybit perpetuals above the liquidity floor", snapshots.len());

        Ok(snapshots)
    }
}
