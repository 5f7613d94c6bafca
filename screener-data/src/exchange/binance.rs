//! Binance USDⓈ-M futures REST snapshot source.
//!
//! See docs: <https://binance-docs.github.io/apidocs/futures/en/>

use crate::{
    de::{coerce_f64, de_opt_str_f64, de_str},
    error::DataError,
    exchange::{ExchangeId, SnapshotSource, get_json},
    snapshot::InstrumentSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::Client;
use serde::Deserialize;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Binance futures REST API base url.
pub const BASE_URL: &str = "https://fapi.binance.com";

/// Concurrent in-flight requests for the per-symbol open interest fan-out.
const OPEN_INTEREST_CONCURRENCY: usize = 8;

/// REST snapshot source for Binance USDT-margined perpetuals.
///
/// Bulk endpoints supply prices, volumes, and funding; open interest is only
/// served per symbol, so it is fetched concurrently for the rows that
/// survive the liquidity floor.
#[derive(Debug, Clone)]
pub struct BinanceFuturesUsd {
    liquidity_floor_usd: f64,
}

impl BinanceFuturesUsd {
    pub fn new(liquidity_floor_usd: f64) -> Self {
        Self {
            liquidity_floor_usd,
        }
    }
}

/// Subset of `/fapi/v1/exchangeInfo` required to identify live perpetuals.
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(rename = "contractType", default)]
    contract_type: String,
    #[serde(default)]
    status: String,
}

/// Subset of `/fapi/v1/ticker/24hr`.
#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    #[serde(rename = "lastPrice", deserialize_with = "de_opt_str_f64", default)]
    last_price: Option<f64>,
    #[serde(rename = "openPrice", deserialize_with = "de_opt_str_f64", default)]
    open_price: Option<f64>,
    #[serde(rename = "quoteVolume", deserialize_with = "de_opt_str_f64", default)]
    quote_volume: Option<f64>,
}

/// Subset of `/fapi/v1/premiumIndex`.
#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,
    #[serde(
        rename = "lastFundingRate",
        deserialize_with = "de_opt_str_f64",
        default
    )]
    last_funding_rate: Option<f64>,
}

/// `/fapi/v1/openInterest` response.
#[derive(Debug, Deserialize)]
struct OpenInterestResponse {
    #[serde(rename = "openInterest", deserialize_with = "de_str")]
    open_interest: f64,
    time: i64,
}

#[async_trait]
impl SnapshotSource for BinanceFuturesUsd {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::BinanceFuturesUsd
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<InstrumentSnapshot>, DataError> {
        let info: ExchangeInfo =
            get_json(client, &format!("{BASE_URL}/fapi/v1/exchangeInfo")).await?;
        let perpetuals: HashSet<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.contract_type == "PERPETUAL" && s.status == "TRADING")
            .map(|s| s.symbol)
            .collect();

        let tickers: Vec<Ticker24h> =
            get_json(client, &format!("{BASE_URL}/fapi/v1/ticker/24hr")).await?;
        let premium: Vec<PremiumIndex> =
            get_json(client, &format!("{BASE_URL}/fapi/v1/premiumIndex")).await?;
        let funding: HashMap<String, Option<f64>> = premium
            .into_iter()
            .map(|p| (p.symbol, p.last_funding_rate))
            .collect();

        // Liquidity filter before the per-symbol open interest fan-out
        let liquid: Vec<Ticker24h> = tickers
            .into_iter()
            .filter(|t| perpetuals.contains(&t.symbol))
            .filter(|t| t.quote_volume.unwrap_or(0.0) > self.liquidity_floor_usd)
            .collect();

        debug!(
            "{} Binance perpetuals above the liquidity floor",
            liquid.len()
        );

        let oi_futures: Vec<_> = liquid
            .iter()
            .map(|t| fetch_open_interest(client, &t.symbol))
            .collect();
        let open_interest: Vec<OpenInterestResponse> = stream::iter(oi_futures)
            .buffered(OPEN_INTEREST_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(liquid
            .into_iter()
            .zip(open_interest)
            .map(|(ticker, oi)| {
                let observed_at =
                    DateTime::from_timestamp_millis(oi.time).unwrap_or_else(Utc::now);
                let funding_rate = funding.get(&ticker.symbol).copied().flatten();
                InstrumentSnapshot {
                    last_price: coerce_f64(&ticker.symbol, "lastPrice", ticker.last_price),
                    open_price_24h: coerce_f64(&ticker.symbol, "openPrice", ticker.open_price),
                    quote_volume_24h: coerce_f64(
                        &ticker.symbol,
                        "quoteVolume",
                        ticker.quote_volume,
                    ),
                    open_interest: oi.open_interest,
                    funding_rate: coerce_f64(&ticker.symbol, "lastFundingRate", funding_rate),
                    observed_at,
                    symbol: SmolStr::new(&ticker.symbol),
                }
            })
            .collect())
    }
}

/// Poll `/fapi/v1/openInterest` for one symbol.
async fn fetch_open_interest(
    client: &Client,
    symbol: &str,
) -> Result<OpenInterestResponse, DataError> {
    get_json(
        client,
        &format!("{BASE_URL}/fapi/v1/openInterest?symbol={symbol}"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_24h_de() {
        let input = r#"{
            "symbol": "BTCUSDT",
            "lastPrice": "43250.10",
            "openPrice": "42000.00",
            "quoteVolume": "2120000000.55",
            "priceChange": "1250.10"
        }"#;
        let ticker: Ticker24h = serde_json::from_str(input).unwrap();
        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.last_price, Some(43250.10));
        assert_eq!(ticker.open_price, Some(42000.00));
        assert_eq!(ticker.quote_volume, Some(2_120_000_000.55));
    }

    #[test]
    fn test_premium_index_de_missing_funding() {
        // Index-only products report no funding rate
        let input = r#"{"symbol": "BTCUSDT_240628", "lastFundingRate": ""}"#;
        let premium: PremiumIndex = serde_json::from_str(input).unwrap();
        assert_eq!(premium.last_funding_rate, None);
    }

    #[test]
    fn test_open_interest_de() {
        let input = r#"{"openInterest": "83500.123", "symbol": "BTCUSDT", "time": 1700000000000}"#;
        let oi: OpenInterestResponse = serde_json::from_str(input).unwrap();
        assert_eq!(oi.open_interest, 83500.123);
        assert_eq!(oi.time, 1_700_000_000_000);
    }

    #[test]
    fn test_exchange_info_perpetual_filter() {
        let input = r#"{"symbols": [
            {"symbol": "BTCUSDT", "contractType": "PERPETUAL", "status": "TRADING"},
            {"symbol": "BTCUSDT_240628", "contractType": "CURRENT_QUARTER", "status": "TRADING"},
            {"symbol": "OLDUSDT", "contractType": "PERPETUAL", "status": "SETTLING"}
        ]}"#;
        let info: ExchangeInfo = serde_json::from_str(input).unwrap();
        let live: Vec<_> = info
            .symbols
            .into_iter()
            .filter(|s| s.contract_type == "PERPETUAL" && s.status == "TRADING")
            .map(|s| s.symbol)
            .collect();
        assert_eq!(live, vec!["BTCUSDT".to_string()]);
    }
}
