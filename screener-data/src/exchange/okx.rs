//! OKX perpetual swap REST snapshot source.
//!
//! See docs: <https://www.okx.com/docs-v5/en/#public-data-rest-api>

use crate::{
    de::{coerce_f64, de_opt_str_f64, de_str_epoch_ms_as_datetime_utc},
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
use std::collections::HashMap;
use tracing::debug;

/// OKX REST API base url.
pub const BASE_URL: &str = "https://www.okx.com";

/// Concurrent in-flight requests for the per-instrument funding fan-out.
const FUNDING_CONCURRENCY: usize = 8;

/// REST snapshot source for OKX USDT-margined perpetual swaps.
///
/// Tickers and open interest are served in bulk; funding is only served per
/// instrument, so it is fetched concurrently for the rows that survive the
/// liquidity floor.
#[derive(Debug, Clone)]
pub struct Okx {
    liquidity_floor_usd: f64,
}

impl Okx {
    pub fn new(liquidity_floor_usd: f64) -> Self {
        Self {
            liquidity_floor_usd,
        }
    }
}

/// Standard OKX REST envelope.
#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Vec<T>,
}

impl<T> OkxResponse<T> {
    /// Unwrap the envelope, mapping a non-zero code to [`DataError::Api`].
    fn into_data(self) -> Result<Vec<T>, DataError> {
        if self.code != "0" {
            return Err(DataError::Api {
                exchange: "okx",
                code: self.code,
                message: self.msg,
            });
        }
        Ok(self.data)
    }
}

/// Subset of `/api/v5/market/tickers`.
#[derive(Debug, Deserialize)]
struct OkxTicker {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(deserialize_with = "de_opt_str_f64", default)]
    last: Option<f64>,
    #[serde(rename = "open24h", deserialize_with = "de_opt_str_f64", default)]
    open_24h: Option<f64>,
    // volCcy24h is base-denominated for swaps; USD volume is derived below
    #[serde(rename = "volCcy24h", deserialize_with = "de_opt_str_f64", default)]
    vol_ccy_24h: Option<f64>,
    #[serde(rename = "ts", deserialize_with = "de_str_epoch_ms_as_datetime_utc")]
    time: DateTime<Utc>,
}

impl OkxTicker {
    /// Approximate 24h quote volume in USD.
    fn quote_volume_24h(&self) -> Option<f64> {
        match (self.vol_ccy_24h, self.last) {
            (Some(vol), Some(last)) => Some(vol * last),
            _ => None,
        }
    }
}

/// Subset of `/api/v5/public/open-interest`.
#[derive(Debug, Deserialize)]
struct OkxOpenInterest {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "oi", deserialize_with = "de_opt_str_f64", default)]
    contracts: Option<f64>,
}

/// Subset of `/api/v5/public/funding-rate`.
#[derive(Debug, Deserialize)]
struct OkxFundingRate {
    #[serde(rename = "fundingRate", deserialize_with = "de_opt_str_f64", default)]
    funding_rate: Option<f64>,
}

#[async_trait]
impl SnapshotSource for Okx {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<InstrumentSnapshot>, DataError> {
        let tickers: OkxResponse<OkxTicker> = get_json(
            client,
            &format!("{BASE_URL}/api/v5/market/tickers?instType=SWAP"),
        )
        .await?;
        let open_interest: OkxResponse<OkxOpenInterest> = get_json(
            client,
            &format!("{BASE_URL}/api/v5/public/open-interest?instType=SWAP"),
        )
        .await?;

        let open_interest: HashMap<String, Option<f64>> = open_interest
            .into_data()?
            .into_iter()
            .map(|oi| (oi.inst_id, oi.contracts))
            .collect();

        let liquid: Vec<OkxTicker> = tickers
            .into_data()?
            .into_iter()
            .filter(|t| t.inst_id.ends_with("-USDT-SWAP"))
            .filter(|t| t.quote_volume_24h().unwrap_or(0.0) > self.liquidity_floor_usd)
            .collect();

        debug!("{} OKX swaps above the liquidity floor", liquid.len());

        let funding_futures: Vec<_> = liquid
            .iter()
            .map(|t| fetch_funding_rate(client, &t.inst_id))
            .collect();
        let funding: Vec<Option<f64>> = stream::iter(funding_futures)
            .buffered(FUNDING_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(liquid
            .into_iter()
            .zip(funding)
            .map(|(ticker, funding_rate)| {
                let quote_volume_24h = ticker.quote_volume_24h();
                let contracts = open_interest.get(&ticker.inst_id).copied().flatten();
                InstrumentSnapshot {
                    last_price: coerce_f64(&ticker.inst_id, "last", ticker.last),
                    open_price_24h: coerce_f64(&ticker.inst_id, "open24h", ticker.open_24h),
                    quote_volume_24h: coerce_f64(&ticker.inst_id, "volCcy24h", quote_volume_24h),
                    open_interest: coerce_f64(&ticker.inst_id, "oi", contracts),
                    funding_rate: coerce_f64(&ticker.inst_id, "fundingRate", funding_rate),
                    observed_at: ticker.time,
                    symbol: SmolStr::new(&ticker.inst_id),
                }
            })
            .collect())
    }
}

/// Poll `/api/v5/public/funding-rate` for one instrument.
async fn fetch_funding_rate(client: &Client, inst_id: &str) -> Result<Option<f64>, DataError> {
    let response: OkxResponse<OkxFundingRate> = get_json(
        client,
        &format!("{BASE_URL}/api/v5/public/funding-rate?instId={inst_id}"),
    )
    .await?;

    Ok(response
        .into_data()?
        .into_iter()
        .next()
        .and_then(|rate| rate.funding_rate))
}
