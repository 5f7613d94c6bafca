//! Per-exchange REST snapshot sources.

use crate::{error::DataError, snapshot::InstrumentSnapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{str::FromStr, time::Duration};

pub mod binance;
pub mod bybit;
pub mod okx;

/// Per-request timeout applied to every REST call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Unique identifier for a supported exchange snapshot source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ExchangeId {
    #[default]
    BinanceFuturesUsd,
    Okx,
    Bybit,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::BinanceFuturesUsd => "binance",
            ExchangeId::Okx => "okx",
            ExchangeId::Bybit => "bybit",
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" | "binance_futures_usd" => Ok(ExchangeId::BinanceFuturesUsd),
            "okx" => Ok(ExchangeId::Okx),
            "bybit" => Ok(ExchangeId::Bybit),
            other => Err(DataError::UnknownExchange(other.to_string())),
        }
    }
}

/// A pollable source of per-instrument market snapshots.
///
/// A fetch either yields a complete, coerced snapshot set or fails as a
/// whole; partial results are never returned, so a failed cycle leaves the
/// caller's state untouched.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Exchange this source polls.
    fn exchange(&self) -> ExchangeId;

    /// Poll the exchange once, returning one snapshot per perpetual that
    /// clears the liquidity floor.
    async fn fetch(&self, client: &Client) -> Result<Vec<InstrumentSnapshot>, DataError>;
}

/// Construct the [`SnapshotSource`] for an exchange.
pub fn source_for(exchange: ExchangeId, liquidity_floor_usd: f64) -> Box<dyn SnapshotSource> {
    match exchange {
        ExchangeId::BinanceFuturesUsd => {
            Box::new(binance::BinanceFuturesUsd::new(liquidity_floor_usd))
        }
        ExchangeId::Okx => Box::new(okx::Okx::new(liquidity_floor_usd)),
        ExchangeId::Bybit => Box::new(bybit::Bybit::new(liquidity_floor_usd)),
    }
}

/// GET `url` and decode the JSON body.
pub(crate) async fn get_json<T>(client: &Client, url: &str) -> Result<T, DataError>
where
    T: DeserializeOwned,
{
    let response = client
        .get(url)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|err| DataError::Http(format!("request failed ({url}): {err}")))?;

    if let Err(status_err) = response.error_for_status_ref() {
        return Err(DataError::Http(format!(
            "request rejected ({url}): {status_err}"
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|err| DataError::Decode(format!("payload decode failed ({url}): {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_id_round_trip() {
        for exchange in [ExchangeId::BinanceFuturesUsd, ExchangeId::Okx, ExchangeId::Bybit] {
            assert_eq!(ExchangeId::from_str(exchange.as_str()).unwrap(), exchange);
        }
    }

    #[test]
    fn test_exchange_id_case_insensitive() {
        assert_eq!(ExchangeId::from_str("OKX").unwrap(), ExchangeId::Okx);
        assert_eq!(
            ExchangeId::from_str("Binance").unwrap(),
            ExchangeId::BinanceFuturesUsd
        );
    }

    #[test]
    fn test_exchange_id_unknown() {
        assert_eq!(
            ExchangeId::from_str("ftx"),
            Err(DataError::UnknownExchange("ftx".to_string()))
        );
    }
}
