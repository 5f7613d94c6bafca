use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Normalised per-instrument observation for one polling cycle.
///
/// All numeric fields have already been coerced by the producing
/// [`SnapshotSource`](crate::exchange::SnapshotSource): a field the exchange
/// reported as missing or unparseable arrives here as `0.0`, never as an
/// error.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct InstrumentSnapshot {
    /// Exchange symbol, e.g. "BTCUSDT" or "BTC-USDT-SWAP".
    pub symbol: SmolStr,
    /// Last traded price.
    pub last_price: f64,
    /// Price 24 hours ago (open of the rolling 24h window).
    pub open_price_24h: f64,
    /// 24h traded volume in quote currency (USD-equivalent).
    pub quote_volume_24h: f64,
    /// Total open interest reported by the exchange. Contracts or base units
    /// depending on the exchange, but consistent within one source.
    pub open_interest: f64,
    /// Latest funding rate as a fraction (0.0001 == 1 bp).
    pub funding_rate: f64,
    /// Exchange-provided observation timestamp.
    pub observed_at: DateTime<Utc>,
}

impl InstrumentSnapshot {
    /// Percentage change of the last price against the 24h open.
    ///
    /// Defined as 0.0 when the open is zero.
    pub fn price_change_pct(&self) -> f64 {
        if self.open_price_24h > 0.0 {
            (self.last_price - self.open_price_24h) / self.open_price_24h * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(last: f64, open: f64) -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: SmolStr::new("BTCUSDT"),
            last_price: last,
            open_price_24h: open,
            quote_volume_24h: 0.0,
            open_interest: 0.0,
            funding_rate: 0.0,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_change_pct() {
        let up = snapshot(105.0, 100.0);
        assert!((up.price_change_pct() - 5.0).abs() < 1e-9);

        let down = snapshot(95.0, 100.0);
        assert!((down.price_change_pct() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_change_pct_zero_open() {
        let sentinel = snapshot(105.0, 0.0);
        assert_eq!(sentinel.price_change_pct(), 0.0);
    }
}
