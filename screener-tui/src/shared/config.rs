//! Screener configuration sourced from environment variables.
//!
//! Parsed once at startup; invalid values fall back to their defaults and
//! out-of-range values are clamped, never fatal.

use screener_data::ExchangeId;
use std::str::FromStr;
use tracing::warn;

/// Alert threshold bounds (percent).
const OI_ALERT_THRESHOLD_MIN_PCT: f64 = 1.0;
const OI_ALERT_THRESHOLD_MAX_PCT: f64 = 20.0;

/// Fastest allowed refresh cadence.
const MIN_REFRESH_INTERVAL_SECS: u64 = 5;

/// Runtime configuration for one screener process.
#[derive(Clone, Debug)]
pub struct ScreenerConfig {
    /// Exchange snapshot source to poll.
    pub exchange: ExchangeId,
    /// Seconds between refresh cycles.
    pub refresh_interval_secs: u64,
    /// Absolute 5m open-interest delta (percent) that raises an alert.
    pub oi_alert_threshold_pct: f64,
    /// Minimum 24h quote volume for an instrument to be considered.
    pub liquidity_floor_usd: f64,
    /// Number of ranked rows rendered in the table.
    pub top_n_display: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeId::BinanceFuturesUsd,
            refresh_interval_secs: 60,
            oi_alert_threshold_pct: 5.0,
            liquidity_floor_usd: 30_000_000.0,
            top_n_display: 25,
        }
    }
}

impl ScreenerConfig {
    /// Build from environment variables: EXCHANGE, REFRESH_INTERVAL_SECS,
    /// OI_ALERT_THRESHOLD_PCT, LIQUIDITY_FLOOR_USD, TOP_N_DISPLAY.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            exchange: env_parse("EXCHANGE", defaults.exchange),
            refresh_interval_secs: env_parse(
                "REFRESH_INTERVAL_SECS",
                defaults.refresh_interval_secs,
            )
            .max(MIN_REFRESH_INTERVAL_SECS),
            oi_alert_threshold_pct: clamp_alert_threshold(env_parse(
                "OI_ALERT_THRESHOLD_PCT",
                defaults.oi_alert_threshold_pct,
            )),
            liquidity_floor_usd: env_parse("LIQUIDITY_FLOOR_USD", defaults.liquidity_floor_usd)
                .max(0.0),
            top_n_display: env_parse("TOP_N_DISPLAY", defaults.top_n_display).max(1),
        }
    }
}

/// Clamp the alert threshold into its meaningful 1-20% range.
fn clamp_alert_threshold(pct: f64) -> f64 {
    pct.clamp(OI_ALERT_THRESHOLD_MIN_PCT, OI_ALERT_THRESHOLD_MAX_PCT)
}

/// Parse `key` from the environment, falling back to `default` when the
/// variable is unset or unparseable.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("invalid {} value {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScreenerConfig::default();
        assert_eq!(config.exchange, ExchangeId::BinanceFuturesUsd);
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.oi_alert_threshold_pct, 5.0);
        assert_eq!(config.liquidity_floor_usd, 30_000_000.0);
        assert_eq!(config.top_n_display, 25);
    }

    #[test]
    fn test_clamp_alert_threshold() {
        struct TestCase {
            input: f64,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: in range passes through
                input: 5.0,
                expected: 5.0,
            },
            TestCase {
                // TC1: below range clamps up
                input: 0.2,
                expected: 1.0,
            },
            TestCase {
                // TC2: above range clamps down
                input: 40.0,
                expected: 20.0,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                clamp_alert_threshold(test.input),
                test.expected,
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_env_parse_fallbacks() {
        // Unset variable falls back
        assert_eq!(env_parse("SCREENER_TEST_UNSET_KEY", 42u64), 42);

        // Unparseable variable falls back
        std::env::set_var("SCREENER_TEST_BAD_KEY", "not-a-number");
        assert_eq!(env_parse("SCREENER_TEST_BAD_KEY", 7usize), 7);

        // Valid variable parses
        std::env::set_var("SCREENER_TEST_GOOD_KEY", "12.5");
        assert_eq!(env_parse("SCREENER_TEST_GOOD_KEY", 0.0f64), 12.5);
    }
}
