//! Plain-text open-interest alerts.
//!
//! Rows whose absolute 5-minute open-interest delta clears the configured
//! threshold are formatted as one line each, ready for any text sink.

use crate::shared::metrics::DerivedMetrics;

/// Format one alert line: `{symbol} | {delta:.2}%`.
pub fn format_alert(row: &DerivedMetrics) -> String {
    format!("{} | {:.2}%", row.symbol, row.oi_delta_5m)
}

/// Alert lines for every row whose absolute 5-minute open-interest delta
/// exceeds `threshold_pct`. Row order is preserved.
pub fn alert_lines(rows: &[DerivedMetrics], threshold_pct: f64) -> Vec<String> {
    rows.iter()
        .filter(|row| row.oi_delta_5m.abs() > threshold_pct)
        .map(format_alert)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol_str::SmolStr;

    fn row(symbol: &str, oi_delta_5m: f64) -> DerivedMetrics {
        DerivedMetrics {
            symbol: SmolStr::new(symbol),
            oi_delta_5m,
            ..DerivedMetrics::default()
        }
    }

    #[test]
    fn test_format_alert() {
        assert_eq!(format_alert(&row("BTCUSDT", 7.251)), "BTCUSDT | 7.25%");
        assert_eq!(format_alert(&row("ETHUSDT", -6.5)), "ETHUSDT | -6.50%");
    }

    #[test]
    fn test_alert_lines_threshold() {
        let rows = vec![
            row("BTCUSDT", 7.0),
            row("ETHUSDT", 4.9),
            row("SOLUSDT", -6.0),
            row("XRPUSDT", 5.0),
        ];

        let lines = alert_lines(&rows, 5.0);
        // Negative deltas alert on magnitude; exactly-at-threshold does not
        assert_eq!(lines, vec!["BTCUSDT | 7.00%", "SOLUSDT | -6.00%"]);
    }

    #[test]
    fn test_alert_lines_empty() {
        let rows = vec![row("BTCUSDT", 0.5)];
        assert!(alert_lines(&rows, 5.0).is_empty());
    }
}
