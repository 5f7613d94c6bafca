//! Rolling per-symbol open-interest history.
//!
//! Owned explicitly by the refresh loop and mutated only through
//! [`HistoryStore::ingest`]; every update prunes entries older than the
//! retention window so memory stays bounded per symbol. Nothing here is
//! persisted - a restart resets every delta to 0 for one cycle.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use screener_data::InstrumentSnapshot;
use smol_str::SmolStr;
use std::collections::{HashMap, VecDeque};

/// Retention window for open-interest history entries.
pub const RETENTION_WINDOW_SECS: i64 = 7200;

/// One retained open-interest observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub open_interest: f64,
}

/// Per-symbol open-interest time series. Insertion order == time order.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    histories: HashMap<SmolStr, VecDeque<HistoryEntry>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the snapshot's open interest to its symbol history, then drop
    /// every entry older than [`RETENTION_WINDOW_SECS`] relative to the
    /// snapshot's observation time.
    ///
    /// The snapshot is trusted as-is; numeric coercion has already happened
    /// at the source.
    pub fn ingest(&mut self, snapshot: &InstrumentSnapshot) {
        let deque = self.histories.entry(snapshot.symbol.clone()).or_default();
        deque.push_back(HistoryEntry {
            time: snapshot.observed_at,
            open_interest: snapshot.open_interest,
        });

        let cutoff = snapshot.observed_at - ChronoDuration::seconds(RETENTION_WINDOW_SECS);
        while let Some(front) = deque.front() {
            if front.time < cutoff {
                deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// Percentage open-interest change for `symbol` over `horizon_secs`.
    ///
    /// Ages are measured against the newest entry. The reference is the most
    /// recent entry whose age is still >= the horizon - the one nearest the
    /// horizon boundary, NOT the oldest retained entry. Returns 0.0 when no
    /// entry is old enough or the reference value is zero.
    pub fn delta(&self, symbol: &str, horizon_secs: i64) -> f64 {
        let Some(deque) = self.histories.get(symbol) else {
            return 0.0;
        };
        let Some(latest) = deque.back() else {
            return 0.0;
        };

        let boundary = latest.time - ChronoDuration::seconds(horizon_secs);
        let reference = deque.iter().rev().find(|entry| entry.time <= boundary);

        match reference {
            Some(prev) if prev.open_interest != 0.0 => {
                (latest.open_interest - prev.open_interest) / prev.open_interest * 100.0
            }
            _ => 0.0,
        }
    }

    /// Latest retained entry for `symbol`, if any.
    pub fn latest(&self, symbol: &str) -> Option<HistoryEntry> {
        self.histories.get(symbol).and_then(|deque| deque.back()).copied()
    }

    /// Number of symbols currently tracked.
    pub fn symbol_count(&self) -> usize {
        self.histories.len()
    }

    /// Number of retained entries for `symbol`.
    pub fn entry_count(&self, symbol: &str) -> usize {
        self.histories.get(symbol).map_or(0, VecDeque::len)
    }

    /// Drop all history; every delta reads 0 until the store is re-populated.
    pub fn reset(&mut self) {
        self.histories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn snapshot(symbol: &str, open_interest: f64, at: DateTime<Utc>) -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: SmolStr::new(symbol),
            last_price: 100.0,
            open_price_24h: 100.0,
            quote_volume_24h: 50_000_000.0,
            open_interest,
            funding_rate: 0.0001,
            observed_at: at,
        }
    }

    #[test]
    fn test_delta_no_history() {
        let store = HistoryStore::new();
        for horizon in [300, 900, 3600] {
            assert_eq!(store.delta("BTCUSDT", horizon), 0.0);
        }
    }

    #[test]
    fn test_delta_two_entries_400s_apart() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("BTCUSDT", 100.0, t0));
        store.ingest(&snapshot("BTCUSDT", 150.0, t0 + ChronoDuration::seconds(400)));

        // The 400s-old entry is the only one at least 300s old
        assert!((store.delta("BTCUSDT", 300) - 50.0).abs() < 1e-9);
        // Nothing is 900s old yet
        assert_eq!(store.delta("BTCUSDT", 900), 0.0);
    }

    #[test]
    fn test_delta_reference_is_nearest_boundary() {
        // Entries aged 600s / 400s / 350s against a 300s horizon: the 350s
        // entry wins (smallest age still >= the horizon), not the 600s one.
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("ETHUSDT", 100.0, t0));
        store.ingest(&snapshot("ETHUSDT", 110.0, t0 + ChronoDuration::seconds(200)));
        store.ingest(&snapshot("ETHUSDT", 120.0, t0 + ChronoDuration::seconds(250)));
        store.ingest(&snapshot("ETHUSDT", 130.0, t0 + ChronoDuration::seconds(600)));

        let delta = store.delta("ETHUSDT", 300);
        let expected = (130.0 - 120.0) / 120.0 * 100.0;
        assert!((delta - expected).abs() < 1e-9);

        // Inverted selection against the oldest entry would read 30%
        assert!((delta - 30.0).abs() > 1.0);
    }

    #[test]
    fn test_delta_zero_reference() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("SOLUSDT", 0.0, t0));
        store.ingest(&snapshot("SOLUSDT", 50.0, t0 + ChronoDuration::seconds(400)));

        // Division by a zero reference is defined as 0, not an error
        assert_eq!(store.delta("SOLUSDT", 300), 0.0);
    }

    #[test]
    fn test_retention_pruning() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("BTCUSDT", 100.0, t0));
        store.ingest(&snapshot("BTCUSDT", 110.0, t0 + ChronoDuration::seconds(100)));
        assert_eq!(store.entry_count("BTCUSDT"), 2);

        // Next ingest is beyond the retention window for both earlier entries
        let late = t0 + ChronoDuration::seconds(RETENTION_WINDOW_SECS + 101);
        store.ingest(&snapshot("BTCUSDT", 120.0, late));

        assert_eq!(store.entry_count("BTCUSDT"), 1);
        // The evicted entries are invisible to every horizon
        assert_eq!(store.delta("BTCUSDT", 300), 0.0);
        assert_eq!(store.delta("BTCUSDT", 3600), 0.0);
    }

    #[test]
    fn test_entry_at_retention_boundary_survives() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("BTCUSDT", 100.0, t0));
        store.ingest(&snapshot(
            "BTCUSDT",
            120.0,
            t0 + ChronoDuration::seconds(RETENTION_WINDOW_SECS),
        ));

        // Exactly window-old is kept, only strictly older entries drop
        assert_eq!(store.entry_count("BTCUSDT"), 2);
        assert!((store.delta("BTCUSDT", 3600) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("BTCUSDT", 100.0, t0));
        store.ingest(&snapshot("ETHUSDT", 200.0, t0));
        store.ingest(&snapshot("BTCUSDT", 150.0, t0 + ChronoDuration::seconds(400)));

        assert!((store.delta("BTCUSDT", 300) - 50.0).abs() < 1e-9);
        assert_eq!(store.delta("ETHUSDT", 300), 0.0);
        assert_eq!(store.symbol_count(), 2);
    }

    #[test]
    fn test_reset() {
        let mut store = HistoryStore::new();
        let t0 = base_time();
        store.ingest(&snapshot("BTCUSDT", 100.0, t0));
        store.ingest(&snapshot("BTCUSDT", 150.0, t0 + ChronoDuration::seconds(400)));
        assert!(store.delta("BTCUSDT", 300) > 0.0);

        store.reset();
        assert_eq!(store.symbol_count(), 0);
        assert_eq!(store.delta("BTCUSDT", 300), 0.0);
        assert_eq!(store.latest("BTCUSDT"), None);
    }
}
