/// Perpetual-Futures Screener - Shared Library
///
/// This library provides the rolling metrics pipeline behind the `screener`
/// binary:
/// - Bounded per-symbol open-interest history with horizon deltas
/// - Four-quadrant structure classification and composite scoring
/// - Ranked row building and plain-text open-interest alerts
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::alert::{alert_lines, format_alert};
pub use shared::config::ScreenerConfig;
pub use shared::history::{HistoryEntry, HistoryStore, RETENTION_WINDOW_SECS};
pub use shared::metrics::{DerivedMetrics, StructureLabel, build_rows, classify, rank, score};
