//! Derived per-instrument metrics.
//!
//! Rebuilt from scratch every refresh cycle: percentage price change,
//! horizon open-interest deltas, four-quadrant structure classification,
//! and the additive composite score used for ranking.

use crate::shared::{config::ScreenerConfig, history::HistoryStore};
use screener_data::InstrumentSnapshot;
use smol_str::SmolStr;

/// Delta horizons surfaced in the table (seconds).
pub const HORIZON_5M_SECS: i64 = 300;
pub const HORIZON_15M_SECS: i64 = 900;
pub const HORIZON_1H_SECS: i64 = 3600;

// Composite score weights. The source dashboards disagreed slightly on
// these; this is the one consistent table used everywhere.
const SCORE_PRICE_MOVE_THRESHOLD_PCT: f64 = 3.0;
const SCORE_PRICE_MOVE_WEIGHT: i32 = 2;
const SCORE_VOLUME_THRESHOLD_USD: f64 = 50_000_000.0;
const SCORE_VOLUME_WEIGHT: i32 = 2;
const SCORE_FUNDING_HEALTHY_MIN: f64 = 0.0;
const SCORE_FUNDING_HEALTHY_MAX: f64 = 0.0003;
const SCORE_FUNDING_WEIGHT: i32 = 1;
const SCORE_BUILD_UP_WEIGHT: i32 = 2;

/// Four-quadrant price/open-interest structure classification.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum StructureLabel {
    /// Price up, open interest up - new longs entering.
    BullishBuildUp,
    /// Price down, open interest up - new shorts entering.
    BearishBuildUp,
    /// Price up, open interest down - shorts exiting.
    ShortCovering,
    /// Price down, open interest down - longs exiting.
    LongClosing,
    /// Either axis is flat.
    #[default]
    Neutral,
}

impl StructureLabel {
    pub fn label(&self) -> &'static str {
        match self {
            StructureLabel::BullishBuildUp => "Bullish build-up",
            StructureLabel::BearishBuildUp => "Bearish build-up",
            StructureLabel::ShortCovering => "Short covering",
            StructureLabel::LongClosing => "Long closing",
            StructureLabel::Neutral => "Neutral",
        }
    }

    /// Whether price and open interest move in the same directional sense.
    pub fn is_build_up(&self) -> bool {
        matches!(
            self,
            StructureLabel::BullishBuildUp | StructureLabel::BearishBuildUp
        )
    }
}

impl std::fmt::Display for StructureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Computed row for one instrument. Derived fresh each cycle, never stored.
#[derive(Clone, Debug, Default)]
pub struct DerivedMetrics {
    pub symbol: SmolStr,
    pub last_price: f64,
    pub price_change_pct: f64,
    pub quote_volume_24h: f64,
    pub funding_rate: f64,
    pub open_interest: f64,
    pub oi_delta_5m: f64,
    pub oi_delta_15m: f64,
    pub oi_delta_1h: f64,
    pub structure: StructureLabel,
    pub score: i32,
}

/// Classify the price/open-interest quadrant.
///
/// An exact zero on either axis ties toward [`StructureLabel::Neutral`].
pub fn classify(price_change_pct: f64, oi_delta_pct: f64) -> StructureLabel {
    match (price_change_pct, oi_delta_pct) {
        (p, d) if p > 0.0 && d > 0.0 => StructureLabel::BullishBuildUp,
        (p, d) if p < 0.0 && d > 0.0 => StructureLabel::BearishBuildUp,
        (p, d) if p > 0.0 && d < 0.0 => StructureLabel::ShortCovering,
        (p, d) if p < 0.0 && d < 0.0 => StructureLabel::LongClosing,
        _ => StructureLabel::Neutral,
    }
}

/// Additive composite score.
///
/// Pure function of the row: no side effects, identical rows always score
/// identically.
pub fn score(row: &DerivedMetrics) -> i32 {
    let mut score = 0;
    if row.price_change_pct.abs() > SCORE_PRICE_MOVE_THRESHOLD_PCT {
        score += SCORE_PRICE_MOVE_WEIGHT;
    }
    if row.quote_volume_24h > SCORE_VOLUME_THRESHOLD_USD {
        score += SCORE_VOLUME_WEIGHT;
    }
    if (SCORE_FUNDING_HEALTHY_MIN..=SCORE_FUNDING_HEALTHY_MAX).contains(&row.funding_rate) {
        score += SCORE_FUNDING_WEIGHT;
    }
    if row.structure.is_build_up() {
        score += SCORE_BUILD_UP_WEIGHT;
    }
    score
}

/// Build one derived row per snapshot against the current history.
///
/// Sources pre-filter to the liquidity floor; the filter is applied again
/// here so a row below the floor can never reach scoring.
pub fn build_rows(
    snapshots: &[InstrumentSnapshot],
    history: &HistoryStore,
    config: &ScreenerConfig,
) -> Vec<DerivedMetrics> {
    snapshots
        .iter()
        .filter(|snapshot| snapshot.quote_volume_24h > config.liquidity_floor_usd)
        .map(|snapshot| {
            let price_change_pct = snapshot.price_change_pct();
            let oi_delta_5m = history.delta(&snapshot.symbol, HORIZON_5M_SECS);
            let mut row = DerivedMetrics {
                symbol: snapshot.symbol.clone(),
                last_price: snapshot.last_price,
                price_change_pct,
                quote_volume_24h: snapshot.quote_volume_24h,
                funding_rate: snapshot.funding_rate,
                open_interest: snapshot.open_interest,
                oi_delta_5m,
                oi_delta_15m: history.delta(&snapshot.symbol, HORIZON_15M_SECS),
                oi_delta_1h: history.delta(&snapshot.symbol, HORIZON_1H_SECS),
                structure: classify(price_change_pct, oi_delta_5m),
                score: 0,
            };
            row.score = score(&row);
            row
        })
        .collect()
}

/// Stable sort by composite score, descending; ties keep fetch order.
pub fn rank(rows: &mut [DerivedMetrics]) {
    rows.sort_by(|a, b| b.score.cmp(&a.score));
}
