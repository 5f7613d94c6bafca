//! Deserialization helpers for exchange payloads that encode numbers as
//! JSON strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Deserialize a string as an `f64`.
pub fn de_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Deserialize an optional string as an optional `f64`.
///
/// Exchanges report "no value" as an absent field, `null`, or an empty
/// string; all three map to `None`.
pub fn de_opt_str_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => Ok(raw.parse::<f64>().ok()),
        None => Ok(None),
    }
}

/// Deserialize an epoch-millisecond string (e.g. OKX "ts") as a UTC datetime.
pub fn de_str_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let epoch_ms = raw.parse::<i64>().map_err(serde::de::Error::custom)?;
    DateTime::from_timestamp_millis(epoch_ms)
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {epoch_ms}")))
}

/// Coerce an optional parsed field to the 0.0 sentinel, logging the gap.
///
/// Downstream scoring and delta math consume only the typed snapshot, so a
/// missing or invalid numeric never propagates past this point.
pub fn coerce_f64(symbol: &str, field: &'static str, value: Option<f64>) -> f64 {
    match value {
        Some(value) => value,
        None => {
            warn!("{} {} missing or invalid, coerced to 0", symbol, field);
            0.0
        }
    }
}
