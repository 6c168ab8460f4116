//! Wire format of the metrics API and normalization into [`MetricRow`]

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer};

use crate::models::{parse_timestamp, MetricRow};

/// Response envelope shared by every pipe
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct PipeResponse<T> {
    #[serde(default = "Vec::new", deserialize_with = "nullable_vec")]
    pub data: Vec<T>,
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A numeric cell as the API may send it: a number, a numeric string, or null
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A timestamp as the API may send it: formatted text or unix seconds,
/// possibly fractional. Anything else decodes as `Unknown` and the row is
/// skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Stamp {
    Unix(i64),
    UnixFraction(f64),
    Text(String),
    Unknown(serde::de::IgnoredAny),
}

impl Stamp {
    fn parse(&self) -> Option<NaiveDateTime> {
        let parsed = match self {
            Self::Unix(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
            Self::UnixFraction(secs) if secs.is_finite() => {
                // saturating cast, out-of-range seconds yield None
                DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.naive_utc())
            }
            Self::Text(s) => parse_timestamp(s),
            Self::UnixFraction(_) | Self::Unknown(_) => None,
        };
        parsed.and_then(|ts| ts.with_nanosecond(0))
    }
}

/// One row of the metrics pipe before normalization
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawMetricRow {
    #[serde(alias = "time", alias = "bucket")]
    pub timestamp: Option<Stamp>,
    pub request_count: Option<Cell>,
    pub generation_time_p50: Option<Cell>,
    pub generation_time_p95: Option<Cell>,
    pub tokens_per_sec_p50: Option<Cell>,
    pub tokens_per_sec_p95: Option<Cell>,
    pub total_prompt_tokens: Option<Cell>,
    pub total_completion_tokens: Option<Cell>,
    pub total_cost: Option<Cell>,
}

impl RawMetricRow {
    /// Coerce nulls, negatives and non-finite values to zero.
    ///
    /// Returns `None` when the row has no usable timestamp.
    pub fn normalize(&self) -> Option<MetricRow> {
        let timestamp = self.timestamp.as_ref().and_then(Stamp::parse)?;

        Some(MetricRow {
            timestamp,
            request_count: count(self.request_count.as_ref()),
            total_prompt_tokens: count(self.total_prompt_tokens.as_ref()),
            total_completion_tokens: count(self.total_completion_tokens.as_ref()),
            total_cost: real(self.total_cost.as_ref()),
            generation_time_p50: real(self.generation_time_p50.as_ref()),
            generation_time_p95: real(self.generation_time_p95.as_ref()),
            tokens_per_sec_p50: real(self.tokens_per_sec_p50.as_ref()),
            tokens_per_sec_p95: real(self.tokens_per_sec_p95.as_ref()),
        })
    }
}

fn real(cell: Option<&Cell>) -> f64 {
    match cell.and_then(Cell::as_f64) {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn count(cell: Option<&Cell>) -> u64 {
    // saturating float-to-int cast, value already non-negative
    real(cell).round() as u64
}

/// One row of the models pipe
#[derive(Debug, Deserialize)]
pub(crate) struct ModelRow {
    pub model: Option<String>,
}

/// One row of the groups pipe
#[derive(Debug, Deserialize)]
pub(crate) struct GroupRow {
    pub group_id: Option<String>,
}
