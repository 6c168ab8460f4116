//! Metrics data models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{BucketWidth, TimeRange};

/// One observation of the pre-aggregated metrics stream.
///
/// Rows coming from the source are at its native granularity; rows produced
/// by the aggregator describe one bucket. Every numeric field is
/// non-negative, and values the source reported as null are already zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Start of the interval this row describes (second precision)
    pub timestamp: NaiveDateTime,

    // Counters
    /// Number of calls
    pub request_count: u64,

    /// Sum of prompt tokens
    pub total_prompt_tokens: u64,

    /// Sum of completion tokens
    pub total_completion_tokens: u64,

    // Cost metrics
    /// Total cost in currency units
    pub total_cost: f64,

    // Latency metrics
    /// 50th percentile generation time in milliseconds
    pub generation_time_p50: f64,

    /// 95th percentile generation time in milliseconds
    pub generation_time_p95: f64,

    // Throughput metrics
    /// 50th percentile tokens per second
    pub tokens_per_sec_p50: f64,

    /// 95th percentile tokens per second
    pub tokens_per_sec_p95: f64,
}

impl MetricRow {
    /// A row with every metric set to zero
    pub fn zero(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            request_count: 0,
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            total_cost: 0.0,
            generation_time_p50: 0.0,
            generation_time_p95: 0.0,
            tokens_per_sec_p50: 0.0,
            tokens_per_sec_p95: 0.0,
        }
    }

    /// Calculate total tokens
    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens
            .saturating_add(self.total_completion_tokens)
    }

    /// Whether every metric is zero
    pub fn is_empty(&self) -> bool {
        self.request_count == 0
            && self.total_prompt_tokens == 0
            && self.total_completion_tokens == 0
            && self.total_cost == 0.0
            && self.generation_time_p50 == 0.0
            && self.generation_time_p95 == 0.0
            && self.tokens_per_sec_p50 == 0.0
            && self.tokens_per_sec_p95 == 0.0
    }
}

/// A contiguous series of buckets covering a time range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    /// Range the series covers
    pub range: TimeRange,

    /// Width of every bucket
    pub width: BucketWidth,

    /// One row per bucket, ascending by timestamp
    pub rows: Vec<MetricRow>,
}

impl ResampledSeries {
    /// Number of buckets
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series has no buckets (only for a zero-length range)
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate the bucket rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, MetricRow> {
        self.rows.iter()
    }

    /// Totals across the whole series
    pub fn summary(&self) -> SeriesSummary {
        let mut summary = SeriesSummary::default();
        for row in &self.rows {
            summary.total_requests = summary
                .total_requests
                .saturating_add(row.request_count);
            summary.total_prompt_tokens = summary
                .total_prompt_tokens
                .saturating_add(row.total_prompt_tokens);
            summary.total_completion_tokens = summary
                .total_completion_tokens
                .saturating_add(row.total_completion_tokens);
            summary.total_cost += row.total_cost;
            if row.request_count > 0 {
                summary.active_buckets += 1;
            }
        }
        summary.buckets = self.rows.len();
        summary
    }
}

impl IntoIterator for ResampledSeries {
    type Item = MetricRow;
    type IntoIter = std::vec::IntoIter<MetricRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResampledSeries {
    type Item = &'a MetricRow;
    type IntoIter = std::slice::Iter<'a, MetricRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Summary statistics for a resampled series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Number of buckets in the series
    pub buckets: usize,

    /// Buckets that saw at least one request
    pub active_buckets: usize,

    /// Total requests
    pub total_requests: u64,

    /// Total prompt tokens
    pub total_prompt_tokens: u64,

    /// Total completion tokens
    pub total_completion_tokens: u64,

    /// Total cost
    pub total_cost: f64,
}

impl SeriesSummary {
    /// Calculate total tokens
    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens
            .saturating_add(self.total_completion_tokens)
    }

    /// Average cost per request
    pub fn cost_per_request(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_cost / self.total_requests as f64
        }
    }
}
