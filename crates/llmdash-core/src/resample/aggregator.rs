//! Resampling of pre-aggregated rows into fixed-width buckets

use chrono::NaiveDateTime;
use tracing::{debug, trace};

use crate::models::{BucketWidth, MetricRow, ResampledSeries, TimeRange};

/// Percentile used to combine the members' own p95 values
const P95: f64 = 0.95;

/// Number of buckets of `width` needed to cover `range`
pub fn bucket_count(range: &TimeRange, width: BucketWidth) -> usize {
    let span = range.span().num_seconds().max(0);
    let width = width.as_secs();
    usize::try_from((span + width - 1) / width).unwrap_or(0)
}

/// Start boundaries of every bucket covering `range`, relative to `range.start`
pub fn bucket_boundaries(range: &TimeRange, width: BucketWidth) -> Vec<NaiveDateTime> {
    let step = width.as_duration();
    let mut boundaries = Vec::with_capacity(bucket_count(range, width));
    let mut boundary = range.start;
    while boundary < range.end {
        boundaries.push(boundary);
        match boundary.checked_add_signed(step) {
            Some(next) => boundary = next,
            None => break,
        }
    }
    boundaries
}

/// Resample `rows` into contiguous buckets of `width` covering `range`.
///
/// The output has exactly one row per bucket boundary, ascending. Rows
/// outside `[range.start, range.end)` are dropped. Counters and cost are
/// summed, p50 columns averaged, and p95 columns reduced to the 95th
/// percentile of the members' p95 values. That last step treats upstream
/// percentiles as samples, so it approximates the true p95 of the
/// underlying calls rather than recomputing it.
pub fn resample(rows: &[MetricRow], range: &TimeRange, width: BucketWidth) -> ResampledSeries {
    let boundaries = bucket_boundaries(range, width);
    let mut members: Vec<Vec<&MetricRow>> = vec![Vec::new(); boundaries.len()];
    let mut dropped = 0usize;

    for row in rows {
        match bucket_index(row.timestamp, range, width, boundaries.len()) {
            Some(index) => members[index].push(row),
            None => {
                trace!(timestamp = %row.timestamp, "Row outside of range, dropping");
                dropped += 1;
            }
        }
    }

    let rows: Vec<MetricRow> = boundaries
        .into_iter()
        .zip(members)
        .map(|(boundary, bucket)| reduce(boundary, &bucket))
        .collect();

    debug!(
        range = %range,
        width = %width,
        buckets = rows.len(),
        dropped,
        "Resampled metrics"
    );

    ResampledSeries {
        range: *range,
        width,
        rows,
    }
}

fn bucket_index(
    timestamp: NaiveDateTime,
    range: &TimeRange,
    width: BucketWidth,
    buckets: usize,
) -> Option<usize> {
    if !range.contains(timestamp) {
        return None;
    }
    let offset = (timestamp - range.start).num_seconds();
    usize::try_from(offset / width.as_secs())
        .ok()
        .filter(|index| *index < buckets)
}

/// Combine the member rows of one bucket
fn reduce(timestamp: NaiveDateTime, members: &[&MetricRow]) -> MetricRow {
    if members.is_empty() {
        return MetricRow::zero(timestamp);
    }

    let column = |f: fn(&MetricRow) -> f64| -> Vec<f64> { members.iter().map(|r| f(r)).collect() };

    MetricRow {
        timestamp,
        request_count: counter(members, |r| r.request_count),
        total_prompt_tokens: counter(members, |r| r.total_prompt_tokens),
        total_completion_tokens: counter(members, |r| r.total_completion_tokens),
        total_cost: sum(column(|r| r.total_cost)),
        generation_time_p50: mean(column(|r| r.generation_time_p50)),
        generation_time_p95: percentile(column(|r| r.generation_time_p95), P95),
        tokens_per_sec_p50: mean(column(|r| r.tokens_per_sec_p50)),
        tokens_per_sec_p95: percentile(column(|r| r.tokens_per_sec_p95), P95),
    }
}

/// Saturating sum of an integer column
fn counter(members: &[&MetricRow], f: fn(&MetricRow) -> u64) -> u64 {
    members.iter().map(|r| f(r)).fold(0u64, u64::saturating_add)
}

/// Sum in ascending order so the result does not depend on input order
fn sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.iter().sum()
}

fn mean(values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    sum(values) / n
}

/// Percentile with linear interpolation between closest ranks
/// (`PERCENTILE_CONT` semantics), `p` in `[0, 1]`
pub fn percentile(mut values: Vec<f64>, p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);

    let rank = p.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(minutes: i64) -> NaiveDateTime {
        base() + Duration::minutes(minutes)
    }

    fn row(minutes: i64, requests: u64, cost: f64) -> MetricRow {
        MetricRow {
            request_count: requests,
            total_cost: cost,
            ..MetricRow::zero(at(minutes))
        }
    }

    fn range(minutes: i64) -> TimeRange {
        TimeRange::new(base(), at(minutes)).unwrap()
    }

    fn minutes(m: i64) -> BucketWidth {
        BucketWidth::new(Duration::minutes(m)).unwrap()
    }

    #[test]
    fn test_two_buckets_scenario() {
        let rows = vec![row(0, 10, 1.0), row(40, 5, 0.5)];

        let series = resample(&rows, &range(60), minutes(30));

        assert_eq!(series.rows, vec![row(0, 10, 1.0), row(30, 5, 0.5)]);
        assert_eq!(series.width, minutes(30));
    }

    #[test]
    fn test_empty_input_yields_zero_buckets() {
        let series = resample(&[], &range(60), minutes(15));

        assert_eq!(series.len(), 4);
        assert!(series.iter().all(MetricRow::is_empty));
        let stamps: Vec<_> = series.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(0), at(15), at(30), at(45)]);
    }

    #[test]
    fn test_zero_span_has_no_buckets() {
        let series = resample(&[row(0, 1, 1.0)], &range(0), minutes(5));
        assert!(series.is_empty());
    }

    #[test]
    fn test_partial_last_bucket() {
        // 70 minutes at 30 minute width: the last bucket starts at 01:00
        let rows = vec![row(65, 3, 0.3)];
        let series = resample(&rows, &range(70), minutes(30));

        assert_eq!(series.len(), 3);
        assert_eq!(series.rows[2], row(60, 3, 0.3));
    }

    #[test]
    fn test_rows_outside_range_are_dropped() {
        let rows = vec![row(-5, 100, 10.0), row(10, 1, 0.1), row(60, 100, 10.0)];
        let series = resample(&rows, &range(60), minutes(30));

        assert_eq!(series.summary().total_requests, 1);
        assert_eq!(series.rows[0].request_count, 1);
    }

    #[test]
    fn test_boundaries_follow_range_start() {
        let start = at(7);
        let range = TimeRange::new(start, start + Duration::minutes(20)).unwrap();
        let rows = vec![MetricRow {
            request_count: 2,
            ..MetricRow::zero(at(16))
        }];

        let series = resample(&rows, &range, minutes(10));

        assert_eq!(series.rows[0].timestamp, at(7));
        assert_eq!(series.rows[1].timestamp, at(17));
        assert_eq!(series.rows[0].request_count, 2);
    }

    #[test]
    fn test_column_reductions() {
        let mut a = row(0, 2, 0.2);
        a.total_prompt_tokens = 100;
        a.total_completion_tokens = 40;
        a.generation_time_p50 = 100.0;
        a.generation_time_p95 = 200.0;
        a.tokens_per_sec_p50 = 30.0;
        a.tokens_per_sec_p95 = 50.0;

        let mut b = row(5, 3, 0.3);
        b.total_prompt_tokens = 10;
        b.total_completion_tokens = 4;
        b.generation_time_p50 = 300.0;
        b.generation_time_p95 = 400.0;
        b.tokens_per_sec_p50 = 10.0;
        b.tokens_per_sec_p95 = 70.0;

        let series = resample(&[a, b], &range(10), minutes(10));
        let bucket = &series.rows[0];

        assert_eq!(bucket.request_count, 5);
        assert_eq!(bucket.total_prompt_tokens, 110);
        assert_eq!(bucket.total_completion_tokens, 44);
        assert!((bucket.total_cost - 0.5).abs() < 1e-12);
        assert!((bucket.generation_time_p50 - 200.0).abs() < 1e-9);
        assert!((bucket.tokens_per_sec_p50 - 20.0).abs() < 1e-9);
        // 200 + (400 - 200) * 0.95
        assert!((bucket.generation_time_p95 - 390.0).abs() < 1e-9);
        // 50 + (70 - 50) * 0.95
        assert!((bucket.tokens_per_sec_p95 - 69.0).abs() < 1e-9);
    }

    #[test]
    fn test_huge_width_yields_single_bucket() {
        let width: BucketWidth = "300000years".parse().unwrap();
        let series = resample(&[row(10, 4, 0.4)], &range(60), width);

        assert_eq!(series.len(), 1);
        assert_eq!(series.rows[0], row(0, 4, 0.4));
        assert_eq!(bucket_count(&range(60), width), 1);
    }

    #[test]
    fn test_counters_saturate() {
        let mut a = row(0, u64::MAX, 0.0);
        a.total_prompt_tokens = u64::MAX;
        let mut b = row(1, u64::MAX, 0.0);
        b.total_completion_tokens = u64::MAX;

        let series = resample(&[a, b], &range(5), minutes(5));
        let bucket = &series.rows[0];

        assert_eq!(bucket.request_count, u64::MAX);
        assert_eq!(bucket.total_prompt_tokens, u64::MAX);
        assert_eq!(bucket.total_tokens(), u64::MAX);

        let summary = series.summary();
        assert_eq!(summary.total_requests, u64::MAX);
        assert_eq!(summary.total_tokens(), u64::MAX);
    }

    #[test]
    fn test_percentile_interpolation() {
        assert_eq!(percentile(vec![], 0.95), 0.0);
        assert_eq!(percentile(vec![42.0], 0.95), 42.0);
        assert_eq!(percentile(vec![3.0, 1.0, 2.0], 0.5), 2.0);
        let values: Vec<f64> = (1..=101).map(f64::from).collect();
        assert!((percentile(values, 0.95) - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_count_rounds_up() {
        assert_eq!(bucket_count(&range(60), minutes(30)), 2);
        assert_eq!(bucket_count(&range(61), minutes(30)), 3);
        assert_eq!(bucket_count(&range(0), minutes(30)), 0);
        assert_eq!(bucket_count(&range(1), minutes(30)), 1);
    }

    fn arb_row(span_minutes: i64) -> impl Strategy<Value = MetricRow> {
        (
            -30..span_minutes + 30,
            0u64..1_000,
            0.0f64..100.0,
            0.0f64..5_000.0,
            0.0f64..5_000.0,
        )
            .prop_map(|(minute, requests, cost, p50, p95)| MetricRow {
                request_count: requests,
                total_prompt_tokens: requests * 3,
                total_completion_tokens: requests * 2,
                total_cost: cost,
                generation_time_p50: p50,
                generation_time_p95: p95,
                tokens_per_sec_p50: p50 / 10.0,
                tokens_per_sec_p95: p95 / 10.0,
                ..MetricRow::zero(at(minute))
            })
    }

    fn arb_case() -> impl Strategy<Value = (i64, i64, Vec<MetricRow>)> {
        (0i64..3_000, 1i64..240).prop_flat_map(|(span, width)| {
            (
                Just(span),
                Just(width),
                proptest::collection::vec(arb_row(span), 0..64),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_contiguous_length((span, width, rows) in arb_case()) {
            let series = resample(&rows, &range(span), minutes(width));
            let expected = (span + width - 1) / width;

            prop_assert_eq!(series.len() as i64, expected);
            for (index, bucket) in series.iter().enumerate() {
                prop_assert_eq!(bucket.timestamp, at(index as i64 * width));
            }
        }

        #[test]
        fn prop_permutation_invariant((span, width, rows) in arb_case()) {
            let mut reversed = rows.clone();
            reversed.reverse();

            let forward = resample(&rows, &range(span), minutes(width));
            let backward = resample(&reversed, &range(span), minutes(width));

            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_idempotent((span, width, rows) in arb_case()) {
            let first = resample(&rows, &range(span), minutes(width));
            let second = resample(&rows, &range(span), minutes(width));

            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
        }

        #[test]
        fn prop_totals_preserved((span, width, rows) in arb_case()) {
            let series = resample(&rows, &range(span), minutes(width));
            let in_range: u64 = rows
                .iter()
                .filter(|r| r.timestamp >= at(0) && r.timestamp < at(span))
                .map(|r| r.request_count)
                .sum();

            prop_assert_eq!(series.summary().total_requests, in_range);
        }
    }
}
