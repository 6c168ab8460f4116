//! Query facade
//!
//! [`MetricsService`] is what rendering and CLI code call: it resolves the
//! range, plans a bucket width, does one fetch against the metrics source and
//! resamples the result. It holds no per-query state; every call is a full
//! recompute from `(range, filters, width)`.

use chrono::{NaiveDateTime, Timelike, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Catalog, FilterSet, RangeSpec, ResampledSeries, WidthSpec};
use crate::resample::{resample, BucketPlanner};
use crate::source::MetricsSource;

/// Source of "now" for resolving relative ranges
pub type Clock = fn() -> NaiveDateTime;

/// Current UTC time, truncated to whole seconds
pub fn system_clock() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Resampled metrics over a metrics source
pub struct MetricsService<S> {
    source: S,
    planner: BucketPlanner,
    clock: Clock,
}

impl<S: MetricsSource> MetricsService<S> {
    /// Create a new service with the default bucket policy
    pub fn new(source: S) -> Self {
        Self {
            source,
            planner: BucketPlanner::default(),
            clock: system_clock,
        }
    }

    /// Use a custom bucket planner
    pub fn with_planner(mut self, planner: BucketPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Use a custom clock for relative ranges
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch and resample metrics for `range`.
    ///
    /// An inverted range is rejected before anything is fetched. Source
    /// errors are returned unchanged. An empty fetch still yields a full,
    /// all-zero series.
    pub async fn get_metrics(
        &self,
        range: impl Into<RangeSpec>,
        filters: &FilterSet,
        width: WidthSpec,
    ) -> Result<ResampledSeries> {
        let range = range.into().resolve((self.clock)())?;

        let width = match width {
            WidthSpec::Fixed(width) => width,
            WidthSpec::Auto => self.planner.plan(range.span()),
        };

        debug!(
            range = %range,
            width = %width,
            models = ?filters.models,
            groups = ?filters.groups,
            "Querying metrics"
        );

        let rows = self.source.fetch_raw(&range, filters).await?;
        let series = resample(&rows, &range, width);

        info!(
            raw_rows = rows.len(),
            buckets = series.len(),
            width = %width,
            "Metrics query complete"
        );

        Ok(series)
    }

    /// Known models and groups, straight from the source
    pub async fn catalog(&self) -> Result<Catalog> {
        self.source.fetch_catalog().await
    }
}
