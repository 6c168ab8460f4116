//! Metrics source - where raw pre-aggregated rows come from
//!
//! A source returns rows at its native granularity for exactly the requested
//! range and filters. It never resamples, never re-applies filters and never
//! retries; null values are coerced to zero at this boundary so everything
//! downstream works with plain numbers.

mod http;
mod wire;

pub use http::HttpMetricsSource;

use crate::error::Result;
use crate::models::{Catalog, FilterSet, MetricRow, TimeRange};

/// Upstream metrics API
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch raw rows for `range`, filtered upstream by `filters`.
    ///
    /// An empty vector means "no data in range", not a failure.
    async fn fetch_raw(&self, range: &TimeRange, filters: &FilterSet) -> Result<Vec<MetricRow>>;

    /// Fetch the known model and group identifiers
    async fn fetch_catalog(&self) -> Result<Catalog>;
}

#[async_trait::async_trait]
impl<S: MetricsSource + ?Sized> MetricsSource for std::sync::Arc<S> {
    async fn fetch_raw(&self, range: &TimeRange, filters: &FilterSet) -> Result<Vec<MetricRow>> {
        (**self).fetch_raw(range, filters).await
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        (**self).fetch_catalog().await
    }
}
