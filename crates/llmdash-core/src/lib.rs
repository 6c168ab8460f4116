//! # llmdash
//!
//! Usage, latency and cost metrics for fleets of LLM API calls.
//!
//! llmdash reads a pre-aggregated metrics stream from an upstream API and
//! resamples it into a chart-ready series whose bucket width follows the
//! length of the requested range.
//!
//! ## Architecture
//!
//! - **Source**: fetches raw rows and the model/group catalog over HTTP
//! - **Resample**: bucket planning and per-column aggregation
//! - **Query**: the facade tying both together
//! - **Events**: load generation that feeds the upstream API
//!
//! ## Quick Start
//!
//! ```bash
//! # Last seven days, hourly or daily buckets chosen automatically
//! llmdash metrics --last 7d --model gpt-4o
//!
//! # Available filter values
//! llmdash catalog
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod query;
pub mod resample;
pub mod source;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::query::MetricsService;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::query::MetricsService;
    pub use crate::resample::{resample, BucketPlanner};
    pub use crate::source::{HttpMetricsSource, MetricsSource};
}
