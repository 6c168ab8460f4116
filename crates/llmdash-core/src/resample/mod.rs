//! Adaptive time bucketing
//!
//! The planner turns a range length into a bucket width and the aggregator
//! folds raw rows into contiguous buckets of that width. Both are pure.

mod aggregator;
mod planner;

pub use aggregator::{bucket_boundaries, bucket_count, percentile, resample};
pub use planner::{BucketPlanner, PolicyEntry, DEFAULT_POLICY};
