//! Data models for llmdash

mod event;
mod metrics;
mod query;

pub use event::*;
pub use metrics::*;
pub use query::*;
