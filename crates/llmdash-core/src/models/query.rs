//! Query parameters shared between the facade, the source client and the CLI

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parse `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (optionally with
/// fractional seconds and an offset, which is dropped rather than applied) or
/// a bare `YYYY-MM-DD` meaning midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_local());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Half-open time window `[start, end)` with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    /// Inclusive start
    pub start: NaiveDateTime,
    /// Exclusive end
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The window of length `duration` ending at `now`
    pub fn last(duration: Duration, now: NaiveDateTime) -> Result<Self> {
        let start = now
            .checked_sub_signed(duration)
            .ok_or_else(|| Error::validation(format!("duration {duration} is out of range")))?;
        Self::new(start, now)
    }

    /// Length of the range
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `timestamp` falls inside `[start, end)`
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = Error;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// How the caller names the window to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// Explicit start and end
    Absolute(TimeRange),
    /// The given duration back from the current time
    Last(Duration),
}

impl RangeSpec {
    /// Resolve against the given "now"
    pub fn resolve(self, now: NaiveDateTime) -> Result<TimeRange> {
        match self {
            Self::Absolute(range) => Ok(range),
            Self::Last(duration) => TimeRange::last(duration, now),
        }
    }
}

impl From<TimeRange> for RangeSpec {
    fn from(range: TimeRange) -> Self {
        Self::Absolute(range)
    }
}

impl From<Duration> for RangeSpec {
    fn from(duration: Duration) -> Self {
        Self::Last(duration)
    }
}

/// Model and group filters. An empty set means "no filter" on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    /// Model identifiers to include
    pub models: BTreeSet<String>,
    /// Group identifiers to include
    pub groups: BTreeSet<String>,
}

impl FilterSet {
    /// Selection value meaning "no filter"
    pub const NO_FILTER: &'static str = "<None>";

    /// An unfiltered set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model filter
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models.insert(model.into());
        self
    }

    /// Add a group filter
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Build from user selections, dropping blanks and the `<None>` sentinel
    pub fn from_selection<M, G>(models: M, groups: G) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        fn keep(values: impl IntoIterator<Item = String>) -> BTreeSet<String> {
            values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && v != FilterSet::NO_FILTER)
                .collect()
        }

        Self {
            models: keep(models.into_iter().map(Into::into)),
            groups: keep(groups.into_iter().map(Into::into)),
        }
    }

    /// Whether neither axis is filtered
    pub fn is_unfiltered(&self) -> bool {
        self.models.is_empty() && self.groups.is_empty()
    }
}

/// Known filter values offered to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Known model identifiers
    pub models: Vec<String>,
    /// Known group identifiers
    pub groups: Vec<String>,
}

/// Width of one resampling bucket, in whole seconds, always positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketWidth {
    secs: i64,
}

impl BucketWidth {
    /// 5 minutes
    pub const FIVE_MINUTES: Self = Self { secs: 5 * 60 };
    /// 15 minutes
    pub const FIFTEEN_MINUTES: Self = Self { secs: 15 * 60 };
    /// 1 hour
    pub const ONE_HOUR: Self = Self { secs: 60 * 60 };
    /// 1 day
    pub const ONE_DAY: Self = Self { secs: 24 * 60 * 60 };

    /// Create a width, rejecting anything shorter than one second
    pub fn new(width: Duration) -> Result<Self> {
        Self::from_secs(width.num_seconds())
    }

    /// Create a width from a number of seconds
    pub fn from_secs(secs: i64) -> Result<Self> {
        if secs <= 0 {
            return Err(Error::validation(format!(
                "bucket width must be at least one second, got {secs}s"
            )));
        }
        if secs > Duration::MAX.num_seconds() {
            return Err(Error::validation(format!("bucket width {secs}s is too large")));
        }
        Ok(Self { secs })
    }

    /// Width in seconds
    pub fn as_secs(self) -> i64 {
        self.secs
    }

    /// Width as a chrono duration
    pub fn as_duration(self) -> Duration {
        Duration::seconds(self.secs)
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // secs is positive, so the cast is lossless
        let std = std::time::Duration::from_secs(self.secs as u64);
        write!(f, "{}", humantime::format_duration(std))
    }
}

impl FromStr for BucketWidth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let std = humantime::parse_duration(s.trim())
            .map_err(|e| Error::validation(format!("invalid bucket width '{s}': {e}")))?;
        let secs = i64::try_from(std.as_secs())
            .map_err(|_| Error::validation(format!("bucket width '{s}' is too large")))?;
        Self::from_secs(secs)
    }
}

impl Serialize for BucketWidth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BucketWidth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Bucket width requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WidthSpec {
    /// Let the bucket planner choose from the range length
    #[default]
    Auto,
    /// Use exactly this width
    Fixed(BucketWidth),
}

impl From<BucketWidth> for WidthSpec {
    fn from(width: BucketWidth) -> Self {
        Self::Fixed(width)
    }
}

impl FromStr for WidthSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Fixed)
        }
    }
}

impl TryFrom<String> for WidthSpec {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<WidthSpec> for String {
    fn from(spec: WidthSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for WidthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(width) => width.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        let err = TimeRange::new(at(2, 0), at(1, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn test_time_range_allows_empty() {
        let range = TimeRange::new(at(1, 0), at(1, 0)).unwrap();
        assert_eq!(range.span(), Duration::zero());
        assert!(!range.contains(at(1, 0)));
    }

    #[test]
    fn test_last_resolves_against_now() {
        let range = RangeSpec::Last(Duration::days(7)).resolve(at(8, 12)).unwrap();
        assert_eq!(range.start, at(1, 12));
        assert_eq!(range.end, at(8, 12));
    }

    #[test]
    fn test_last_negative_duration_is_invalid() {
        let err = RangeSpec::Last(Duration::hours(-1)).resolve(at(1, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn test_filter_selection_drops_sentinel() {
        let filters = FilterSet::from_selection(vec!["<None>", "gpt-4o", " "], Vec::<String>::new());
        assert_eq!(filters.models.len(), 1);
        assert!(filters.models.contains("gpt-4o"));
        assert!(filters.groups.is_empty());
        assert!(!filters.is_unfiltered());
        assert!(FilterSet::from_selection(["<None>"], ["<None>"]).is_unfiltered());
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(parse_timestamp("2024-05-01"), Some(at(1, 0)));
        assert_eq!(parse_timestamp("2024-05-01 03:00:00"), Some(at(1, 3)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_bucket_width_rejects_zero() {
        assert!(BucketWidth::new(Duration::zero()).is_err());
        assert!(BucketWidth::from_secs(-5).is_err());
        assert!("0s".parse::<BucketWidth>().is_err());
    }

    #[test]
    fn test_bucket_width_rejects_unrepresentable() {
        let max = Duration::MAX.num_seconds();
        assert_eq!(BucketWidth::from_secs(max).unwrap().as_duration().num_seconds(), max);
        assert!(matches!(
            BucketWidth::from_secs(max + 1),
            Err(Error::Validation(_))
        ));
        assert!(BucketWidth::from_secs(i64::MAX).is_err());
    }

    #[test]
    fn test_time_range_deserialize_validates() {
        let range: TimeRange = serde_json::from_value(serde_json::json!({
            "start": "2024-05-01T00:00:00",
            "end": "2024-05-01T01:00:00"
        }))
        .unwrap();
        assert_eq!(range.span(), Duration::hours(1));

        let inverted = serde_json::from_value::<TimeRange>(serde_json::json!({
            "start": "2024-05-02T00:00:00",
            "end": "2024-05-01T00:00:00"
        }));
        assert!(inverted.is_err());
    }

    #[rstest]
    #[case("auto", WidthSpec::Auto)]
    #[case("AUTO", WidthSpec::Auto)]
    #[case("5m", WidthSpec::Fixed(BucketWidth::FIVE_MINUTES))]
    #[case("15min", WidthSpec::Fixed(BucketWidth::FIFTEEN_MINUTES))]
    #[case("1h", WidthSpec::Fixed(BucketWidth::ONE_HOUR))]
    #[case("1day", WidthSpec::Fixed(BucketWidth::ONE_DAY))]
    fn test_width_spec_parse(#[case] input: &str, #[case] expected: WidthSpec) {
        assert_eq!(input.parse::<WidthSpec>().unwrap(), expected);
    }

    #[test]
    fn test_width_spec_serde() {
        let json = serde_json::to_string(&WidthSpec::Fixed(BucketWidth::ONE_HOUR)).unwrap();
        assert_eq!(json, "\"1h\"");
        let parsed: WidthSpec = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(parsed, WidthSpec::Auto);
        assert!(serde_json::from_str::<WidthSpec>("\"soon\"").is_err());
    }
}
