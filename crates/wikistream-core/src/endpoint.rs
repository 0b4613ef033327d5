//! Stream endpoints and `since` timestamps.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::error::{StreamError, StreamResult};

/// Base URL of the public Wikimedia EventStreams service.
pub const DEFAULT_BASE_URL: &str = "https://stream.wikimedia.org/v2/stream";

/// Name of the recent changes feed.
pub const RECENTCHANGE: &str = "recentchange";

/// Format required by the feed's `since` query parameter.
const SINCE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Years that fit the four digits of [`SINCE_FORMAT`].
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

// =============================================================================
// Stream Names
// =============================================================================

/// One or more stream names, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNames(Vec<String>);

impl StreamNames {
    /// Returns the names as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns the comma-joined list used in stream URLs.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    fn validate(&self) -> StreamResult<()> {
        if self.0.is_empty() {
            return Err(StreamError::InvalidStreamName(
                "at least one stream name is required".into(),
            ));
        }
        for name in &self.0 {
            if name.is_empty() {
                return Err(StreamError::InvalidStreamName(
                    "stream names must not be empty".into(),
                ));
            }
            if name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ',' | '/' | '?' | '#' | '&'))
            {
                return Err(StreamError::InvalidStreamName(format!(
                    "'{name}' contains a reserved character"
                )));
            }
        }
        Ok(())
    }
}

impl From<&str> for StreamNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for StreamNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for StreamNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for StreamNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for StreamNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StreamNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

impl std::fmt::Display for StreamNames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

// =============================================================================
// Since
// =============================================================================

/// Point in time from which a feed should replay events.
///
/// Built with `TryFrom` from any `chrono` date-time or a [`SystemTime`], or
/// parsed from a string. Years outside `0..=9999` are rejected. Accepted
/// string forms:
///
/// - RFC 3339 (`2024-05-01T12:30:00Z`, `2024-05-01T14:30:00+02:00`)
/// - naive ISO date-time, taken as UTC (`2024-05-01T12:30:00`, `2024-05-01 12:30:00`)
/// - plain date, midnight UTC (`2024-05-01`)
/// - the feed's own 14-digit form (`20240501123000`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Since(DateTime<Utc>);

impl Since {
    /// A timestamp `ago` before now.
    pub fn ago(ago: Duration) -> StreamResult<Self> {
        SystemTime::now()
            .checked_sub(ago)
            .ok_or_else(|| StreamError::InvalidSince {
                value: format!("{ago:?} ago"),
                reason: "before the earliest representable time".into(),
            })
            .and_then(Self::try_from)
    }

    fn from_utc(value: DateTime<Utc>) -> StreamResult<Self> {
        if YEAR_RANGE.contains(&value.year()) {
            Ok(Self(value))
        } else {
            Err(StreamError::InvalidSince {
                value: value.to_rfc3339(),
                reason: "year must be between 0 and 9999".into(),
            })
        }
    }

    /// Returns the instant as a UTC date-time.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Formats the instant as `YYYYMMDDHHMMSS` in UTC.
    pub fn format(&self) -> String {
        self.0.format(SINCE_FORMAT).to_string()
    }
}

impl<Tz: TimeZone> TryFrom<DateTime<Tz>> for Since {
    type Error = StreamError;

    fn try_from(value: DateTime<Tz>) -> Result<Self, Self::Error> {
        Self::from_utc(value.with_timezone(&Utc))
    }
}

impl TryFrom<NaiveDateTime> for Since {
    type Error = StreamError;

    /// Takes the naive date-time as UTC.
    fn try_from(value: NaiveDateTime) -> Result<Self, Self::Error> {
        Self::from_utc(value.and_utc())
    }
}

impl TryFrom<SystemTime> for Since {
    type Error = StreamError;

    fn try_from(value: SystemTime) -> Result<Self, Self::Error> {
        let utc = match value.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(after) => TimeDelta::from_std(after)
                .ok()
                .and_then(|d| DateTime::<Utc>::UNIX_EPOCH.checked_add_signed(d)),
            Err(before) => TimeDelta::from_std(before.duration())
                .ok()
                .and_then(|d| DateTime::<Utc>::UNIX_EPOCH.checked_sub_signed(d)),
        };
        utc.ok_or_else(|| StreamError::InvalidSince {
            value: format!("{value:?}"),
            reason: "outside the representable range".into(),
        })
        .and_then(Self::from_utc)
    }
}

impl FromStr for Since {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &str| StreamError::InvalidSince {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let checked = |utc: DateTime<Utc>| {
            Self::from_utc(utc).map_err(|_| invalid("year must be between 0 and 9999"))
        };

        if s.is_empty() {
            return Err(invalid("empty timestamp"));
        }

        if s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit()) {
            return NaiveDateTime::parse_from_str(s, SINCE_FORMAT)
                .map_err(|e| invalid(&e.to_string()))
                .and_then(|naive| checked(naive.and_utc()));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return checked(dt.with_timezone(&Utc));
        }

        for format in [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return checked(naive.and_utc());
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| invalid("date out of range"))
                .and_then(|naive| checked(naive.and_utc()));
        }

        Err(invalid("unrecognized date format"))
    }
}

impl TryFrom<&str> for Since {
    type Error = StreamError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Since {
    type Error = StreamError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for Since {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

// =============================================================================
// Stream Endpoint
// =============================================================================

/// Where a session connects. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    base_url: String,
    streams: StreamNames,
    since: Option<Since>,
}

impl StreamEndpoint {
    /// Builds an endpoint, validating the stream names.
    pub fn new(
        base_url: impl Into<String>,
        streams: impl Into<StreamNames>,
        since: Option<Since>,
    ) -> StreamResult<Self> {
        let streams = streams.into();
        streams.validate()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StreamError::Transport(
                crate::error::TransportError::InvalidRequest("empty base URL".into()),
            ));
        }

        Ok(Self {
            base_url,
            streams,
            since,
        })
    }

    /// Builds an endpoint on the public Wikimedia service.
    pub fn wikimedia(streams: impl Into<StreamNames>, since: Option<Since>) -> StreamResult<Self> {
        Self::new(DEFAULT_BASE_URL, streams, since)
    }

    /// Returns the stream names.
    pub fn streams(&self) -> &StreamNames {
        &self.streams
    }

    /// Returns the replay point, if any.
    pub fn since(&self) -> Option<Since> {
        self.since
    }

    /// Returns the base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Renders the full stream URL.
    pub fn url(&self) -> String {
        let mut url = format!("{}/{}", self.base_url, self.streams.joined());
        if let Some(since) = self.since {
            url.push_str("?since=");
            url.push_str(&since.format());
        }
        url
    }
}

impl std::fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_single_stream_url() {
        let endpoint = StreamEndpoint::wikimedia(RECENTCHANGE, None).unwrap();
        assert_eq!(
            endpoint.url(),
            "https://stream.wikimedia.org/v2/stream/recentchange"
        );
    }

    #[test]
    fn test_multiple_streams_are_comma_joined() {
        let endpoint =
            StreamEndpoint::wikimedia(["recentchange", "revision-create"], None).unwrap();
        assert_eq!(
            endpoint.url(),
            "https://stream.wikimedia.org/v2/stream/recentchange,revision-create"
        );
        assert_eq!(endpoint.streams().as_slice().len(), 2);
    }

    #[test]
    fn test_since_is_appended_in_utc() {
        let since: Since = "2024-05-01T14:30:05+02:00".parse().unwrap();
        let endpoint = StreamEndpoint::new("https://example.org/stream/", "page-create", Some(since))
            .unwrap();
        assert_eq!(
            endpoint.url(),
            "https://example.org/stream/page-create?since=20240501123005"
        );
    }

    #[test]
    fn test_rejects_empty_names() {
        assert!(StreamEndpoint::wikimedia("", None).is_err());
        assert!(StreamEndpoint::wikimedia(Vec::<String>::new(), None).is_err());
        assert!(StreamEndpoint::wikimedia(["recentchange", ""], None).is_err());
        assert!(StreamEndpoint::wikimedia("recent change", None).is_err());
    }

    #[test]
    fn test_since_string_forms() {
        let expected = "20240501123000";
        for input in [
            "2024-05-01T12:30:00Z",
            "2024-05-01T12:30:00",
            "2024-05-01 12:30:00",
            "2024-05-01T12:30",
            "20240501123000",
        ] {
            let since: Since = input.parse().unwrap();
            assert_eq!(since.format(), expected, "input {input}");
        }

        let midnight: Since = "2024-05-01".parse().unwrap();
        assert_eq!(midnight.format(), "20240501000000");
    }

    #[test]
    fn test_since_rejects_garbage() {
        assert!("".parse::<Since>().is_err());
        assert!("yesterday".parse::<Since>().is_err());
        assert!("20241301000000".parse::<Since>().is_err());
    }

    #[test]
    fn test_since_from_datetimes() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        assert_eq!(Since::try_from(local).unwrap().format(), "20240101000000");

        let epoch = SystemTime::UNIX_EPOCH + Duration::from_secs(86_400);
        assert_eq!(Since::try_from(epoch).unwrap().format(), "19700102000000");

        let before_epoch = SystemTime::UNIX_EPOCH - Duration::from_secs(86_400);
        assert_eq!(
            Since::try_from(before_epoch).unwrap().format(),
            "19691231000000"
        );
    }

    #[test]
    fn test_since_rejects_years_that_do_not_fit() {
        let far_future = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        let err = Since::try_from(far_future).unwrap_err();
        assert!(matches!(err, StreamError::InvalidSince { .. }));

        let before_year_zero = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
        assert!(Since::try_from(before_year_zero).is_err());

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(Since::try_from(last).unwrap().format(), "99991231235959");

        let far_system_time = SystemTime::UNIX_EPOCH + Duration::from_secs(400_000_000_000);
        assert!(Since::try_from(far_system_time).is_err());

        assert!("+12000-01-01T00:00:00Z".parse::<Since>().is_err());
    }

    #[test]
    fn test_since_ago_is_in_the_past() {
        let since = Since::ago(Duration::from_secs(3600)).unwrap();
        assert!(since.as_datetime() < Utc::now());
        assert_eq!(since.format().len(), 14);
    }

    #[test]
    fn test_since_ago_rejects_huge_durations() {
        let err = Since::ago(Duration::from_secs(u64::MAX)).unwrap_err();
        assert!(matches!(err, StreamError::InvalidSince { .. }));

        // Representable by SystemTime, but long before year 0.
        assert!(Since::ago(Duration::from_secs(100_000_000_000)).is_err());
    }
}
