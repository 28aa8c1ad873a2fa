//! Partial-precision temporal types
//!
//! FHIRPath date, datetime and time literals keep whatever precision they
//! were written with (`@2019`, `@2019-03`, `@T12:30`). Comparison is only
//! defined down to the precision both operands share: when the shared
//! components tie but one side carries more detail, the comparison has no
//! answer and the operator yields an empty collection.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike};

/// Precision of a date value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatePrecision {
    /// `YYYY`
    Year,
    /// `YYYY-MM`
    Month,
    /// `YYYY-MM-DD`
    Day,
}

/// Precision of a time value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimePrecision {
    /// `hh`
    Hour,
    /// `hh:mm`
    Minute,
    /// `hh:mm:ss`
    Second,
    /// `hh:mm:ss.fff`
    Millisecond,
}

/// A date with partial precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    pub(crate) date: NaiveDate,
    /// How much of the date was actually specified
    pub precision: DatePrecision,
}

/// A time of day with partial precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    pub(crate) time: NaiveTime,
    /// How much of the time was actually specified
    pub precision: TimePrecision,
}

/// A datetime with partial precision and an optional UTC offset
///
/// A missing offset is treated as UTC for ordering purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    pub(crate) date: NaiveDate,
    pub(crate) time: Option<NaiveTime>,
    pub(crate) offset: Option<FixedOffset>,
    /// How much of the datetime was actually specified
    pub precision: DateTimePrecision,
}

/// Precision of a datetime value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateTimePrecision {
    /// `YYYY`
    Year,
    /// `YYYY-MM`
    Month,
    /// `YYYY-MM-DD`
    Day,
    /// `...Thh`
    Hour,
    /// `...Thh:mm`
    Minute,
    /// `...Thh:mm:ss`
    Second,
    /// `...Thh:mm:ss.fff`
    Millisecond,
}

/// Compare two component sequences, stopping at the first side that runs out
/// of specified detail
fn compare_components(a: &[Option<i64>], b: &[Option<i64>]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        match (x, y) {
            (Some(x), Some(y)) => match x.cmp(y) {
                Ordering::Equal => continue,
                other => return Some(other),
            },
            (None, None) => return Some(Ordering::Equal),
            // The shared prefix ties but the precisions differ
            _ => return None,
        }
    }
    Some(Ordering::Equal)
}

impl Date {
    /// Build a fully-specified date
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self {
            date,
            precision: DatePrecision::Day,
        })
    }

    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, validating ranges
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '-');
        let year_s = parts.next()?;
        if year_s.len() != 4 {
            return None;
        }
        let year: i32 = year_s.parse().ok()?;

        let Some(month_s) = parts.next() else {
            let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
            return Some(Self {
                date,
                precision: DatePrecision::Year,
            });
        };
        if month_s.len() != 2 {
            return None;
        }
        let month: u32 = month_s.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }

        let Some(day_s) = parts.next() else {
            let date = NaiveDate::from_ymd_opt(year, month, 1)?;
            return Some(Self {
                date,
                precision: DatePrecision::Month,
            });
        };
        if day_s.len() != 2 {
            return None;
        }
        let day: u32 = day_s.parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(Self {
            date,
            precision: DatePrecision::Day,
        })
    }

    fn components(&self) -> [Option<i64>; 3] {
        [
            Some(self.date.year() as i64),
            (self.precision >= DatePrecision::Month).then(|| self.date.month() as i64),
            (self.precision >= DatePrecision::Day).then(|| self.date.day() as i64),
        ]
    }

    /// Precision-aware comparison; `None` when the answer is undefined
    pub fn partial_cmp_fhir(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// Equivalence: equal precision and equal specified components
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.components() == other.components()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            DatePrecision::Year => write!(f, "{}", self.date.format("%Y")),
            DatePrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            DatePrecision::Day => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// Parse `hh[:mm[:ss[.fff]]]` with range validation
fn parse_time_components(s: &str) -> Option<(NaiveTime, TimePrecision)> {
    let (clock, frac) = match s.split_once('.') {
        Some((clock, frac)) => (clock, Some(frac)),
        None => (s, None),
    };

    let mut parts = clock.splitn(3, ':');
    let hour_s = parts.next()?;
    if hour_s.is_empty() || hour_s.len() > 2 {
        return None;
    }
    let hour: u32 = hour_s.parse().ok()?;

    let (minute, second, mut precision) = match parts.next() {
        None => (0, 0, TimePrecision::Hour),
        Some(minute_s) => {
            if minute_s.len() != 2 {
                return None;
            }
            let minute: u32 = minute_s.parse().ok()?;
            match parts.next() {
                None => (minute, 0, TimePrecision::Minute),
                Some(second_s) => {
                    if second_s.len() != 2 {
                        return None;
                    }
                    (minute, second_s.parse().ok()?, TimePrecision::Second)
                }
            }
        }
    };

    let millis = match frac {
        None => 0,
        Some(frac) => {
            if precision != TimePrecision::Second || frac.is_empty() {
                return None;
            }
            precision = TimePrecision::Millisecond;
            // Take the first three fractional digits as milliseconds
            let mut value = 0u32;
            for (i, ch) in frac.chars().enumerate() {
                let digit = ch.to_digit(10)?;
                if i < 3 {
                    value = value * 10 + digit;
                }
            }
            for _ in frac.len()..3 {
                value *= 10;
            }
            value
        }
    };

    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    Some((time, precision))
}

impl Time {
    /// Parse `hh`, `hh:mm`, `hh:mm:ss` or `hh:mm:ss.fff`
    pub fn parse(s: &str) -> Option<Self> {
        let (time, precision) = parse_time_components(s)?;
        Some(Self { time, precision })
    }

    fn components(&self) -> [Option<i64>; 4] {
        [
            Some(self.time.hour() as i64),
            (self.precision >= TimePrecision::Minute).then(|| self.time.minute() as i64),
            (self.precision >= TimePrecision::Second).then(|| self.time.second() as i64),
            (self.precision >= TimePrecision::Millisecond)
                .then(|| (self.time.nanosecond() / 1_000_000) as i64),
        ]
    }

    /// Precision-aware comparison; `None` when the answer is undefined
    pub fn partial_cmp_fhir(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// Equivalence: equal precision and equal specified components
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.components() == other.components()
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TimePrecision::Hour => write!(f, "{:02}", self.time.hour()),
            TimePrecision::Minute => write!(f, "{}", self.time.format("%H:%M")),
            TimePrecision::Second => write!(f, "{}", self.time.format("%H:%M:%S")),
            TimePrecision::Millisecond => write!(f, "{}", self.time.format("%H:%M:%S%.3f")),
        }
    }
}

impl DateTime {
    /// Parse `YYYY[-MM[-DD]][Thh[:mm[:ss[.fff]]][Z|±hh:mm]]`
    pub fn parse(s: &str) -> Option<Self> {
        let (date_s, rest) = match s.split_once('T') {
            Some((date_s, rest)) => (date_s, Some(rest)),
            None => (s, None),
        };

        let date = Date::parse(date_s)?;
        let mut precision = match date.precision {
            DatePrecision::Year => DateTimePrecision::Year,
            DatePrecision::Month => DateTimePrecision::Month,
            DatePrecision::Day => DateTimePrecision::Day,
        };

        let Some(rest) = rest else {
            return Some(Self {
                date: date.date,
                time: None,
                offset: None,
                precision,
            });
        };

        // Split a trailing timezone off the time part
        let (time_s, offset) = split_timezone(rest)?;

        let time = if time_s.is_empty() {
            None
        } else {
            let (time, time_precision) = parse_time_components(time_s)?;
            precision = match time_precision {
                TimePrecision::Hour => DateTimePrecision::Hour,
                TimePrecision::Minute => DateTimePrecision::Minute,
                TimePrecision::Second => DateTimePrecision::Second,
                TimePrecision::Millisecond => DateTimePrecision::Millisecond,
            };
            Some(time)
        };

        Some(Self {
            date: date.date,
            time,
            offset,
            precision,
        })
    }

    /// Parse an arbitrary ISO 8601 / RFC 3339 datetime as a fallback
    pub fn parse_iso8601(s: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(s).ok().map(|dt| Self {
            date: dt.date_naive(),
            time: Some(dt.time()),
            offset: Some(*dt.offset()),
            precision: DateTimePrecision::Millisecond,
        })
    }

    /// Build from a chrono datetime at millisecond precision
    pub fn from_chrono(dt: chrono::DateTime<FixedOffset>) -> Self {
        Self {
            date: dt.date_naive(),
            time: Some(dt.time()),
            offset: Some(*dt.offset()),
            precision: DateTimePrecision::Millisecond,
        }
    }

    /// Normalize to UTC before extracting components so that offsets do not
    /// skew ordering; missing offsets read as UTC
    fn utc_components(&self) -> [Option<i64>; 7] {
        let naive = self.date.and_time(self.time.unwrap_or_default());
        let shifted = match self.offset {
            Some(offset) if self.time.is_some() => {
                naive - chrono::Duration::seconds(offset.local_minus_utc() as i64)
            }
            _ => naive,
        };
        let p = self.precision;
        [
            Some(shifted.year() as i64),
            (p >= DateTimePrecision::Month).then(|| shifted.month() as i64),
            (p >= DateTimePrecision::Day).then(|| shifted.day() as i64),
            (p >= DateTimePrecision::Hour).then(|| shifted.hour() as i64),
            (p >= DateTimePrecision::Minute).then(|| shifted.minute() as i64),
            (p >= DateTimePrecision::Second).then(|| shifted.second() as i64),
            (p >= DateTimePrecision::Millisecond)
                .then(|| (shifted.nanosecond() / 1_000_000) as i64),
        ]
    }

    /// Precision-aware comparison; `None` when the answer is undefined
    pub fn partial_cmp_fhir(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.utc_components(), &other.utc_components())
    }

    /// Equivalence: equal precision and equal specified components
    pub fn equivalent(&self, other: &Self) -> bool {
        self.precision == other.precision && self.utc_components() == other.utc_components()
    }
}

/// Split `hh:mm:ss+02:00` into the clock part and a parsed offset
fn split_timezone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(stripped) = s.strip_suffix('Z') {
        return Some((stripped, Some(FixedOffset::east_opt(0)?)));
    }
    // An offset is always the last six characters: ±hh:mm
    if s.len() >= 6 {
        let tail = &s[s.len() - 6..];
        let sign = tail.as_bytes()[0];
        if (sign == b'+' || sign == b'-') && tail.as_bytes()[3] == b':' {
            let hours: i32 = tail[1..3].parse().ok()?;
            let minutes: i32 = tail[4..6].parse().ok()?;
            if hours > 14 || minutes > 59 {
                return None;
            }
            let mut seconds = hours * 3600 + minutes * 60;
            if sign == b'-' {
                seconds = -seconds;
            }
            return Some((&s[..s.len() - 6], FixedOffset::east_opt(seconds)));
        }
    }
    Some((s, None))
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            DateTimePrecision::Year => return write!(f, "{}", self.date.format("%Y")),
            DateTimePrecision::Month => return write!(f, "{}", self.date.format("%Y-%m")),
            DateTimePrecision::Day => return write!(f, "{}", self.date.format("%Y-%m-%d")),
            _ => {}
        }
        let time = self.time.unwrap_or_default();
        write!(f, "{}T", self.date.format("%Y-%m-%d"))?;
        match self.precision {
            DateTimePrecision::Hour => write!(f, "{:02}", time.hour())?,
            DateTimePrecision::Minute => write!(f, "{}", time.format("%H:%M"))?,
            DateTimePrecision::Second => write!(f, "{}", time.format("%H:%M:%S"))?,
            _ => write!(f, "{}", time.format("%H:%M:%S%.3f"))?,
        }
        if let Some(offset) = self.offset {
            let total = offset.local_minus_utc();
            if total == 0 {
                write!(f, "Z")?;
            } else {
                let (sign, total) = if total < 0 { ('-', -total) } else { ('+', total) };
                write!(f, "{}{:02}:{:02}", sign, total / 3600, (total % 3600) / 60)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_parse_precision() {
        assert_eq!(Date::parse("2019").unwrap().precision, DatePrecision::Year);
        assert_eq!(
            Date::parse("2019-03").unwrap().precision,
            DatePrecision::Month
        );
        assert_eq!(
            Date::parse("2019-03-05").unwrap().precision,
            DatePrecision::Day
        );
        assert!(Date::parse("2019-13").is_none());
        assert!(Date::parse("2019-02-30").is_none());
        assert!(Date::parse("19").is_none());
    }

    #[test]
    fn test_date_partial_comparison() {
        let year = Date::parse("2019").unwrap();
        let month = Date::parse("2019-03").unwrap();
        let other_year = Date::parse("2020").unwrap();

        assert_eq!(year.partial_cmp_fhir(&other_year), Some(Ordering::Less));
        // Tied prefix at differing precision has no defined answer
        assert_eq!(year.partial_cmp_fhir(&month), None);
        assert_eq!(
            month.partial_cmp_fhir(&Date::parse("2019-04").unwrap()),
            Some(Ordering::Less)
        );
        assert_eq!(year.partial_cmp_fhir(&year), Some(Ordering::Equal));
    }

    #[test]
    fn test_time_parse_and_compare() {
        let t1 = Time::parse("14:30").unwrap();
        let t2 = Time::parse("14:30:05").unwrap();
        assert_eq!(t1.precision, TimePrecision::Minute);
        assert_eq!(t1.partial_cmp_fhir(&t2), None);
        assert_eq!(
            Time::parse("09:00")
                .unwrap()
                .partial_cmp_fhir(&Time::parse("10:00").unwrap()),
            Some(Ordering::Less)
        );
        assert!(Time::parse("25:00").is_none());
        assert!(Time::parse("14:61").is_none());
    }

    #[test]
    fn test_datetime_offset_normalization() {
        // 10:00+02:00 is the same instant as 08:00Z
        let a = DateTime::parse("2023-05-01T10:00:00+02:00").unwrap();
        let b = DateTime::parse("2023-05-01T08:00:00Z").unwrap();
        assert_eq!(a.partial_cmp_fhir(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_datetime_partial_precision() {
        let year_only = DateTime::parse("2023T").unwrap();
        assert_eq!(year_only.precision, DateTimePrecision::Year);
        let full = DateTime::parse("2023-05-01T10:00:00Z").unwrap();
        assert_eq!(year_only.partial_cmp_fhir(&full), None);
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["2019", "2019-03", "2019-03-05"] {
            assert_eq!(Date::parse(s).unwrap().to_string(), s);
        }
        assert_eq!(Time::parse("14:30").unwrap().to_string(), "14:30");
        assert_eq!(
            DateTime::parse("2023-05-01T10:00:00Z").unwrap().to_string(),
            "2023-05-01T10:00:00Z"
        );
        assert_eq!(
            DateTime::parse("2023-05-01T10:00:00+02:00")
                .unwrap()
                .to_string(),
            "2023-05-01T10:00:00+02:00"
        );
    }

    #[test]
    fn test_millisecond_fraction() {
        let t = Time::parse("14:30:05.2").unwrap();
        assert_eq!(t.to_string(), "14:30:05.200");
        let t = Time::parse("14:30:05.25799").unwrap();
        assert_eq!(t.to_string(), "14:30:05.257");
    }
}
