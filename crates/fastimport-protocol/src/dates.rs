//! Date parsing for who/when sections
//!
//! Three date styles appear in streams: git's raw `<seconds> <±HHMM>`,
//! RFC 2822 (`Tue, 25 Feb 2014 11:58:00 +0000`) and the literal sentinel
//! `now`. The parser detects the style from the first date it sees; a
//! style can also be fixed by name up front.

use fastimport_core::Error as CoreError;

use crate::error::{ParseError, ParseResult};

/// Clock used to resolve the `now` sentinel, in seconds since the epoch.
pub type Clock = fn() -> i64;

/// Seconds since the epoch from the system clock.
pub fn system_clock() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// A named who/when date style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Raw,
    Rfc2822,
    Now,
}

impl DateFormat {
    /// Look up a style by its stream name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "raw" => Ok(DateFormat::Raw),
            "rfc2822" => Ok(DateFormat::Rfc2822),
            "now" => Ok(DateFormat::Now),
            _ => Err(CoreError::UnknownDateFormat(name.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DateFormat::Raw => "raw",
            DateFormat::Rfc2822 => "rfc2822",
            DateFormat::Now => "now",
        }
    }

    /// Pick the style a date string is written in.
    pub fn detect(date: &[u8]) -> Self {
        if date == b"now" {
            DateFormat::Now
        } else if date.split(|&b| b == b' ').count() == 2 {
            DateFormat::Raw
        } else {
            DateFormat::Rfc2822
        }
    }

    /// Parse a date. The `now` style ignores the text and reads the clock,
    /// with a zero UTC offset.
    pub fn parse(self, date: &[u8], lineno: u64, clock: Clock) -> ParseResult<(i64, i32)> {
        match self {
            DateFormat::Raw => parse_raw(date, lineno),
            DateFormat::Rfc2822 => parse_rfc2822(date, lineno),
            DateFormat::Now => Ok((clock(), 0)),
        }
    }
}

fn bad_date(date: &[u8], lineno: u64) -> ParseError {
    ParseError::BadFormat {
        lineno,
        command: "who",
        section: "date",
        text: String::from_utf8_lossy(date).into_owned(),
    }
}

/// Raw style: `<seconds-since-epoch> <±HHMM>`.
pub fn parse_raw(date: &[u8], lineno: u64) -> ParseResult<(i64, i32)> {
    let mut parts = date.splitn(2, |&b| b == b' ');
    let seconds = parts.next().unwrap_or_default();
    let timezone = parts.next().ok_or_else(|| bad_date(date, lineno))?;
    let timestamp: i64 = std::str::from_utf8(seconds)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad_date(date, lineno))?;
    let offset = parse_tz(timezone, lineno)?;
    Ok((timestamp, offset))
}

/// Timezone token `[+|-]HHMM` to an offset in seconds. The hour part may
/// be wider than two digits.
pub fn parse_tz(timezone: &[u8], lineno: u64) -> ParseResult<i32> {
    let fail = || ParseError::InvalidTimezone {
        lineno,
        timezone: String::from_utf8_lossy(timezone).into_owned(),
        reason: String::new(),
    };
    let sign: i32 = match timezone.first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(fail()),
    };
    if timezone.len() < 4 {
        return Err(fail());
    }
    let digits = &timezone[1..];
    let (hour_part, minute_part) = digits.split_at(digits.len() - 2);
    let hours: i32 = std::str::from_utf8(hour_part)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(fail)?;
    let minutes: i32 = std::str::from_utf8(minute_part)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(fail)?;
    Ok(sign * 60 * (hours * 60 + minutes))
}

/// RFC 2822 style: `[Www, ]DD Mon YYYY HH:MM[:SS] ±HHMM`, with `GMT`,
/// `UTC` and `UT` accepted as zero offsets.
pub fn parse_rfc2822(date: &[u8], lineno: u64) -> ParseResult<(i64, i32)> {
    let text = std::str::from_utf8(date).map_err(|_| bad_date(date, lineno))?;
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.first().map_or(false, |t| t.ends_with(',')) {
        tokens.remove(0);
    }
    if tokens.len() != 5 {
        return Err(bad_date(date, lineno));
    }
    let day: i64 = tokens[0].parse().map_err(|_| bad_date(date, lineno))?;
    let month = month_number(tokens[1]).ok_or_else(|| bad_date(date, lineno))?;
    let mut year: i64 = tokens[2].parse().map_err(|_| bad_date(date, lineno))?;
    if year < 100 {
        // two-digit years per RFC 2822 obsolete syntax
        year += if year < 50 { 2000 } else { 1900 };
    }
    let (hours, minutes, seconds) = parse_hms(tokens[3]).ok_or_else(|| bad_date(date, lineno))?;
    let offset = match tokens[4] {
        "GMT" | "UTC" | "UT" => 0,
        zone => parse_tz(zone.as_bytes(), lineno)?,
    };
    let days = days_from_civil(year, month, day);
    let local = days * 86400 + hours * 3600 + minutes * 60 + seconds;
    Ok((local - i64::from(offset), offset))
}

fn month_number(name: &str) -> Option<i64> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == lower)
        .map(|index| index as i64 + 1)
}

fn parse_hms(token: &str) -> Option<(i64, i64, i64)> {
    let mut parts = token.split(':');
    let hours = parts.next()?.parse().ok()?;
    let minutes = parts.next()?.parse().ok()?;
    let seconds = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((hours, minutes, seconds))
}

// Days since 1970-01-01 for a proleptic Gregorian civil date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let year_of_era = year - era * 400;
    let shifted_month = (month + 9) % 12;
    let day_of_year = (153 * shifted_month + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146097 + day_of_era - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_clock() -> i64 {
        1_234_567_890
    }

    #[test]
    fn test_detect() {
        assert_eq!(DateFormat::detect(b"now"), DateFormat::Now);
        assert_eq!(DateFormat::detect(b"1234567890 -0500"), DateFormat::Raw);
        assert_eq!(
            DateFormat::detect(b"Tue, 25 Feb 2014 11:58:00 +0000"),
            DateFormat::Rfc2822
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(DateFormat::from_name("raw").unwrap(), DateFormat::Raw);
        assert_eq!(
            DateFormat::from_name("rfc2822").unwrap(),
            DateFormat::Rfc2822
        );
        assert_eq!(DateFormat::from_name("now").unwrap(), DateFormat::Now);
        assert!(matches!(
            DateFormat::from_name("iso8601"),
            Err(CoreError::UnknownDateFormat(_))
        ));
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(
            parse_raw(b"1234567890 -0500", 1).unwrap(),
            (1234567890, -18000)
        );
        assert_eq!(parse_raw(b"0 +0000", 1).unwrap(), (0, 0));
        assert_eq!(parse_raw(b"-100 +0530", 1).unwrap(), (-100, 19800));
        assert!(matches!(
            parse_raw(b"1234567890", 1),
            Err(ParseError::BadFormat { .. })
        ));
        assert!(matches!(
            parse_raw(b"notanumber +0000", 1),
            Err(ParseError::BadFormat { .. })
        ));
    }

    #[test]
    fn test_parse_tz() {
        assert_eq!(parse_tz(b"+0000", 1).unwrap(), 0);
        assert_eq!(parse_tz(b"-0500", 1).unwrap(), -18000);
        assert_eq!(parse_tz(b"+0530", 1).unwrap(), 19800);
        // the hour part may be wider than two digits
        assert_eq!(parse_tz(b"+10000", 1).unwrap(), 360000);
        assert!(matches!(
            parse_tz(b"0500", 1),
            Err(ParseError::InvalidTimezone { .. })
        ));
        assert!(matches!(
            parse_tz(b"+05", 1),
            Err(ParseError::InvalidTimezone { .. })
        ));
    }

    #[test]
    fn test_parse_rfc2822() {
        let (timestamp, offset) = parse_rfc2822(b"Tue, 25 Feb 2014 11:58:00 +0000", 1).unwrap();
        assert_eq!(timestamp, 1393329480);
        assert_eq!(offset, 0);

        // the weekday is optional
        let (timestamp, offset) = parse_rfc2822(b"25 Feb 2014 11:58:00 +0000", 1).unwrap();
        assert_eq!(timestamp, 1393329480);
        assert_eq!(offset, 0);

        // seconds are optional, GMT means zero offset
        let (timestamp, _) = parse_rfc2822(b"1 Jan 1970 00:01 GMT", 1).unwrap();
        assert_eq!(timestamp, 60);
    }

    #[test]
    fn test_parse_rfc2822_offset_shifts_epoch() {
        let (timestamp, offset) = parse_rfc2822(b"Tue, 25 Feb 2014 11:58:00 +0100", 1).unwrap();
        assert_eq!(offset, 3600);
        assert_eq!(timestamp, 1393329480 - 3600);
    }

    #[test]
    fn test_parse_rfc2822_rejects_garbage() {
        assert!(matches!(
            parse_rfc2822(b"yesterday", 1),
            Err(ParseError::BadFormat { .. })
        ));
        assert!(matches!(
            parse_rfc2822(b"25 Top 2014 11:58:00 +0000", 1),
            Err(ParseError::BadFormat { .. })
        ));
    }

    #[test]
    fn test_now_uses_clock() {
        assert_eq!(
            DateFormat::Now.parse(b"now", 1, fixed_clock).unwrap(),
            (1_234_567_890, 0)
        );
    }

    #[test]
    fn test_days_from_civil() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11017);
        assert_eq!(days_from_civil(2014, 2, 25), 16126);
    }
}
