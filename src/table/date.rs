//! ISO-8601 date prefixes to UTC epoch seconds.
//!
//! Accepted forms, each a prefix of the next:
//! `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH`, `YYYY-MM-DDTHH:MM`,
//! `YYYY-MM-DDTHH:MM:SS[.fff]`, optionally followed by `Z`. Missing trailing
//! components take their minimum value.

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::util::{Error, Result};

/// Years added to pre-1970 dates before conversion. A multiple of four with
/// no skipped century leap day in range, so weekdays and leap days line up.
const EPOCH_BIAS_YEARS: i32 = 56;

/// Parse an ISO-8601 prefix into seconds since 1970-01-01T00:00:00Z.
pub fn parse_date(text: &str) -> Result<f64> {
    let invalid = || Error::InvalidDate(text.to_string());
    let s = text.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    if !s.is_ascii() {
        return Err(invalid());
    }

    let field = |start: usize, end: usize| -> Result<u32> {
        let part = s.get(start..end).ok_or_else(invalid)?;
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        part.parse().map_err(|_| invalid())
    };
    let separator = |at: usize, allowed: &[u8]| -> Result<()> {
        match s.as_bytes().get(at) {
            Some(b) if allowed.contains(b) => Ok(()),
            _ => Err(invalid()),
        }
    };

    let year = field(0, 4)? as i32;
    let (mut month, mut day, mut hour, mut minute) = (1, 1, 0, 0);
    let mut second = 0.0;
    if s.len() > 4 {
        separator(4, b"-")?;
        month = field(5, 7)?;
    }
    if s.len() > 7 {
        separator(7, b"-")?;
        day = field(8, 10)?;
    }
    if s.len() > 10 {
        separator(10, b"T ")?;
        hour = field(11, 13)?;
    }
    if s.len() > 13 {
        separator(13, b":")?;
        minute = field(14, 16)?;
    }
    if s.len() > 16 {
        separator(16, b":")?;
        let rest = &s[17..];
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }
        second = rest.parse::<f64>().map_err(|_| invalid())?;
    }

    let month = u8::try_from(month).ok().and_then(|m| Month::try_from(m).ok()).ok_or_else(invalid)?;
    let whole_second = second.trunc();
    let time = Time::from_hms(
        u8::try_from(hour).map_err(|_| invalid())?,
        u8::try_from(minute).map_err(|_| invalid())?,
        whole_second as u8,
    )
    .map_err(|_| invalid())?;
    // Validate against the real calendar before any shifting.
    Date::from_calendar_date(year, month, u8::try_from(day).map_err(|_| invalid())?)
        .map_err(|_| invalid())?;

    let fraction = second - whole_second;
    if year >= 1970 {
        Ok(civil_to_epoch(year, month, day as u8, time)? as f64 + fraction)
    } else {
        let biased = civil_to_epoch(year + EPOCH_BIAS_YEARS, month, day as u8, time)?;
        let base = civil_to_epoch(1970 + EPOCH_BIAS_YEARS, Month::January, 1, Time::MIDNIGHT)?;
        Ok((biased - base) as f64 + fraction)
    }
}

fn civil_to_epoch(year: i32, month: Month, day: u8, time: Time) -> Result<i64> {
    let date = Date::from_calendar_date(year, month, day)
        .map_err(|e| Error::InvalidDate(e.to_string()))?;
    Ok(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp())
}

/// Whether a table cell should be read as a date rather than a number.
pub fn looks_like_date(cell: &str) -> bool {
    let b = cell.trim().as_bytes();
    b.len() >= 5 && b[..4].iter().all(u8::is_ascii_digit) && b[4] == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(parse_date("1970").unwrap(), 0.0);
        assert_eq!(parse_date("1970-02").unwrap(), 31.0 * 86400.0);
        assert_eq!(parse_date("1970-01-02").unwrap(), 86400.0);
        assert_eq!(parse_date("1970-01-01T01").unwrap(), 3600.0);
        assert_eq!(parse_date("1970-01-01T00:02").unwrap(), 120.0);
        assert_eq!(parse_date("1970-01-01T00:00:03").unwrap(), 3.0);
        assert_eq!(parse_date("1970-01-01 00:00:03.5Z").unwrap(), 3.5);
    }

    #[test]
    fn test_leap_day() {
        let t = parse_date("2024-02-29").unwrap();
        assert_eq!(t, 1_709_164_800.0);
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("1900-02-29").is_err());
    }

    #[test]
    fn test_pre_epoch() {
        assert_eq!(parse_date("1969-12-31T23:59:59").unwrap(), -1.0);
        assert_eq!(parse_date("1969").unwrap(), -365.0 * 86400.0);
        // 1968 is a leap year; its leap day survives the shift.
        assert_eq!(parse_date("1968-02-29").unwrap(), parse_date("1968-02-28").unwrap() + 86400.0);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_date("").is_err());
        assert!(parse_date("19x0").is_err());
        assert!(parse_date("2024/01/01").is_err());
        assert!(parse_date("2024-13").is_err());
        assert!(parse_date("2024-01-01T25").is_err());
        assert!(parse_date("2024-01-01T00:00:").is_err());
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("2024-01-01"));
        assert!(!looks_like_date("2024"));
        assert!(!looks_like_date("1e-5"));
        assert!(!looks_like_date("-12.5"));
    }
}
