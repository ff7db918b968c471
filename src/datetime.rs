//! Parsing and formatting of the DA, TM and DT value representations.

use std::fmt;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{DecodeError, Result};

/// A DT value: a local date and time with an optional UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DicomDateTime {
    pub datetime: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl DicomDateTime {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The instant in UTC, treating a missing offset as UTC.
    pub fn to_utc(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => self.datetime - chrono::Duration::seconds(offset.local_minus_utc() as i64),
            None => self.datetime,
        }
    }
}

impl fmt::Display for DicomDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            format_date(self.datetime.date()),
            format_time(self.datetime.time())
        )?;
        if let Some(offset) = self.offset {
            let minutes = offset.local_minus_utc() / 60;
            let sign = if minutes < 0 { '-' } else { '+' };
            let minutes = minutes.abs();
            write!(f, "{sign}{:02}{:02}", minutes / 60, minutes % 60)?;
        }
        Ok(())
    }
}

fn malformed(input: &str) -> DecodeError {
    DecodeError::MalformedDateTime(input.to_owned())
}

/// Date and time fields are sliced by byte offset, so only ASCII is
/// accepted.
fn ascii(input: &str) -> Result<&str> {
    if input.is_ascii() {
        Ok(input)
    } else {
        Err(malformed(input))
    }
}

fn number(input: &str, digits: &str) -> Result<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(input));
    }
    digits.parse().map_err(|_| malformed(input))
}

/// Converts a `.FFFFFF` suffix (without the dot) to microseconds.
fn fraction_micros(input: &str, digits: &str) -> Result<u32> {
    if digits.is_empty() {
        return Ok(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(input));
    }
    let mut scaled = String::with_capacity(6);
    scaled.extend(digits.chars().take(6));
    while scaled.len() < 6 {
        scaled.push('0');
    }
    number(input, &scaled)
}

/// Parses `YYYYMMDD`, tolerating the legacy `YYYY.MM.DD` form.
///
/// Month and day may be left out and default to the first.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let digits: String = ascii(input)?.trim().chars().filter(|&c| c != '.').collect();
    let (year, month, day) = match digits.len() {
        8 => (&digits[..4], &digits[4..6], &digits[6..8]),
        6 => (&digits[..4], &digits[4..6], "01"),
        4 => (&digits[..4], "01", "01"),
        _ => return Err(malformed(input)),
    };
    NaiveDate::from_ymd_opt(
        number(input, year)? as i32,
        number(input, month)?,
        number(input, day)?,
    )
    .ok_or_else(|| malformed(input))
}

/// Parses `HHMMSS.FFFFFF`, tolerating the legacy `HH:MM:SS` form.
///
/// Trailing components may be left out.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let cleaned: String = ascii(input)?.trim().chars().filter(|&c| c != ':').collect();
    let (mut whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole.to_owned(), fraction),
        None => (cleaned.clone(), ""),
    };
    let micros = fraction_micros(input, fraction)?;

    if !fraction.is_empty() && whole.len() < 6 {
        tracing::debug!(time = input, "non-standard time with fraction, padding to HHMMSS");
        whole = format!("{whole:0>6}");
    }

    let (hour, minute, second) = match whole.len() {
        0 => (0, 0, 0),
        1 | 2 => (number(input, &whole)?, 0, 0),
        3 | 4 => {
            let split = whole.len() - 2;
            (number(input, &whole[..split])?, number(input, &whole[split..])?, 0)
        }
        5 | 6 => {
            let split = whole.len() - 4;
            (
                number(input, &whole[..split])?,
                number(input, &whole[split..split + 2])?,
                number(input, &whole[split + 2..])?,
            )
        }
        _ => return Err(malformed(input)),
    };

    // leap seconds (SS = 60) are folded into the last second
    NaiveTime::from_hms_micro_opt(hour, minute, second.min(59), micros)
        .ok_or_else(|| malformed(input))
}

/// Parses `YYYYMMDDHHMMSS.FFFFFF&ZZXX` where `&` is `+` or `-`.
pub fn parse_date_time(input: &str) -> Result<DicomDateTime> {
    let trimmed = ascii(input)?.trim();
    let (body, offset) = match trimmed.find(['+', '-']) {
        Some(idx) => (&trimmed[..idx], Some(parse_offset(input, &trimmed[idx..])?)),
        None => (trimmed, None),
    };

    let (whole, fraction) = body.split_once('.').unwrap_or((body, ""));
    let micros = fraction_micros(input, fraction)?;

    let field = |range: std::ops::Range<usize>, default: u32| -> Result<u32> {
        match whole.get(range) {
            Some(digits) if !digits.is_empty() => number(input, digits),
            _ => Ok(default),
        }
    };

    if !matches!(whole.len(), 4 | 6 | 8 | 10 | 12 | 14) {
        return Err(malformed(input));
    }
    let date = NaiveDate::from_ymd_opt(field(0..4, 1970)? as i32, field(4..6, 1)?, field(6..8, 1)?)
        .ok_or_else(|| malformed(input))?;
    let time = NaiveTime::from_hms_micro_opt(
        field(8..10, 0)?,
        field(10..12, 0)?,
        field(12..14, 0)?.min(59),
        micros,
    )
    .ok_or_else(|| malformed(input))?;

    let mut value = DicomDateTime::new(date.and_time(time));
    if let Some(offset) = offset {
        value = value.with_offset(offset);
    }
    Ok(value)
}

fn parse_offset(input: &str, text: &str) -> Result<FixedOffset> {
    let negative = text.starts_with('-');
    let digits = ascii(&text[1..])?;
    let minutes = match digits.len() {
        2 => 60 * number(input, digits)?,
        4 => 60 * number(input, &digits[..2])? + number(input, &digits[2..])?,
        _ => return Err(malformed(input)),
    } as i32;
    let seconds = if negative { -minutes * 60 } else { minutes * 60 };
    FixedOffset::east_opt(seconds).ok_or_else(|| malformed(input))
}

pub fn format_date(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

/// Formats a time as `HHMMSS`, adding `.FFFFFF` only when there is a fraction.
pub fn format_time(time: NaiveTime) -> String {
    let micros = time.nanosecond() / 1_000;
    if micros == 0 {
        format!("{:02}{:02}{:02}", time.hour(), time.minute(), time.second())
    } else {
        format!(
            "{:02}{:02}{:02}.{:06}",
            time.hour(),
            time.minute(),
            time.second(),
            micros
        )
    }
}
