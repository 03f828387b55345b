//! # Date/Time Types
//!
//! `date`, `time`, `datetime`, `datetime-ms` and `datetime-us`, validated
//! against a compiled format grammar.
//!
//! ## Format grammar
//!
//! ```text
//! Token   Width   Meaning            Literals
//! ──────────────────────────────────────────────
//! YYYY    4       year               -  :  .  space
//! MM      2       month 01-12
//! DD      2       day of month
//! HH      2       hour 00-23
//! mm      2       minute 00-59
//! ss      2       second 00-59 (60 on leap-second moments)
//! SSS     3/6     fraction
//! ```
//!
//! `$leapYear` (default true) controls Feb 29. `$leapSecond` (default
//! false) admits `23:59:60` only on the historical insertion dates; a
//! format without a year falls back to the `06-30`/`12-31` month-end pair,
//! and a format without a date (the `time` type) admits the moment
//! whenever the flag is set.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{DefinitionError, IssueCode};
use crate::types::Directives;

/// UTC dates whose final second was the inserted `23:59:60`, from the
/// first insertion in 1972 through 2016.
const LEAP_SECOND_DATES: &[(u16, u8, u8)] = &[
    (1972, 6, 30),
    (1972, 12, 31),
    (1973, 12, 31),
    (1974, 12, 31),
    (1975, 12, 31),
    (1976, 12, 31),
    (1977, 12, 31),
    (1978, 12, 31),
    (1979, 12, 31),
    (1981, 6, 30),
    (1982, 6, 30),
    (1983, 6, 30),
    (1985, 6, 30),
    (1987, 12, 31),
    (1989, 12, 31),
    (1990, 12, 31),
    (1992, 6, 30),
    (1993, 6, 30),
    (1994, 6, 30),
    (1995, 12, 31),
    (1997, 6, 30),
    (1998, 12, 31),
    (2005, 12, 31),
    (2008, 12, 31),
    (2012, 6, 30),
    (2015, 6, 30),
    (2016, 12, 31),
];

/// One element of a compiled format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtToken {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// Fraction of the given digit count (3 or 6).
    Frac(u8),
    Lit(char),
}

/// Compiled format plus the leap flags of a date/time node.
#[derive(Debug, Clone)]
pub struct DateTimeSpec {
    pub tokens: Vec<FmtToken>,
    pub source: String,
    pub leap_year: bool,
    pub leap_second: bool,
}

pub(crate) fn build(base: &str, bag: &mut Directives<'_>) -> Result<DateTimeSpec, DefinitionError> {
    let default = match base {
        "date" => "YYYY-MM-DD",
        "time" => "HH:mm:ss",
        "datetime" => "YYYY-MM-DD HH:mm:ss",
        "datetime-ms" => "YYYY-MM-DD HH:mm:ss.SSS",
        "datetime-us" => "YYYY-MM-DD HH:mm:ss.SSSSSS",
        _ => unreachable!("registry dispatch"),
    };
    let source = bag.take_str("$format")?.unwrap_or(default).to_string();
    let tokens = parse_format(&source)?;
    Ok(DateTimeSpec {
        tokens,
        source,
        leap_year: bag.take_bool("$leapYear")?.unwrap_or(true),
        leap_second: bag.take_bool("$leapSecond")?.unwrap_or(false),
    })
}

/// Compiles a format string into tokens.
fn parse_format(src: &str) -> Result<Vec<FmtToken>, DefinitionError> {
    let err = |reason: String| DefinitionError::InvalidDirective {
        directive: "$format".into(),
        reason,
    };
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut seen = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|x| **x == c).count();
        let token = match c {
            'Y' | 'M' | 'D' | 'H' | 'm' | 's' | 'S' => {
                let (token, width) = match (c, run) {
                    ('Y', 4) => (FmtToken::Year, 4),
                    ('M', 2) => (FmtToken::Month, 2),
                    ('D', 2) => (FmtToken::Day, 2),
                    ('H', 2) => (FmtToken::Hour, 2),
                    ('m', 2) => (FmtToken::Minute, 2),
                    ('s', 2) => (FmtToken::Second, 2),
                    ('S', 3) => (FmtToken::Frac(3), 3),
                    ('S', 6) => (FmtToken::Frac(6), 6),
                    _ => return Err(err(format!("bad token run {c:?} x{run} in {src:?}"))),
                };
                if seen.contains(&c) {
                    return Err(err(format!("duplicate token {c:?} in {src:?}")));
                }
                seen.push(c);
                i += width;
                token
            }
            '-' | ':' | '.' | ' ' => {
                i += 1;
                FmtToken::Lit(c)
            }
            _ => return Err(err(format!("unsupported character {c:?} in {src:?}"))),
        };
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(err("empty format".into()));
    }
    Ok(tokens)
}

struct Captured {
    year: Option<u16>,
    month: Option<u8>,
    day: Option<u8>,
    hour: Option<u8>,
    minute: Option<u8>,
    second: Option<u8>,
}

pub(crate) fn check(value: &Value, spec: &DateTimeSpec) -> Result<(), IssueCode> {
    let Value::String(s) = value else {
        return Err(IssueCode::ExpectedString);
    };
    let captured = capture(s, &spec.tokens).ok_or(IssueCode::InvalidFormat)?;
    if valid(&captured, spec) {
        Ok(())
    } else {
        Err(IssueCode::InvalidFormat)
    }
}

/// Lexically matches the input against the token sequence.
fn capture(s: &str, tokens: &[FmtToken]) -> Option<Captured> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    let mut c = Captured {
        year: None,
        month: None,
        day: None,
        hour: None,
        minute: None,
        second: None,
    };
    for token in tokens {
        match token {
            FmtToken::Lit(l) => {
                if bytes.get(pos) != Some(&(*l as u8)) {
                    return None;
                }
                pos += 1;
            }
            FmtToken::Frac(width) => {
                digits(bytes, &mut pos, usize::from(*width))?;
            }
            FmtToken::Year => c.year = Some(digits(bytes, &mut pos, 4)? as u16),
            FmtToken::Month => c.month = Some(digits(bytes, &mut pos, 2)? as u8),
            FmtToken::Day => c.day = Some(digits(bytes, &mut pos, 2)? as u8),
            FmtToken::Hour => c.hour = Some(digits(bytes, &mut pos, 2)? as u8),
            FmtToken::Minute => c.minute = Some(digits(bytes, &mut pos, 2)? as u8),
            FmtToken::Second => c.second = Some(digits(bytes, &mut pos, 2)? as u8),
        }
    }
    if pos == bytes.len() {
        Some(c)
    } else {
        None
    }
}

fn digits(bytes: &[u8], pos: &mut usize, width: usize) -> Option<u32> {
    let end = pos.checked_add(width)?;
    if end > bytes.len() {
        return None;
    }
    let mut n = 0u32;
    for b in &bytes[*pos..end] {
        if !b.is_ascii_digit() {
            return None;
        }
        n = n * 10 + u32::from(b - b'0');
    }
    *pos = end;
    Some(n)
}

/// Semantic validation of the captured components.
fn valid(c: &Captured, spec: &DateTimeSpec) -> bool {
    if let Some(month) = c.month {
        if !(1..=12).contains(&month) {
            return false;
        }
    }
    if let Some(day) = c.day {
        if day == 0 {
            return false;
        }
        match (c.year, c.month) {
            (Some(year), Some(month)) => {
                if NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                    .is_none()
                {
                    return false;
                }
                if !spec.leap_year && month == 2 && day == 29 {
                    return false;
                }
            }
            (None, Some(month)) => {
                let max = match month {
                    2 => {
                        if spec.leap_year {
                            29
                        } else {
                            28
                        }
                    }
                    4 | 6 | 9 | 11 => 30,
                    _ => 31,
                };
                if day > max {
                    return false;
                }
            }
            _ => {
                if day > 31 {
                    return false;
                }
            }
        }
    }
    if c.hour.is_some_and(|h| h > 23) || c.minute.is_some_and(|m| m > 59) {
        return false;
    }
    if let Some(second) = c.second {
        if second == 60 {
            return leap_second_moment(c, spec);
        }
        if second > 59 {
            return false;
        }
    }
    true
}

fn leap_second_moment(c: &Captured, spec: &DateTimeSpec) -> bool {
    if !spec.leap_second || c.hour != Some(23) || c.minute != Some(59) {
        return false;
    }
    match (c.year, c.month, c.day) {
        (Some(y), Some(m), Some(d)) => LEAP_SECOND_DATES.contains(&(y, m, d)),
        (None, Some(m), Some(d)) => (m == 6 && d == 30) || (m == 12 && d == 31),
        _ => true,
    }
}

// ============================================================================
// TESTS
// ============================================================================
