//! Calendar time primitives
//!
//! Signed ISO-8601 durations (`PT6H`, `P1D`, `-PT9H`, `P1W`, `PT6H30M`) and the two
//! timestamp renderings used throughout a cycle: ISO (`2021-12-12T06:00:00Z`) and the
//! compact directory form (`20211212T060000Z`). Years and months are rejected since
//! they have no fixed length.

use crate::error::TimeError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const DIRECTORY_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// Largest accepted magnitude (about 27 years); keeps chrono arithmetic in range.
const MAX_SECONDS: i64 = 10_000 * SECONDS_PER_DAY;

/// A signed, calendar-free duration with one-second resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IsoDuration {
    seconds: i64,
}

impl IsoDuration {
    pub fn from_seconds(seconds: i64) -> Result<Self, TimeError> {
        if seconds.abs() > MAX_SECONDS {
            return Err(TimeError::InvalidDuration(format!("{}s", seconds)));
        }
        Ok(Self { seconds })
    }

    pub fn hours(hours: i64) -> Self {
        Self {
            seconds: (hours * SECONDS_PER_HOUR).clamp(-MAX_SECONDS, MAX_SECONDS),
        }
    }

    pub fn days(days: i64) -> Self {
        Self {
            seconds: (days * SECONDS_PER_DAY).clamp(-MAX_SECONDS, MAX_SECONDS),
        }
    }

    pub fn zero() -> Self {
        Self { seconds: 0 }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn is_negative(&self) -> bool {
        self.seconds < 0
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds)
    }

    pub fn neg(&self) -> Self {
        Self {
            seconds: -self.seconds,
        }
    }

    /// Parse an ISO-8601 duration
    pub fn parse(text: &str) -> Result<Self, TimeError> {
        let invalid = || TimeError::InvalidDuration(text.to_string());
        let trimmed = text.trim();

        let (sign, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let rest = rest.strip_prefix('P').ok_or_else(invalid)?;

        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return Err(invalid());
                }
                (date, Some(time))
            }
            None => (rest, None),
        };

        let mut total: i64 = 0;
        let mut components = 0;

        for (value, unit) in split_components(date_part).ok_or_else(invalid)? {
            let scale = match unit {
                'W' => SECONDS_PER_WEEK,
                'D' => SECONDS_PER_DAY,
                _ => return Err(invalid()),
            };
            total = accumulate(total, value, scale).ok_or_else(invalid)?;
            components += 1;
        }

        if let Some(time_part) = time_part {
            for (value, unit) in split_components(time_part).ok_or_else(invalid)? {
                let scale = match unit {
                    'H' => SECONDS_PER_HOUR,
                    'M' => SECONDS_PER_MINUTE,
                    'S' => 1,
                    _ => return Err(invalid()),
                };
                total = accumulate(total, value, scale).ok_or_else(invalid)?;
                components += 1;
            }
        }

        if components == 0 {
            return Err(invalid());
        }

        Self::from_seconds(sign * total).map_err(|_| invalid())
    }
}

fn accumulate(total: i64, value: i64, scale: i64) -> Option<i64> {
    value
        .checked_mul(scale)
        .and_then(|v| total.checked_add(v))
        .filter(|v| *v <= MAX_SECONDS)
}

/// Split `6H30M` into `[(6, 'H'), (30, 'M')]`. Returns None on malformed input.
fn split_components(part: &str) -> Option<Vec<(i64, char)>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for ch in part.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            if digits.is_empty() {
                return None;
            }
            out.push((digits.parse().ok()?, ch));
            digits.clear();
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(out)
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 {
            return write!(f, "PT0S");
        }
        let mut remaining = self.seconds.abs();
        let days = remaining / SECONDS_PER_DAY;
        remaining %= SECONDS_PER_DAY;
        let hours = remaining / SECONDS_PER_HOUR;
        remaining %= SECONDS_PER_HOUR;
        let minutes = remaining / SECONDS_PER_MINUTE;
        let seconds = remaining % SECONDS_PER_MINUTE;

        if self.seconds < 0 {
            write!(f, "-")?;
        }
        write!(f, "P")?;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 {
            write!(f, "T")?;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if seconds > 0 {
                write!(f, "{}S", seconds)?;
            }
        }
        Ok(())
    }
}

impl FromStr for IsoDuration {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IsoDuration::parse(s)
    }
}

impl Serialize for IsoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        IsoDuration::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// `t + d`, failing instead of panicking at the edge of chrono's range
pub fn shift(t: DateTime<Utc>, d: IsoDuration) -> Result<DateTime<Utc>, TimeError> {
    t.checked_add_signed(d.to_chrono())
        .ok_or(TimeError::Overflow(t))
}

/// Render as `2021-12-12T06:00:00Z`
pub fn iso(t: &DateTime<Utc>) -> String {
    t.format(ISO_FORMAT).to_string()
}

/// Render as `20211212T060000Z`
pub fn directory(t: &DateTime<Utc>) -> String {
    t.format(DIRECTORY_FORMAT).to_string()
}

/// Parse either rendering (or RFC 3339) into a UTC timestamp
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TimeError> {
    let trimmed = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in [ISO_FORMAT, DIRECTORY_FORMAT, "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(TimeError::InvalidTimestamp(text.to_string()))
}
