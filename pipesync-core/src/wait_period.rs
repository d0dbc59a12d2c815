//! The wait period between two batch updates.
//!
//! Textual grammar (time-span style, non-negative only):
//!
//! ```text
//! d                     whole days
//! [d.]hh:mm             hours and minutes
//! [d.]hh:mm:ss[.f]      with seconds and 1-7 fractional digits (100 ns ticks)
//! ```
//!
//! Leading and trailing whitespace is ignored.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const SECONDS_PER_DAY: u64 = 86_400;
const NANOS_PER_TICK: u32 = 100;
const MAX_FRACTION_DIGITS: usize = 7;

/// A validated, non-negative wait period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitPeriod(Duration);

impl WaitPeriod {
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub const fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<WaitPeriod> for Duration {
    fn from(period: WaitPeriod) -> Self {
        period.0
    }
}

impl FromStr for WaitPeriod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &'static str| ConfigError::InvalidWaitPeriod {
            input: s.to_string(),
            reason,
        };

        let text = s.trim();
        if text.is_empty() {
            return Err(invalid("empty value"));
        }
        if text.starts_with('-') {
            return Err(invalid("negative durations are not allowed"));
        }

        // A bare number is a whole count of days.
        if !text.contains(':') {
            let days = parse_digits(text, 8).ok_or_else(|| invalid("expected whole days or hh:mm[:ss]"))?;
            return Ok(Self(Duration::from_secs(days * SECONDS_PER_DAY)));
        }

        let mut fields: Vec<&str> = text.split(':').collect();
        if fields.len() > 3 {
            return Err(invalid("too many ':' separated fields"));
        }

        let mut days = 0u64;
        let head = fields[0];
        if let Some((day_part, hour_part)) = head.split_once('.') {
            days = parse_digits(day_part, 8).ok_or_else(|| invalid("malformed day count"))?;
            fields[0] = hour_part;
        }

        let hours = parse_bounded(fields[0], 23).ok_or_else(|| invalid("hours must be 0-23"))?;
        let minutes = parse_bounded(fields[1], 59).ok_or_else(|| invalid("minutes must be 0-59"))?;

        let (seconds, nanos) = match fields.get(2) {
            None => (0, 0),
            Some(field) => {
                let (whole, fraction) = match field.split_once('.') {
                    Some((whole, fraction)) => (whole, Some(fraction)),
                    None => (*field, None),
                };
                let seconds =
                    parse_bounded(whole, 59).ok_or_else(|| invalid("seconds must be 0-59"))?;
                let nanos = match fraction {
                    None => 0,
                    Some(fraction) => {
                        parse_fraction(fraction).ok_or_else(|| invalid("malformed fraction"))?
                    }
                };
                (seconds, nanos)
            }
        };

        let total = days * SECONDS_PER_DAY + hours * 3_600 + minutes * 60 + seconds;
        Ok(Self(Duration::new(total, nanos)))
    }
}

impl fmt::Display for WaitPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_secs();
        let days = total / SECONDS_PER_DAY;
        let hours = (total % SECONDS_PER_DAY) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;

        if days > 0 {
            write!(f, "{days}.")?;
        }
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")?;
        let ticks = self.0.subsec_nanos() / NANOS_PER_TICK;
        if ticks > 0 {
            write!(f, ".{ticks:07}")?;
        }
        Ok(())
    }
}

fn parse_digits(text: &str, max_len: usize) -> Option<u64> {
    if text.is_empty() || text.len() > max_len || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_bounded(text: &str, max: u64) -> Option<u64> {
    parse_digits(text, 2).filter(|value| *value <= max)
}

fn parse_fraction(text: &str) -> Option<u32> {
    if text.len() > MAX_FRACTION_DIGITS {
        return None;
    }
    let digits = parse_digits(text, MAX_FRACTION_DIGITS)?;
    let scale = 10u64.pow((MAX_FRACTION_DIGITS - text.len()) as u32);
    u32::try_from(digits * scale).ok().map(|ticks| ticks * NANOS_PER_TICK)
}
