//! Activation-time arithmetic for the scheduler loop.
//!
//! A schedule is an interval (`1h`, `12h`, `1d`, `1w`, `1mo`) plus a
//! wall-clock start time (`HH:MM`). Activations form a grid anchored at
//! 1970-01-01 `HH:MM` local time: the next activation is the earliest grid
//! point strictly in the future. Daily and longer intervals therefore fire
//! exactly at the start time; shorter intervals fire at `start + k * interval`.

use chrono::{DateTime, Duration, Local, TimeZone};

use crate::error::KometaError;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 604_800;
/// Months are approximated as 30 days, as the interval grammar documents.
const SECONDS_PER_MONTH: i64 = 2_592_000;

/// A parsed interval specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub value: u32,
    pub unit: IntervalUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

impl Interval {
    pub fn as_seconds(&self) -> i64 {
        let per_unit = match self.unit {
            IntervalUnit::Hours => SECONDS_PER_HOUR,
            IntervalUnit::Days => SECONDS_PER_DAY,
            IntervalUnit::Weeks => SECONDS_PER_WEEK,
            IntervalUnit::Months => SECONDS_PER_MONTH,
        };
        i64::from(self.value) * per_unit
    }
}

/// Parse `<N>{h|d|w|mo}` (case-insensitive).
pub fn parse_interval(spec: &str) -> Result<Interval, KometaError> {
    let spec = spec.trim().to_lowercase();
    let digits: String = spec.chars().take_while(|c| c.is_ascii_digit()).collect();
    let unit = &spec[digits.len()..];

    let value: u32 = digits.parse().map_err(|_| invalid_interval(&spec))?;
    if value == 0 {
        return Err(invalid_interval(&spec));
    }

    let unit = match unit {
        "h" => IntervalUnit::Hours,
        "d" => IntervalUnit::Days,
        "w" => IntervalUnit::Weeks,
        "mo" => IntervalUnit::Months,
        _ => return Err(invalid_interval(&spec)),
    };

    Ok(Interval { value, unit })
}

fn invalid_interval(spec: &str) -> KometaError {
    KometaError::Schedule(format!(
        "invalid interval '{}': expected <N>h, <N>d, <N>w, or <N>mo (e.g. 12h, 1d)",
        spec
    ))
}

/// Parse a 24-hour `HH:MM` start time.
pub fn parse_start_time(spec: &str) -> Result<(u32, u32), KometaError> {
    let (h, m) = spec
        .trim()
        .split_once(':')
        .ok_or_else(|| invalid_time(spec))?;
    let hours: u32 = h.parse().map_err(|_| invalid_time(spec))?;
    let minutes: u32 = m.parse().map_err(|_| invalid_time(spec))?;
    if hours > 23 || minutes > 59 || m.len() != 2 {
        return Err(invalid_time(spec));
    }
    Ok((hours, minutes))
}

fn invalid_time(spec: &str) -> KometaError {
    KometaError::Schedule(format!(
        "invalid start time '{}': expected HH:MM (e.g. 03:00, 15:30)",
        spec
    ))
}

/// The earliest activation strictly after `now`.
pub fn next_activation(
    interval: Interval,
    start_hour: u32,
    start_minute: u32,
    now: DateTime<Local>,
) -> DateTime<Local> {
    let anchor = Local
        .with_ymd_and_hms(1970, 1, 1, start_hour, start_minute, 0)
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(0, 0).unwrap());

    let step = interval.as_seconds();
    let elapsed = (now - anchor).num_seconds();
    // Smallest k with anchor + k * step > now.
    let k = if elapsed < 0 { 0 } else { elapsed / step + 1 };

    anchor + Duration::seconds(k * step)
}
