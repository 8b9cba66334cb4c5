//! Interval strings such as `30s`, `5m` or `1M`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(ms|s|m|h|d|w|M|y)$").expect("valid interval pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("invalid interval {0:?}: expected <number><unit> with unit one of ms, s, m, h, d, w, M, y")]
    Format(String),

    #[error("interval {0:?} is too large")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ms")]
    Millis,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
    #[serde(rename = "w")]
    Weeks,
    #[serde(rename = "M")]
    Months,
    #[serde(rename = "y")]
    Years,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Millis => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
            TimeUnit::Weeks => "w",
            TimeUnit::Months => "M",
            TimeUnit::Years => "y",
        }
    }

    // calendar units are approximated: month = 30d, year = 365d
    pub fn millis(&self) -> u64 {
        const SECOND: u64 = 1_000;
        const DAY: u64 = 86_400 * SECOND;
        match self {
            TimeUnit::Millis => 1,
            TimeUnit::Seconds => SECOND,
            TimeUnit::Minutes => 60 * SECOND,
            TimeUnit::Hours => 3_600 * SECOND,
            TimeUnit::Days => DAY,
            TimeUnit::Weeks => 7 * DAY,
            TimeUnit::Months => 30 * DAY,
            TimeUnit::Years => 365 * DAY,
        }
    }

    fn parse(unit: &str) -> Option<Self> {
        Some(match unit {
            "ms" => TimeUnit::Millis,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            "w" => TimeUnit::Weeks,
            "M" => TimeUnit::Months,
            "y" => TimeUnit::Years,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub value: u64,
    pub unit: TimeUnit,
}

impl Interval {
    pub fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn as_millis(&self) -> i64 {
        i64::try_from(self.value.saturating_mul(self.unit.millis())).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

/// Parse `<number><unit>`. Anything else is an error; this runs at
/// configuration time, not per keystroke.
pub fn parse_interval(input: &str) -> Result<Interval, IntervalError> {
    let caps = INTERVAL
        .captures(input)
        .ok_or_else(|| IntervalError::Format(input.to_string()))?;

    let value = caps[1]
        .parse::<u64>()
        .map_err(|_| IntervalError::Overflow(input.to_string()))?;
    let unit = TimeUnit::parse(&caps[2]).ok_or_else(|| IntervalError::Format(input.to_string()))?;
    Ok(Interval::new(value, unit))
}
