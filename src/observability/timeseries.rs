//! Time-series aggregation over per-minute rollups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MINUTE_MS: u64 = 60_000;

/// Range of a time-series query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    /// 60 one-minute points.
    #[default]
    Hour,
    /// 24 one-hour points.
    Day,
    /// 7 one-day points.
    Week,
}

impl TimeRange {
    /// Minutes covered by one point.
    pub fn step_minutes(&self) -> u64 {
        match self {
            TimeRange::Hour => 1,
            TimeRange::Day => 60,
            TimeRange::Week => 1440,
        }
    }

    pub fn points(&self) -> usize {
        match self {
            TimeRange::Hour => 60,
            TimeRange::Day => 24,
            TimeRange::Week => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hour => "hour",
            TimeRange::Day => "day",
            TimeRange::Week => "week",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time range {0:?}, expected hour, day or week")]
pub struct ParseTimeRangeError(String);

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeRange::Hour),
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            _ => Err(ParseTimeRangeError(s.to_string())),
        }
    }
}

/// One aggregated point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePoint {
    pub timestamp: DateTime<Utc>,
    pub requests: u64,
    pub rejections: u64,
}

/// Result of a time-series query.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeries {
    pub range: TimeRange,
    pub route: Option<String>,
    pub points: Vec<TimePoint>,
}

/// Fixed-size set of buckets ending at the step containing `now_minute`.
pub(crate) struct SeriesBuilder {
    step: u64,
    first_step: u64,
    counts: Vec<(u64, u64)>,
}

impl SeriesBuilder {
    pub(crate) fn new(range: TimeRange, now_minute: u64) -> Self {
        let step = range.step_minutes();
        let len = range.points();
        let last_step = now_minute / step;
        Self {
            step,
            first_step: last_step.saturating_sub(len as u64 - 1),
            counts: vec![(0, 0); len],
        }
    }

    /// Add a minute rollup; minutes outside the range are ignored.
    pub(crate) fn add(&mut self, minute: u64, requests: u64, rejections: u64) {
        let step = minute / self.step;
        let Some(offset) = step.checked_sub(self.first_step) else {
            return;
        };
        if let Some(slot) = self.counts.get_mut(offset as usize) {
            slot.0 += requests;
            slot.1 += rejections;
        }
    }

    pub(crate) fn finish(self) -> Vec<TimePoint> {
        let step = self.step;
        let first_step = self.first_step;
        self.counts
            .into_iter()
            .enumerate()
            .map(|(i, (requests, rejections))| {
                let start_ms = (first_step + i as u64) * step * MINUTE_MS;
                TimePoint {
                    timestamp: DateTime::from_timestamp_millis(start_ms as i64).unwrap_or_default(),
                    requests,
                    rejections,
                }
            })
            .collect()
    }
}
