//! 15-minute service-time baselines
//!
//! A timeslot pattern tracks one signal (fulfillment time) per window with
//! a fixed-alpha EMA. Its confidence grows by a diminishing increment
//! rather than the asymptotic rule used by hourly patterns.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Category;
use crate::error::ValidationError;

/// EMA weight given to each new fulfillment time
pub const ALPHA: f64 = 0.2;
/// Confidence assigned to a window's first observation
pub const INITIAL_CONFIDENCE: f64 = 0.5;
/// Numerator of the diminishing confidence increment
pub const CONFIDENCE_STEP: f64 = 0.1;
pub const MIN_RELIABLE_CONFIDENCE: f64 = 0.6;
pub const MIN_RELIABLE_OBSERVATIONS: u32 = 4;

/// Window length in minutes
pub const WINDOW_MINUTES: u32 = 15;

/// Shift boundary: windows starting at or after 14:00 belong to the evening
const EVENING_START_HOUR: u32 = 14;

/// A 15-minute window aligned to the quarter hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeWindow {
    start: NaiveTime,
}

impl TimeWindow {
    /// The window that contains `time`
    pub fn containing(time: NaiveTime) -> Self {
        let minute = time.minute() - time.minute() % WINDOW_MINUTES;
        let start = NaiveTime::from_hms_opt(time.hour(), minute, 0).unwrap_or(time);
        Self { start }
    }

    /// Window starting at `hour:minute`; the minute must be a quarter hour
    pub fn starting_at(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        let label = || format!("{:02}:{:02}", hour, minute);
        if minute % WINDOW_MINUTES != 0 {
            return Err(ValidationError::new("time_window", label(), "not on a quarter hour"));
        }
        let start = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| ValidationError::new("time_window", label(), "not a time of day"))?;
        Ok(Self { start })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    /// Exclusive end; the last window of the day ends at 00:00
    pub fn end(&self) -> NaiveTime {
        self.start.overflowing_add_signed(Duration::minutes(i64::from(WINDOW_MINUTES))).0
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        Self::containing(time) == *self
    }

    /// `"HH:MM-HH:MM"`
    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end().format("%H:%M"))
    }

    pub fn shift(&self) -> Shift {
        Shift::for_window(self)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = ValidationError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        let start = label.split('-').next().unwrap_or_default();
        let time = NaiveTime::parse_from_str(start.trim(), "%H:%M")
            .map_err(|_| ValidationError::new("time_window", &label, "expected HH:MM-HH:MM"))?;
        let window = Self::starting_at(time.hour(), time.minute())?;
        if window.label() != label.trim() {
            return Err(ValidationError::new(
                "time_window",
                &label,
                "end must be 15 minutes after start",
            ));
        }
        Ok(window)
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.label()
    }
}

/// Shift a window belongs to; streak counters never cross shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shift {
    Morning,
    Evening,
}

impl Shift {
    pub fn for_window(window: &TimeWindow) -> Self {
        if window.start().hour() < EVENING_START_HOUR {
            Shift::Morning
        } else {
            Shift::Evening
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "Morning",
            Shift::Evening => "Evening",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a timeslot pattern
///
/// Only built through `new`, which keeps the shift in step with the window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeslotKey {
    location: String,
    weekday: Weekday,
    shift: Shift,
    window: TimeWindow,
    category: Category,
}

impl TimeslotKey {
    /// The shift is derived from the window
    pub fn new(
        location: impl Into<String>,
        weekday: Weekday,
        window: TimeWindow,
        category: Category,
    ) -> Self {
        Self {
            location: location.into(),
            weekday,
            shift: window.shift(),
            window,
            category,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn shift(&self) -> Shift {
        self.shift
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

impl fmt::Display for TimeslotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.location, self.weekday, self.shift, self.window, self.category
        )
    }
}

/// Learned fulfillment-time baseline for one window and category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeslotPattern {
    key: TimeslotKey,
    baseline_time: f64,
    variance: f64,
    confidence: f64,
    observations_count: u32,
    last_updated: DateTime<Utc>,
}

impl TimeslotPattern {
    /// Pattern seeded from a window's first observation
    pub fn first(key: TimeslotKey, fulfillment_time: f64) -> Result<Self, ValidationError> {
        check_time(fulfillment_time)?;
        if key.location().trim().is_empty() {
            return Err(ValidationError::new("location", key.location(), "must not be empty"));
        }
        Ok(Self {
            key,
            baseline_time: fulfillment_time,
            variance: 0.0,
            confidence: INITIAL_CONFIDENCE,
            observations_count: 1,
            last_updated: Utc::now(),
        })
    }

    /// New pattern with `fulfillment_time` blended in
    ///
    /// The variance tracks the absolute deviation from the updated baseline,
    /// and confidence grows by `0.1 / (1 + observations_before)`, capped at 1.
    pub fn with_observation(&self, fulfillment_time: f64) -> Result<Self, ValidationError> {
        check_time(fulfillment_time)?;

        let baseline_time = (1.0 - ALPHA) * self.baseline_time + ALPHA * fulfillment_time;
        let deviation = (fulfillment_time - baseline_time).abs();
        let variance = (1.0 - ALPHA) * self.variance + ALPHA * deviation;
        let step = CONFIDENCE_STEP / (1.0 + f64::from(self.observations_count));

        Ok(Self {
            key: self.key.clone(),
            baseline_time,
            variance,
            confidence: (self.confidence + step).min(1.0),
            observations_count: self.observations_count.saturating_add(1),
            last_updated: Utc::now(),
        })
    }

    pub fn is_reliable(&self) -> bool {
        self.confidence >= MIN_RELIABLE_CONFIDENCE
            && self.observations_count >= MIN_RELIABLE_OBSERVATIONS
    }

    /// Threshold for the historical assessment: baseline plus variance
    pub fn historical_target(&self) -> f64 {
        self.baseline_time + self.variance
    }

    pub fn key(&self) -> &TimeslotKey {
        &self.key
    }

    pub fn baseline_time(&self) -> f64 {
        self.baseline_time
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn observations_count(&self) -> u32 {
        self.observations_count
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

fn check_time(value: f64) -> Result<(), ValidationError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("fulfillment_time", value, "must be a non-negative number"))
    }
}
