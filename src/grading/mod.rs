//! Strict service-speed grading
//!
//! Each 15-minute window is assessed twice: against fixed business
//! standards and, where a reliable timeslot pattern exists, against the
//! learned baseline plus variance. One failing observation fails the whole
//! window. Hot/cold streaks are tracked across a shift's windows.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod grader;
mod streak;
mod verdict;

pub use grader::Grader;
pub use streak::StreakTracker;
pub use verdict::{CategoryGrade, Failure, ShiftGrade, Streak, WindowGrade};

use crate::error::ValidationError;
use crate::patterns::{Category, TimeWindow};

/// One completed order with its fulfillment time in minutes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceObservation {
    pub id: String,
    pub category: Category,
    pub timestamp: NaiveDateTime,
    pub fulfillment_time: f64,
}

/// The observations that fall in one window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowObservations {
    pub window: TimeWindow,
    pub observations: Vec<ServiceObservation>,
}

impl WindowObservations {
    pub fn new(window: TimeWindow, observations: Vec<ServiceObservation>) -> Self {
        Self { window, observations }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// The single service date of `observations`, which must fall on `weekday`
///
/// Windows are keyed by time of day only, so a mixed-date or wrong-weekday
/// set would grade against the wrong patterns. `None` for an empty slice.
pub fn service_date(
    observations: &[ServiceObservation],
    weekday: Weekday,
) -> Result<Option<NaiveDate>, ValidationError> {
    let mut dates = observations.iter().map(|obs| (obs.id.as_str(), obs.timestamp.date()));
    let Some((_, date)) = dates.next() else {
        return Ok(None);
    };

    if date.weekday() != weekday {
        return Err(ValidationError::new(
            "weekday",
            weekday,
            format!("service date {} is a {}", date, date.weekday()),
        ));
    }
    if let Some((id, other)) = dates.find(|(_, d)| *d != date) {
        return Err(ValidationError::new(
            "timestamp",
            other,
            format!("observation {} is not on the service date {}", id, date),
        ));
    }
    Ok(Some(date))
}

/// Bucket one day's observations into windows ordered by start time
///
/// Only the time of day is used; check the set with `service_date` first.
pub fn group_into_windows(observations: &[ServiceObservation]) -> Vec<WindowObservations> {
    let mut buckets: BTreeMap<TimeWindow, Vec<ServiceObservation>> = BTreeMap::new();
    for obs in observations {
        buckets
            .entry(TimeWindow::containing(obs.timestamp.time()))
            .or_default()
            .push(obs.clone());
    }

    buckets
        .into_iter()
        .map(|(window, mut observations)| {
            observations
                .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
            WindowObservations::new(window, observations)
        })
        .collect()
}
