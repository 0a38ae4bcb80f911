//! Learning module for shiftgrade
//!
//! `PatternManager` learns hourly volume/staffing baselines through any
//! `PatternStore`. `TimeslotPatternManager` learns 15-minute fulfillment-time
//! baselines in memory for the grader.

use serde::{Deserialize, Serialize};

mod manager;
mod timeslot;

pub use manager::PatternManager;
pub use timeslot::{DayPatterns, TimeslotPatternManager};

use crate::patterns::Category;

/// One numeric observation for an hourly cell, as produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location: String,
    pub category: Category,
    pub hour: u8,
    pub day_of_week: u8,
    pub volume: f64,
    pub staffing: f64,
}

/// Result of learning a batch of observations
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LearningSummary {
    pub patterns_created: u32,
    pub patterns_updated: u32,
}
