//! Grading verdicts
//!
//! Verdicts are derived values owned by the caller. They serialize to the
//! flat per-category record the reporting stage consumes.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::patterns::{Category, Shift, TimeWindow};

/// Window classification by standards pass rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Streak {
    Hot,
    Cold,
}

impl Streak {
    pub fn as_str(&self) -> &'static str {
        match self {
            Streak::Hot => "hot",
            Streak::Cold => "cold",
        }
    }
}

/// Per-category outcome within one window
///
/// Historical fields are `None` when the category had no reliable pattern
/// and the historical check was skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGrade {
    pub total: usize,
    pub failed_standard: usize,
    pub failed_historical: usize,
    pub success_rate_standard: f64,
    pub success_rate_historical: Option<f64>,
    pub standard_target: f64,
    pub historical_target: Option<f64>,
    pub historical_baseline: Option<f64>,
    pub historical_variance: Option<f64>,
    pub pattern_confidence: Option<f64>,
}

/// One observation that missed at least one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub id: String,
    pub category: Category,
    pub timestamp: NaiveDateTime,
    pub observed: f64,
    pub failed_standard: bool,
    pub failed_historical: bool,
    pub standard_target: f64,
    pub historical_target: Option<f64>,
    pub pattern_confidence: Option<f64>,
    /// Chronologically first failure in its window
    pub is_first: bool,
}

/// Verdict for one 15-minute window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowGrade {
    pub window: TimeWindow,
    pub shift: Shift,
    pub total: usize,
    pub passed_standards: bool,
    pub passed_historical: bool,
    /// `None` for an empty window
    pub standards_pass_rate: Option<f64>,
    /// `None` when no category had a reliable pattern
    pub historical_pass_rate: Option<f64>,
    pub categories: BTreeMap<Category, CategoryGrade>,
    pub failures: Vec<Failure>,
    pub streak: Option<Streak>,
    pub consecutive_passes: u32,
    pub consecutive_fails: u32,
}

impl WindowGrade {
    /// Empty windows pass both assessments
    pub fn empty(window: TimeWindow) -> Self {
        Self {
            window,
            shift: window.shift(),
            total: 0,
            passed_standards: true,
            passed_historical: true,
            standards_pass_rate: None,
            historical_pass_rate: None,
            categories: BTreeMap::new(),
            failures: Vec::new(),
            streak: None,
            consecutive_passes: 0,
            consecutive_fails: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Both assessments passed
    pub fn passed(&self) -> bool {
        self.passed_standards && self.passed_historical
    }

    pub fn first_failure(&self) -> Option<&Failure> {
        self.failures.iter().find(|f| f.is_first)
    }
}

/// Windows of one shift graded in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftGrade {
    pub shift: Shift,
    pub windows: Vec<WindowGrade>,
    pub graded_windows: usize,
    pub passed_windows: usize,
    pub hot_windows: usize,
    pub cold_windows: usize,
}

impl ShiftGrade {
    pub fn from_windows(shift: Shift, windows: Vec<WindowGrade>) -> Self {
        let graded: Vec<&WindowGrade> = windows.iter().filter(|w| !w.is_empty()).collect();
        let passed_windows = graded.iter().filter(|w| w.passed()).count();
        let hot_windows = graded.iter().filter(|w| w.streak == Some(Streak::Hot)).count();
        let cold_windows = graded.iter().filter(|w| w.streak == Some(Streak::Cold)).count();
        let graded_windows = graded.len();

        Self {
            shift,
            windows,
            graded_windows,
            passed_windows,
            hot_windows,
            cold_windows,
        }
    }
}
