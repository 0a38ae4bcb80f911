//! Dual assessment of service windows

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::verdict::{CategoryGrade, Failure, ShiftGrade, Streak, WindowGrade};
use super::{ServiceObservation, StreakTracker, WindowObservations};
use crate::config::GradingConfig;
use crate::error::ConfigError;
use crate::learning::DayPatterns;
use crate::patterns::{Category, Shift, TimeslotPattern};

/// Grades windows against business standards and learned baselines
///
/// Grading is pure: the same inputs always give the same verdict.
#[derive(Debug, Clone, Default)]
pub struct Grader {
    config: GradingConfig,
}

impl Grader {
    pub fn new(config: GradingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grade one window
    ///
    /// `patterns` holds the window's timeslot pattern per category, if any.
    /// Unreliable patterns are ignored. Streak counters on the result are
    /// zero; `grade_shift` fills them in.
    pub fn grade(
        &self,
        window: &WindowObservations,
        patterns: Option<&BTreeMap<Category, TimeslotPattern>>,
    ) -> WindowGrade {
        if window.is_empty() {
            return WindowGrade::empty(window.window);
        }

        let mut by_category: BTreeMap<Category, Vec<&ServiceObservation>> = BTreeMap::new();
        for obs in &window.observations {
            if !window.window.contains(obs.timestamp.time()) {
                warn!(
                    "Observation {} at {} filed under window {}",
                    obs.id,
                    obs.timestamp.time(),
                    window.window
                );
            }
            by_category.entry(obs.category).or_default().push(obs);
        }

        let mut categories = BTreeMap::new();
        let mut failures = Vec::new();
        let mut standard_failures = 0;
        let mut historical_failures = 0;
        let mut historical_checked = 0;

        for (category, observations) in by_category {
            let standard_target = self.config.standards.target_for(category);
            let pattern = patterns
                .and_then(|by_cat| by_cat.get(&category))
                .filter(|p| p.is_reliable());
            let historical_target = pattern.map(TimeslotPattern::historical_target);

            let mut failed_standard = 0;
            let mut failed_historical = 0;

            for obs in &observations {
                let over_standard = obs.fulfillment_time > standard_target;
                let over_historical = historical_target.map_or(false, |t| obs.fulfillment_time > t);

                if over_standard {
                    failed_standard += 1;
                }
                if over_historical {
                    failed_historical += 1;
                }
                if over_standard || over_historical {
                    failures.push(Failure {
                        id: obs.id.clone(),
                        category,
                        timestamp: obs.timestamp,
                        observed: obs.fulfillment_time,
                        failed_standard: over_standard,
                        failed_historical: over_historical,
                        standard_target,
                        historical_target,
                        pattern_confidence: pattern.map(TimeslotPattern::confidence),
                        is_first: false,
                    });
                }
            }

            let total = observations.len();
            standard_failures += failed_standard;
            historical_failures += failed_historical;
            if pattern.is_some() {
                historical_checked += total;
            }

            categories.insert(
                category,
                CategoryGrade {
                    total,
                    failed_standard,
                    failed_historical,
                    success_rate_standard: pass_rate(total, failed_standard),
                    success_rate_historical: pattern.map(|_| pass_rate(total, failed_historical)),
                    standard_target,
                    historical_target,
                    historical_baseline: pattern.map(TimeslotPattern::baseline_time),
                    historical_variance: pattern.map(TimeslotPattern::variance),
                    pattern_confidence: pattern.map(TimeslotPattern::confidence),
                },
            );
        }

        failures.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        if let Some(first) = failures.first_mut() {
            first.is_first = true;
        }

        let total = window.observations.len();
        let standards_pass_rate = pass_rate(total, standard_failures);
        let historical_pass_rate = if historical_checked > 0 {
            Some(pass_rate(historical_checked, historical_failures))
        } else {
            None
        };

        let grade = WindowGrade {
            window: window.window,
            shift: window.window.shift(),
            total,
            passed_standards: standard_failures == 0,
            passed_historical: historical_failures == 0,
            standards_pass_rate: Some(standards_pass_rate),
            historical_pass_rate,
            categories,
            failures,
            streak: self.classify(standards_pass_rate),
            consecutive_passes: 0,
            consecutive_fails: 0,
        };

        debug!(
            "Window {}: {} observations, standards {} ({:.1}%), historical {}, {} failures",
            grade.window,
            total,
            if grade.passed_standards { "pass" } else { "fail" },
            standards_pass_rate * 100.0,
            if grade.passed_historical { "pass" } else { "fail" },
            grade.failures.len()
        );

        grade
    }

    /// Hot at or above the hot threshold, cold below the cold threshold
    pub fn classify(&self, standards_pass_rate: f64) -> Option<Streak> {
        if standards_pass_rate >= self.config.hot_threshold {
            Some(Streak::Hot)
        } else if standards_pass_rate < self.config.cold_threshold {
            Some(Streak::Cold)
        } else {
            None
        }
    }

    /// Grade the windows of one shift in start order with fresh counters
    ///
    /// Windows belonging to other shifts are skipped.
    pub fn grade_shift(
        &self,
        shift: Shift,
        windows: &[WindowObservations],
        day: &DayPatterns,
    ) -> ShiftGrade {
        let mut ordered: Vec<&WindowObservations> = windows
            .iter()
            .filter(|w| w.window.shift() == shift)
            .collect();
        ordered.sort_by_key(|w| w.window);

        let mut tracker = StreakTracker::new();
        let graded = ordered
            .into_iter()
            .map(|w| {
                let mut grade = self.grade(w, day.get(&w.window));
                tracker.apply(&mut grade);
                grade
            })
            .collect();

        let result = ShiftGrade::from_windows(shift, graded);
        info!(
            "{} shift: {}/{} windows passed, {} hot, {} cold",
            shift,
            result.passed_windows,
            result.graded_windows,
            result.hot_windows,
            result.cold_windows
        );
        result
    }

    /// Grade a full day, one `ShiftGrade` per shift that has windows
    pub fn grade_day(&self, windows: &[WindowObservations], day: &DayPatterns) -> Vec<ShiftGrade> {
        [Shift::Morning, Shift::Evening]
            .into_iter()
            .filter(|shift| windows.iter().any(|w| w.window.shift() == *shift))
            .map(|shift| self.grade_shift(shift, windows, day))
            .collect()
    }
}

fn pass_rate(total: usize, failed: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (total - failed) as f64 / total as f64
    }
}
