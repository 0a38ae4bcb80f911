//! In-memory learning of 15-minute service-time baselines

use chrono::{Datelike, Weekday};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::grading::ServiceObservation;
use crate::patterns::{Category, TimeWindow, TimeslotKey, TimeslotPattern};

/// A day's patterns grouped by window, then category
pub type DayPatterns = BTreeMap<TimeWindow, BTreeMap<Category, TimeslotPattern>>;

/// Learns timeslot patterns keyed by (location, weekday, shift, window, category)
///
/// Lookups are by exact key only. Not synchronized.
#[derive(Debug, Default)]
pub struct TimeslotPatternManager {
    patterns: HashMap<TimeslotKey, TimeslotPattern>,
}

impl TimeslotPatternManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fulfillment time into the pattern for its window
    pub fn learn(
        &mut self,
        location: &str,
        weekday: Weekday,
        category: Category,
        window: TimeWindow,
        fulfillment_time: f64,
    ) -> Result<TimeslotPattern, ValidationError> {
        let key = TimeslotKey::new(location, weekday, window, category);

        let pattern = match self.patterns.get(&key) {
            Some(existing) => existing.with_observation(fulfillment_time)?,
            None => TimeslotPattern::first(key.clone(), fulfillment_time)?,
        };

        debug!(
            "Timeslot {}: baseline {:.2}, variance {:.2}, confidence {:.3} ({} observations)",
            key,
            pattern.baseline_time(),
            pattern.variance(),
            pattern.confidence(),
            pattern.observations_count()
        );

        self.patterns.insert(key, pattern.clone());
        Ok(pattern)
    }

    /// Learn from a timestamped service observation
    pub fn learn_service(
        &mut self,
        location: &str,
        observation: &ServiceObservation,
    ) -> Result<TimeslotPattern, ValidationError> {
        self.learn(
            location,
            observation.timestamp.weekday(),
            observation.category,
            TimeWindow::containing(observation.timestamp.time()),
            observation.fulfillment_time,
        )
    }

    /// Learn a history of observations, returning how many were folded in
    pub fn learn_history(
        &mut self,
        location: &str,
        observations: &[ServiceObservation],
    ) -> Result<usize, ValidationError> {
        for obs in observations {
            self.learn_service(location, obs)?;
        }
        info!("Learned {} service observations for {}", observations.len(), location);
        Ok(observations.len())
    }

    pub fn get(&self, key: &TimeslotKey) -> Option<&TimeslotPattern> {
        self.patterns.get(key)
    }

    /// Every pattern for one location and weekday, grouped for the grader
    pub fn get_patterns_for_day(&self, location: &str, weekday: Weekday) -> DayPatterns {
        let mut day = DayPatterns::new();
        for (key, pattern) in &self.patterns {
            if key.location() == location && key.weekday() == weekday {
                day.entry(key.window())
                    .or_default()
                    .insert(key.category(), pattern.clone());
            }
        }
        day
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn window(h: u32, m: u32) -> TimeWindow {
        TimeWindow::starting_at(h, m).unwrap()
    }

    #[test]
    fn test_learn_creates_then_updates() {
        let mut m = TimeslotPatternManager::new();
        let p = m.learn("S001", Weekday::Mon, Category::Lobby, window(12, 0), 10.0).unwrap();
        assert_eq!(p.observations_count(), 1);

        let p = m.learn("S001", Weekday::Mon, Category::Lobby, window(12, 0), 5.0).unwrap();
        assert_eq!(p.observations_count(), 2);
        assert!((p.baseline_time() - 9.0).abs() < 1e-12);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_exact_key_lookup_only() {
        let mut m = TimeslotPatternManager::new();
        m.learn("S001", Weekday::Mon, Category::Lobby, window(12, 0), 10.0).unwrap();

        let hit = TimeslotKey::new("S001", Weekday::Mon, window(12, 0), Category::Lobby);
        let other_day = TimeslotKey::new("S001", Weekday::Tue, window(12, 0), Category::Lobby);
        let other_window = TimeslotKey::new("S001", Weekday::Mon, window(12, 15), Category::Lobby);

        assert!(m.get(&hit).is_some());
        assert!(m.get(&other_day).is_none());
        assert!(m.get(&other_window).is_none());
    }

    #[test]
    fn test_day_lookup_groups_by_window() {
        let mut m = TimeslotPatternManager::new();
        m.learn("S001", Weekday::Sat, Category::Lobby, window(11, 0), 10.0).unwrap();
        m.learn("S001", Weekday::Sat, Category::DriveThru, window(11, 0), 6.0).unwrap();
        m.learn("S001", Weekday::Sat, Category::ToGo, window(18, 30), 8.0).unwrap();
        m.learn("S001", Weekday::Sun, Category::Lobby, window(11, 0), 10.0).unwrap();
        m.learn("S002", Weekday::Sat, Category::Lobby, window(11, 0), 10.0).unwrap();

        let day = m.get_patterns_for_day("S001", Weekday::Sat);
        assert_eq!(day.len(), 2);
        assert_eq!(day[&window(11, 0)].len(), 2);
        assert!(day[&window(18, 30)].contains_key(&Category::ToGo));
        assert!(m.get_patterns_for_day("S003", Weekday::Sat).is_empty());
    }

    #[test]
    fn test_learn_service_uses_timestamp() {
        let mut m = TimeslotPatternManager::new();
        // 2024-03-01 was a Friday
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(17, 38, 12).unwrap());
        let obs = ServiceObservation {
            id: "T-1".into(),
            category: Category::DriveThru,
            timestamp: ts,
            fulfillment_time: 4.5,
        };
        m.learn_history("S001", &[obs]).unwrap();

        let key = TimeslotKey::new("S001", Weekday::Fri, window(17, 30), Category::DriveThru);
        let p = m.get(&key).unwrap();
        assert_eq!(p.baseline_time(), 4.5);
        assert_eq!(p.key().shift(), crate::patterns::Shift::Evening);
    }

    #[test]
    fn test_invalid_time_leaves_state_untouched() {
        let mut m = TimeslotPatternManager::new();
        assert!(m.learn("S001", Weekday::Mon, Category::Lobby, window(9, 0), -2.0).is_err());
        assert!(m.is_empty());
    }
}
