//! Hourly volume/staffing baseline and its EMA update

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::Category;
use crate::error::ValidationError;

/// Free-form annotations carried with a pattern
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key set on patterns synthesized by the fallback chain
pub const FALLBACK_KEY: &str = "fallback";
/// Metadata key holding how many days a fallback pattern averaged
pub const DAYS_AVERAGED_KEY: &str = "days_averaged";

/// Confidence after `observations` samples, capped at `ceiling`
///
/// `1 - 1/(n + 1)` approaches but never reaches 1.0.
pub fn asymptotic_confidence(observations: u32, ceiling: f64) -> f64 {
    let raw = 1.0 - 1.0 / (f64::from(observations) + 1.0);
    raw.min(ceiling)
}

/// A learned baseline for one (location, category, hour, day-of-week) key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    location: String,
    category: Category,
    hour: u8,
    day_of_week: u8,
    expected_volume: f64,
    expected_staffing: f64,
    confidence: f64,
    observations: u32,
    metadata: Metadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Pattern {
    /// Build a validated pattern stamped with the current time
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        location: impl Into<String>,
        category: Category,
        hour: u8,
        day_of_week: u8,
        expected_volume: f64,
        expected_staffing: f64,
        confidence: f64,
        observations: u32,
        metadata: Option<Metadata>,
    ) -> Result<Self, ValidationError> {
        let location = location.into();
        if location.trim().is_empty() {
            return Err(ValidationError::new("location", &location, "must not be empty"));
        }
        if hour > 23 {
            return Err(ValidationError::new("hour", hour, "must be in 0..=23"));
        }
        if day_of_week > 6 {
            return Err(ValidationError::new("day_of_week", day_of_week, "must be in 0..=6"));
        }
        check_non_negative("expected_volume", expected_volume)?;
        check_non_negative("expected_staffing", expected_staffing)?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::new("confidence", confidence, "must be in [0, 1]"));
        }

        let now = Utc::now();
        Ok(Self {
            location,
            category,
            hour,
            day_of_week,
            expected_volume,
            expected_staffing,
            confidence,
            observations,
            metadata: metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the timestamps, used when loading a stored pattern
    pub fn with_timestamps(self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            updated_at,
            ..self
        }
    }

    /// Composite key `"{location}:{category}:{hour}:{day_of_week}"`
    pub fn key(&self) -> String {
        Self::key_for(&self.location, self.category, self.hour, self.day_of_week)
    }

    pub fn key_for(location: &str, category: Category, hour: u8, day_of_week: u8) -> String {
        format!("{}:{}:{}:{}", location, category, hour, day_of_week)
    }

    /// Blend a new observation into a fresh pattern
    ///
    /// `x' = (1 - rate) * x + rate * new` for volume and staffing. The
    /// observation count grows by one and confidence follows the asymptotic
    /// rule capped at `max_confidence`. Identity and `created_at` carry over.
    pub fn with_updated_prediction(
        &self,
        new_volume: f64,
        new_staffing: f64,
        learning_rate: f64,
        max_confidence: f64,
    ) -> Result<Self, ValidationError> {
        check_non_negative("new_volume", new_volume)?;
        check_non_negative("new_staffing", new_staffing)?;
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(ValidationError::new("learning_rate", learning_rate, "must be in (0, 1]"));
        }

        let observations = self.observations.saturating_add(1);
        Ok(Self {
            location: self.location.clone(),
            category: self.category,
            hour: self.hour,
            day_of_week: self.day_of_week,
            expected_volume: ema(self.expected_volume, new_volume, learning_rate),
            expected_staffing: ema(self.expected_staffing, new_staffing, learning_rate),
            confidence: asymptotic_confidence(observations, max_confidence),
            observations,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: Utc::now(),
        })
    }

    /// True iff both confidence and observation count clear the minimums
    pub fn is_reliable(&self, min_confidence: f64, min_observations: u32) -> bool {
        self.confidence >= min_confidence && self.observations >= min_observations
    }

    /// True for patterns synthesized by the fallback chain
    pub fn is_fallback(&self) -> bool {
        self.metadata
            .get(FALLBACK_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn expected_volume(&self) -> f64 {
        self.expected_volume
    }

    pub fn expected_staffing(&self) -> f64 {
        self.expected_staffing
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn observations(&self) -> u32 {
        self.observations
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn ema(old: f64, new: f64, rate: f64) -> f64 {
    (1.0 - rate) * old + rate * new
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, value, "must be a non-negative number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(volume: f64, staffing: f64, observations: u32) -> Pattern {
        Pattern::create(
            "S001",
            Category::Lobby,
            11,
            2,
            volume,
            staffing,
            asymptotic_confidence(observations, 0.95),
            observations,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_key_format() {
        let p = pattern(10.0, 1.0, 1);
        assert_eq!(p.key(), "S001:Lobby:11:2");
        assert_eq!(Pattern::key_for("S9", Category::DriveThru, 0, 6), "S9:Drive-Thru:0:6");
    }

    #[test]
    fn test_create_rejects_bad_fields() {
        let field = |hour, day, volume, staffing, confidence| {
            let lobby = Category::Lobby;
            Pattern::create("S001", lobby, hour, day, volume, staffing, confidence, 1, None)
                .unwrap_err()
                .field
        };
        assert_eq!(field(24, 0, 1.0, 1.0, 0.5), "hour");
        assert_eq!(field(0, 7, 1.0, 1.0, 0.5), "day_of_week");
        assert_eq!(field(0, 0, -1.0, 1.0, 0.5), "expected_volume");
        assert_eq!(field(0, 0, 1.0, f64::NAN, 0.5), "expected_staffing");
        assert_eq!(field(0, 0, 1.0, 1.0, 1.2), "confidence");

        let err = Pattern::create(" ", Category::Lobby, 0, 0, 1.0, 1.0, 0.5, 1, None).unwrap_err();
        assert_eq!(err.field, "location");
    }

    #[test]
    fn test_updated_prediction_blends() {
        let old = pattern(80.0, 3.0, 100);
        let new = old.with_updated_prediction(100.0, 4.0, 0.3, 0.95).unwrap();

        assert!((new.expected_volume() - 86.0).abs() < 1e-9);
        assert!((new.expected_staffing() - 3.3).abs() < 1e-9);
        assert_eq!(new.observations(), 101);
        assert_eq!(new.key(), old.key());
        assert_eq!(new.created_at(), old.created_at());
        assert!(new.updated_at() >= old.updated_at());

        // Receiver untouched
        assert_eq!(old.expected_volume(), 80.0);
        assert_eq!(old.observations(), 100);
    }

    #[test]
    fn test_updated_prediction_rejects_bad_rate() {
        let old = pattern(80.0, 3.0, 1);
        assert!(old.with_updated_prediction(1.0, 1.0, 0.0, 0.95).is_err());
        assert!(old.with_updated_prediction(1.0, 1.0, 1.5, 0.95).is_err());
        assert!(old.with_updated_prediction(-1.0, 1.0, 0.3, 0.95).is_err());
    }

    #[test]
    fn test_confidence_is_asymptotic_and_capped() {
        assert_eq!(asymptotic_confidence(0, 0.95), 0.0);
        assert_eq!(asymptotic_confidence(1, 0.95), 0.5);
        assert!((asymptotic_confidence(3, 0.95) - 0.75).abs() < 1e-12);
        assert_eq!(asymptotic_confidence(1000, 0.95), 0.95);

        let mut previous = 0.0;
        for n in 0..200 {
            let c = asymptotic_confidence(n, 0.95);
            assert!(c >= previous);
            assert!(c <= 0.95);
            previous = c;
        }
    }

    #[test]
    fn test_is_reliable_needs_both_thresholds() {
        let p = pattern(10.0, 1.0, 2); // confidence 0.667
        assert!(p.is_reliable(0.6, 2));
        assert!(!p.is_reliable(0.6, 3));
        assert!(!p.is_reliable(0.7, 2));
    }

    #[test]
    fn test_fallback_flag_read_from_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert(FALLBACK_KEY.into(), serde_json::json!(true));
        let p = Pattern::create("S001", Category::ToGo, 9, 0, 1.0, 1.0, 0.5, 1, Some(metadata))
            .unwrap();
        assert!(p.is_fallback());
        assert!(!pattern(1.0, 1.0, 1).is_fallback());
    }
}
