//! Hourly pattern learning and retrieval
//!
//! Learning blends each daily observation into the stored baseline with an
//! EMA whose rate depends on how mature the pattern is. Retrieval only hands
//! out reliable patterns and falls back to a same-hour average across days.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::{LearningSummary, Observation};
use crate::config::LearningConfig;
use crate::error::{ConfigError, LearningError, StoreError, ValidationError};
use crate::patterns::{
    asymptotic_confidence, Category, Metadata, Pattern, DAYS_AVERAGED_KEY, FALLBACK_KEY,
};
use crate::storage::PatternStore;

/// Day-of-week stamped on synthesized fallback patterns
pub const FALLBACK_DAY: u8 = 0;

/// Learns and serves hourly patterns through a `PatternStore`
pub struct PatternManager<S: PatternStore> {
    store: S,
    config: LearningConfig,
}

impl<S: PatternStore> PatternManager<S> {
    /// Validates the configuration up front; a bad value is a construction error
    pub fn new(store: S, config: LearningConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Early rate below the threshold, mature rate at or above it
    pub fn learning_rate(&self, observations_before_update: u32) -> f64 {
        let rates = &self.config.learning_rates;
        if observations_before_update < rates.threshold {
            rates.early
        } else {
            rates.mature
        }
    }

    pub fn is_reliable(&self, pattern: &Pattern) -> bool {
        pattern.is_reliable(
            self.config.reliability.min_confidence,
            self.config.reliability.min_observations,
        )
    }

    /// Fold one observation into the pattern for its key
    ///
    /// Creates the pattern on first sight, otherwise replaces it with the
    /// EMA-updated value. Store errors are returned unchanged.
    pub fn learn(
        &mut self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
        observed_volume: f64,
        observed_staffing: f64,
    ) -> Result<Pattern, LearningError> {
        let ceiling = self.config.constraints.max_confidence;

        match self.store.get(location, category, hour, day_of_week)? {
            None => {
                let pattern = Pattern::create(
                    location,
                    category,
                    hour,
                    day_of_week,
                    observed_volume,
                    observed_staffing,
                    asymptotic_confidence(1, ceiling),
                    1,
                    None,
                )?;
                debug!("Created pattern {}", pattern.key());
                self.store.save(pattern.clone())?;
                Ok(pattern)
            }
            Some(existing) => {
                let rate = self.learning_rate(existing.observations());
                let updated = existing.with_updated_prediction(
                    observed_volume,
                    observed_staffing,
                    rate,
                    ceiling,
                )?;
                debug!(
                    "Updated pattern {}: volume {:.2} -> {:.2} (rate {}, {} observations)",
                    updated.key(),
                    existing.expected_volume(),
                    updated.expected_volume(),
                    rate,
                    updated.observations()
                );
                self.store.update(updated.clone())?;
                Ok(updated)
            }
        }
    }

    /// Learn observations in order, stopping at the first error
    pub fn learn_batch(
        &mut self,
        observations: &[Observation],
    ) -> Result<LearningSummary, LearningError> {
        let mut summary = LearningSummary::default();

        for obs in observations {
            let pattern = self.learn(
                &obs.location,
                obs.category,
                obs.hour,
                obs.day_of_week,
                obs.volume,
                obs.staffing,
            )?;
            if pattern.observations() == 1 {
                summary.patterns_created += 1;
            } else {
                summary.patterns_updated += 1;
            }
        }

        info!(
            "Learned {} observations: {} patterns created, {} updated",
            observations.len(),
            summary.patterns_created,
            summary.patterns_updated
        );
        Ok(summary)
    }

    /// Reliable pattern for the key, or the same-hour fallback
    ///
    /// The fallback gathers every reliable pattern for (location, category,
    /// hour) across all days. One match is returned as-is; several are
    /// averaged into an unpersisted pattern stamped with day 0 and flagged
    /// in metadata. `None` means the caller must use business standards.
    pub fn get(
        &self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
        use_fallback: bool,
    ) -> Result<Option<Pattern>, LearningError> {
        if let Some(exact) = self.store.get(location, category, hour, day_of_week)? {
            if self.is_reliable(&exact) {
                return Ok(Some(exact));
            }
            debug!(
                "Pattern {} not reliable yet (confidence {:.3}, {} observations)",
                exact.key(),
                exact.confidence(),
                exact.observations()
            );
        }

        if !use_fallback {
            return Ok(None);
        }

        let mut candidates: Vec<Pattern> = self
            .store
            .list(location, Some(category))?
            .into_iter()
            .filter(|p| p.hour() == hour && self.is_reliable(p))
            .collect();

        match candidates.len() {
            0 => {
                debug!("No reliable pattern for {}:{}:{} on any day", location, category, hour);
                Ok(None)
            }
            1 => Ok(candidates.pop()),
            _ => Ok(Some(self.average(location, category, hour, &candidates)?)),
        }
    }

    fn average(
        &self,
        location: &str,
        category: Category,
        hour: u8,
        patterns: &[Pattern],
    ) -> Result<Pattern, ValidationError> {
        let n = patterns.len() as f64;
        let volume = patterns.iter().map(Pattern::expected_volume).sum::<f64>() / n;
        let staffing = patterns.iter().map(Pattern::expected_staffing).sum::<f64>() / n;
        let confidence = patterns.iter().map(Pattern::confidence).sum::<f64>() / n;
        let observations = patterns
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.observations()));

        let mut days: Vec<u8> = patterns.iter().map(Pattern::day_of_week).collect();
        days.sort_unstable();

        let mut metadata = Metadata::new();
        metadata.insert(FALLBACK_KEY.into(), serde_json::json!(true));
        metadata.insert(DAYS_AVERAGED_KEY.into(), serde_json::json!(patterns.len()));
        metadata.insert("source_days".into(), serde_json::json!(days));

        debug!(
            "Fallback for {}:{}:{} averaged {} days",
            location,
            category,
            hour,
            patterns.len()
        );

        Pattern::create(
            location,
            category,
            hour,
            FALLBACK_DAY,
            volume,
            staffing,
            confidence,
            observations,
            Some(metadata),
        )
    }

    /// All stored patterns for a location
    pub fn list_patterns(
        &self,
        location: &str,
        category: Option<Category>,
    ) -> Result<Vec<Pattern>, StoreError> {
        self.store.list(location, category)
    }

    /// Delete every pattern for a location, returning how many were removed
    pub fn clear_location(&mut self, location: &str) -> Result<usize, StoreError> {
        let patterns = self.store.list(location, None)?;
        let mut removed = 0;

        for p in &patterns {
            if self.store.delete(p.location(), p.category(), p.hour(), p.day_of_week())? {
                removed += 1;
            }
        }

        info!("Cleared {} patterns for location {}", removed, location);
        Ok(removed)
    }

    /// Patterns not updated within `quality.max_age_days` of `now`
    pub fn stale_patterns(
        &self,
        location: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Pattern>, StoreError> {
        let cutoff = now - Duration::days(i64::from(self.config.quality.max_age_days));
        Ok(self
            .store
            .list(location, None)?
            .into_iter()
            .filter(|p| p.updated_at() < cutoff)
            .collect())
    }
}
