//! Configuration for learning and grading
//!
//! The learning bundle has four required groups. None of them carry serde
//! defaults, so a `config.toml` missing any group or key fails to load.
//! The grading table is optional and falls back to the business standards.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::ConfigError;
use crate::patterns::Category;

/// Learning rates for the EMA update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LearningRates {
    /// Rate applied while a pattern has fewer than `threshold` observations
    pub early: f64,
    /// Rate applied once a pattern is mature
    pub mature: f64,
    /// Observation count at which the mature rate takes over
    pub threshold: u32,
}

/// Minimums a pattern must clear before it is trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReliabilityThresholds {
    pub min_confidence: f64,
    pub min_observations: u32,
}

/// Quality thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityThresholds {
    /// Reserved for confidence-gated updates; validated but not yet applied
    pub update_confidence: f64,
    /// Patterns not updated within this many days are reported as stale
    pub max_age_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    pub min_variance: f64,
    /// Ceiling applied to the asymptotic confidence formula
    pub max_confidence: f64,
}

/// Policy values consumed by `PatternManager`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    pub learning_rates: LearningRates,
    pub reliability: ReliabilityThresholds,
    pub quality: QualityThresholds,
    pub constraints: Constraints,
}

impl LearningConfig {
    /// Reference values written by `shiftgrade init`
    pub fn recommended() -> Self {
        Self {
            learning_rates: LearningRates {
                early: 0.3,
                mature: 0.2,
                threshold: 5,
            },
            reliability: ReliabilityThresholds {
                min_confidence: 0.6,
                min_observations: 3,
            },
            quality: QualityThresholds {
                update_confidence: 0.7,
                max_age_days: 90,
            },
            constraints: Constraints {
                min_variance: 0.1,
                max_confidence: 0.95,
            },
        }
    }

    /// Check every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("learning_rates.early", self.learning_rates.early)?;
        check_rate("learning_rates.mature", self.learning_rates.mature)?;
        check_unit("reliability.min_confidence", self.reliability.min_confidence)?;
        check_unit("quality.update_confidence", self.quality.update_confidence)?;
        check_rate("constraints.max_confidence", self.constraints.max_confidence)?;

        if self.reliability.min_confidence > self.constraints.max_confidence {
            return Err(invalid(
                "reliability.min_confidence",
                format!(
                    "{} exceeds constraints.max_confidence {}, so no pattern could become reliable",
                    self.reliability.min_confidence, self.constraints.max_confidence
                ),
            ));
        }
        if self.quality.max_age_days == 0 {
            return Err(invalid("quality.max_age_days", "must be at least 1 day"));
        }
        if !(self.constraints.min_variance >= 0.0) || !self.constraints.min_variance.is_finite() {
            return Err(invalid(
                "constraints.min_variance",
                format!("{} is not a non-negative number", self.constraints.min_variance),
            ));
        }

        Ok(())
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: LearningConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Fixed business standard per category, in minutes of fulfillment time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardTargets {
    #[serde(rename = "Lobby")]
    pub lobby: f64,
    #[serde(rename = "Drive-Thru")]
    pub drive_thru: f64,
    #[serde(rename = "ToGo")]
    pub to_go: f64,
}

impl StandardTargets {
    pub fn target_for(&self, category: Category) -> f64 {
        match category {
            Category::Lobby => self.lobby,
            Category::DriveThru => self.drive_thru,
            Category::ToGo => self.to_go,
        }
    }
}

impl Default for StandardTargets {
    fn default() -> Self {
        Self {
            lobby: 15.0,
            drive_thru: 8.0,
            to_go: 10.0,
        }
    }
}

/// Grader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub standards: StandardTargets,
    /// Windows with a standards pass rate at or above this are "hot"
    pub hot_threshold: f64,
    /// Windows with a standards pass rate below this are "cold"
    pub cold_threshold: f64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            standards: StandardTargets::default(),
            hot_threshold: 0.85,
            cold_threshold: 0.70,
        }
    }
}

impl GradingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("grading.hot_threshold", self.hot_threshold)?;
        check_unit("grading.cold_threshold", self.cold_threshold)?;
        if self.cold_threshold > self.hot_threshold {
            return Err(invalid(
                "grading.cold_threshold",
                "must not exceed grading.hot_threshold",
            ));
        }
        for category in Category::ALL {
            let target = self.standards.target_for(category);
            if !(target > 0.0) || !target.is_finite() {
                return Err(invalid(
                    "grading.standards",
                    format!("{} target {} must be positive", category, target),
                ));
            }
        }
        Ok(())
    }
}

/// The on-disk `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub grading: GradingConfig,
}

impl AppConfig {
    pub fn recommended() -> Self {
        Self {
            learning: LearningConfig::recommended(),
            grading: GradingConfig::default(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.learning.validate()?;
        config.grading.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Learning rates and ceilings: (0, 1]
fn check_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside (0, 1]", value)))
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside [0, 1]", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [learning_rates]
        early = 0.3
        mature = 0.2
        threshold = 5

        [reliability]
        min_confidence = 0.6
        min_observations = 3

        [quality]
        update_confidence = 0.7
        max_age_days = 90

        [constraints]
        min_variance = 0.1
        max_confidence = 0.95
    "#;

    #[test]
    fn test_full_config_parses() {
        let config = LearningConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config, LearningConfig::recommended());
    }

    #[test]
    fn test_missing_group_fails() {
        let quality = "[quality]\n        update_confidence = 0.7\n        max_age_days = 90\n";
        let text = FULL.replace(quality, "");
        let err = LearningConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_missing_key_fails() {
        let text = FULL.replace("mature = 0.2", "");
        let err = LearningConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("mature"));
    }

    #[test]
    fn test_out_of_range_rate_rejected() {
        let mut config = LearningConfig::recommended();
        config.learning_rates.early = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "learning_rates.early", .. }));

        let mut config = LearningConfig::recommended();
        config.constraints.max_confidence = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_confidence_above_ceiling_rejected() {
        let mut config = LearningConfig::recommended();
        config.reliability.min_confidence = 0.96;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "reliability.min_confidence", .. }));

        // Equal to the ceiling is still reachable
        config.reliability.min_confidence = config.constraints.max_confidence;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_roundtrip_and_grading_defaults() {
        let config = AppConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.grading, GradingConfig::default());
        assert_eq!(config.grading.standards.target_for(Category::DriveThru), 8.0);

        let text = toml::to_string_pretty(&AppConfig::recommended()).unwrap();
        let parsed = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, AppConfig::recommended());
    }

    #[test]
    fn test_grading_thresholds_must_be_ordered() {
        let grading = GradingConfig {
            hot_threshold: 0.6,
            cold_threshold: 0.7,
            ..GradingConfig::default()
        };
        assert!(grading.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::recommended().save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::recommended());
    }
}
