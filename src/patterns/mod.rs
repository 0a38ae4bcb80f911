//! Learned baselines
//!
//! `Pattern` holds expected volume/staffing for one
//! (location, category, hour, day-of-week) cell. `TimeslotPattern` holds an
//! expected fulfillment time for one 15-minute window. Both are immutable:
//! learning always produces a new value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

mod pattern;
mod timeslot;

pub use pattern::{asymptotic_confidence, Metadata, Pattern, DAYS_AVERAGED_KEY, FALLBACK_KEY};
pub use timeslot::{
    Shift, TimeWindow, TimeslotKey, TimeslotPattern, MIN_RELIABLE_CONFIDENCE,
    MIN_RELIABLE_OBSERVATIONS,
};

/// Service type an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Lobby")]
    Lobby,
    #[serde(rename = "Drive-Thru")]
    DriveThru,
    #[serde(rename = "ToGo")]
    ToGo,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Lobby, Category::DriveThru, Category::ToGo];

    /// Canonical label, also used in storage keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lobby => "Lobby",
            Category::DriveThru => "Drive-Thru",
            Category::ToGo => "ToGo",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Accepts the canonical labels and the usual export spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "lobby" | "dinein" => Ok(Category::Lobby),
            "drivethru" | "drivethrough" => Ok(Category::DriveThru),
            "togo" => Ok(Category::ToGo),
            _ => Err(ValidationError::new(
                "category",
                s,
                "must be one of Lobby, Drive-Thru, ToGo",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in Category::ALL {
            let parsed: Category = category.as_str().parse().unwrap();
            assert_eq!(category, parsed);
        }
    }

    #[test]
    fn test_category_spellings() {
        assert_eq!("drive thru".parse::<Category>().unwrap(), Category::DriveThru);
        assert_eq!("DRIVE_THRU".parse::<Category>().unwrap(), Category::DriveThru);
        assert_eq!("To Go".parse::<Category>().unwrap(), Category::ToGo);
        assert_eq!(" lobby ".parse::<Category>().unwrap(), Category::Lobby);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "Catering".parse::<Category>().unwrap_err();
        assert_eq!(err.field, "category");
        assert_eq!(err.value, "Catering");
    }

    #[test]
    fn test_category_serde_uses_labels() {
        let json = serde_json::to_string(&Category::DriveThru).unwrap();
        assert_eq!(json, r#""Drive-Thru""#);
        let parsed: Category = serde_json::from_str(r#""ToGo""#).unwrap();
        assert_eq!(parsed, Category::ToGo);
    }
}
