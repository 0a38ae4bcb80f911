//! shiftgrade - adaptive baselines and strict service grading
//!
//! Learns expected volume/staffing per (location, category, hour,
//! day-of-week) and expected fulfillment time per 15-minute window from
//! daily observations, then grades service windows against fixed business
//! standards and the learned baselines.
//!
//! Everything here is synchronous. Stores are not internally locked.

pub mod config;
pub mod error;
pub mod grading;
pub mod learning;
pub mod patterns;
pub mod storage;

pub use config::{AppConfig, GradingConfig, LearningConfig};
pub use error::{ConfigError, LearningError, StoreError, ValidationError};
pub use grading::{Grader, ServiceObservation, ShiftGrade, WindowGrade, WindowObservations};
pub use learning::{Observation, PatternManager, TimeslotPatternManager};
pub use patterns::{Category, Pattern, TimeWindow, TimeslotPattern};
pub use storage::{InMemoryPatternStore, PatternStore, SqlitePatternStore};
