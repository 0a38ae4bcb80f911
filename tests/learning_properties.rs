//! Behavioural tests for learning, retrieval and grading through the public API

use chrono::{NaiveDate, Weekday};
use shiftgrade::grading::{group_into_windows, Grader, ServiceObservation, WindowObservations};
use shiftgrade::learning::{PatternManager, TimeslotPatternManager};
use shiftgrade::patterns::{TimeWindow, DAYS_AVERAGED_KEY};
use shiftgrade::{Category, InMemoryPatternStore, LearningConfig, PatternStore, SqlitePatternStore};

fn config() -> LearningConfig {
    LearningConfig::from_toml_str(
        r#"
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
        "#,
    )
    .unwrap()
}

fn service(id: &str, category: Category, h: u32, m: u32, minutes: f64) -> ServiceObservation {
    ServiceObservation {
        id: id.into(),
        category,
        // 2024-03-04 was a Monday
        timestamp: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(h, m, 0).unwrap(),
        fulfillment_time: minutes,
    }
}

#[test]
fn test_converges_then_resists_single_anomaly() {
    let mut manager = PatternManager::new(InMemoryPatternStore::new(), config()).unwrap();
    for _ in 0..6 {
        manager.learn("S001", Category::DriveThru, 12, 5, 100.0, 4.0).unwrap();
    }
    let p = manager.learn("S001", Category::DriveThru, 12, 5, 80.0, 4.0).unwrap();
    assert_eq!(p.observations(), 7);
    assert!((p.expected_volume() - 96.0).abs() < 1e-9);
}

#[test]
fn test_sqlite_backed_manager_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlitePatternStore::open(&dir.path().join("patterns.sqlite")).unwrap();
    let mut sqlite = PatternManager::new(store, config()).unwrap();
    let mut memory = PatternManager::new(InMemoryPatternStore::new(), config()).unwrap();

    for (i, volume) in [40.0, 55.0, 47.0, 61.0, 52.0, 58.0].into_iter().enumerate() {
        let a = sqlite.learn("S001", Category::Lobby, 18, 4, volume, 3.0 + i as f64).unwrap();
        let b = memory.learn("S001", Category::Lobby, 18, 4, volume, 3.0 + i as f64).unwrap();
        assert_eq!(a.expected_volume(), b.expected_volume());
        assert_eq!(a.confidence(), b.confidence());
    }

    let stored = sqlite.into_store().get("S001", Category::Lobby, 18, 4).unwrap().unwrap();
    assert_eq!(stored.observations(), 6);
}

#[test]
fn test_fallback_chain_through_sqlite() {
    let store = SqlitePatternStore::open_in_memory().unwrap();
    let mut manager = PatternManager::new(store, config()).unwrap();
    for (day, volume) in [(0, 100.0), (1, 110.0), (2, 120.0)] {
        for _ in 0..3 {
            manager.learn("S001", Category::ToGo, 19, day, volume, 2.0).unwrap();
        }
    }

    let p = manager.get("S001", Category::ToGo, 19, 3, true).unwrap().unwrap();
    assert!((p.expected_volume() - 110.0).abs() < 1e-9);
    assert_eq!(p.day_of_week(), 0);
    assert!(p.is_fallback());
    assert_eq!(p.metadata()[DAYS_AVERAGED_KEY], serde_json::json!(3));

    assert!(manager.get("S001", Category::ToGo, 20, 3, true).unwrap().is_none());
}

#[test]
fn test_learned_history_drives_historical_grade() {
    let mut timeslots = TimeslotPatternManager::new();
    let history: Vec<ServiceObservation> = (0..4)
        .map(|i| service(&format!("h{i}"), Category::DriveThru, 12, 5, 4.0))
        .collect();
    timeslots.learn_history("S001", &history).unwrap();

    let day = timeslots.get_patterns_for_day("S001", Weekday::Mon);
    let windows = group_into_windows(&[
        service("a", Category::DriveThru, 12, 3, 3.5),
        service("b", Category::DriveThru, 12, 9, 6.5),
        service("c", Category::Lobby, 12, 40, 30.0),
    ]);

    let shifts = Grader::default().grade_day(&windows, &day);
    assert_eq!(shifts.len(), 1);
    let morning = &shifts[0].windows;
    assert_eq!(morning.len(), 2);

    // 12:00 window: within standard, over the learned 4.0 baseline
    assert!(morning[0].passed_standards);
    assert!(!morning[0].passed_historical);
    assert_eq!(morning[0].consecutive_fails, 1);

    // 12:30 window: no pattern, fails the Lobby standard only
    assert!(!morning[1].passed_standards);
    assert!(morning[1].passed_historical);
    assert_eq!(morning[1].historical_pass_rate, None);
    assert_eq!(morning[1].consecutive_fails, 2);
}

#[test]
fn test_empty_window_passes_with_any_pattern() {
    let mut timeslots = TimeslotPatternManager::new();
    let window = TimeWindow::starting_at(8, 0).unwrap();
    for _ in 0..10 {
        timeslots.learn("S001", Weekday::Tue, Category::Lobby, window, 1.0).unwrap();
    }
    let day = timeslots.get_patterns_for_day("S001", Weekday::Tue);

    let grade = Grader::default().grade(&WindowObservations::new(window, vec![]), day.get(&window));
    assert!(grade.passed_standards);
    assert!(grade.passed_historical);
    assert!(grade.failures.is_empty());
}
