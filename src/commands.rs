//! Command handlers for the shiftgrade binary

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use shiftgrade::grading::{group_into_windows, service_date, Grader, ServiceObservation};
use shiftgrade::learning::{Observation, PatternManager, TimeslotPatternManager};
use shiftgrade::storage::{SqlitePatternStore, CONFIG_FILE, DB_FILE};
use shiftgrade::{AppConfig, Category};

/// Input for `shiftgrade grade`
#[derive(Debug, Deserialize)]
struct GradeRequest {
    location: String,
    weekday: Weekday,
    #[serde(default)]
    history: Vec<ServiceObservation>,
    service: Vec<ServiceObservation>,
}

/// Initialize the data directory
pub fn init(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;

    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("Config already exists: {:?}", config_path);
    } else {
        AppConfig::recommended().save(&config_path)?;
        println!("Wrote default config: {:?}", config_path);
    }

    let store = SqlitePatternStore::open(&data_dir.join(DB_FILE))?;
    println!("Database ready: {} patterns", store.count()?);
    Ok(())
}

fn load_config(data_dir: &Path) -> Result<AppConfig> {
    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Err(anyhow::anyhow!(
            "No configuration at {:?}. Run 'shiftgrade init' first",
            config_path
        ));
    }
    Ok(AppConfig::load(&config_path)?)
}

fn open_manager(data_dir: &Path) -> Result<PatternManager<SqlitePatternStore>> {
    let config = load_config(data_dir)?;
    let store = SqlitePatternStore::open(&data_dir.join(DB_FILE))?;
    Ok(PatternManager::new(store, config.learning)?)
}

/// Learn hourly observations from a JSON file
pub fn learn(data_dir: &Path, input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    let observations: Vec<Observation> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse observations in {:?}", input))?;

    let mut manager = open_manager(data_dir)?;
    let summary = manager.learn_batch(&observations)?;

    println!("Learned {} observations", observations.len());
    println!("   Patterns created: {}", summary.patterns_created);
    println!("   Patterns updated: {}", summary.patterns_updated);
    Ok(())
}

/// Print patterns as JSON
pub fn show(
    data_dir: &Path,
    location: &str,
    category: Option<&str>,
    key: Option<(u8, u8)>,
    use_fallback: bool,
) -> Result<()> {
    let manager = open_manager(data_dir)?;
    let category = category.map(str::parse::<Category>).transpose()?;

    match key {
        Some((hour, day)) => {
            let category = category
                .ok_or_else(|| anyhow::anyhow!("--category is required with --hour and --day"))?;
            let pattern = manager.get(location, category, hour, day, use_fallback)?;
            println!("{}", serde_json::to_string_pretty(&pattern)?);
        }
        None => {
            let patterns = manager.list_patterns(location, category)?;
            println!("{}", serde_json::to_string_pretty(&patterns)?);
        }
    }
    Ok(())
}

/// Delete all patterns for a location
pub fn clear(data_dir: &Path, location: &str) -> Result<()> {
    let mut manager = open_manager(data_dir)?;
    let removed = manager.clear_location(location)?;
    println!("Removed {} patterns for {}", removed, location);
    Ok(())
}

/// Learn service history, then grade the service day by shift
pub fn grade(data_dir: &Path, input: &Path) -> Result<()> {
    let config = load_config(data_dir)?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    let request: GradeRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse grading request in {:?}", input))?;

    let mut timeslots = TimeslotPatternManager::new();
    timeslots.learn_history(&request.location, &request.history)?;

    let date = service_date(&request.service, request.weekday)
        .with_context(|| format!("Service observations in {:?} must cover one day", input))?;

    let day = timeslots.get_patterns_for_day(&request.location, request.weekday);
    let windows = group_into_windows(&request.service);
    info!(
        "Grading {} windows for {} on {:?} ({} learned timeslots)",
        windows.len(),
        request.location,
        date,
        timeslots.len()
    );

    let grader = Grader::new(config.grading)?;
    let shifts = grader.grade_day(&windows, &day);
    println!("{}", serde_json::to_string_pretty(&shifts)?);
    Ok(())
}

/// Show data directory state and pattern counts
pub fn status(data_dir: &Path) -> Result<()> {
    println!("shiftgrade Status");
    println!("=================");
    println!();

    if !data_dir.exists() {
        println!("Status: NOT INITIALIZED");
        println!("Run 'shiftgrade init' to initialize");
        return Ok(());
    }

    println!("Status: INITIALIZED");
    println!("Data directory: {:?}", data_dir);

    let config_path = data_dir.join(CONFIG_FILE);
    match AppConfig::load(&config_path) {
        Ok(config) => {
            let rates = &config.learning.learning_rates;
            println!("Config: {:?}", config_path);
            println!(
                "   Learning rates: early {} / mature {} (threshold {})",
                rates.early, rates.mature, rates.threshold
            );
        }
        Err(e) => println!("Config: invalid ({})", e),
    }

    let db_path = data_dir.join(DB_FILE);
    if db_path.exists() {
        let store = SqlitePatternStore::open(&db_path)?;
        println!("Patterns: {}", store.count()?);
        for (location, count) in store.location_counts()? {
            println!("   {}: {}", location, count);
        }
    } else {
        println!("Database: not found");
    }

    Ok(())
}
