//! Pattern storage
//!
//! `PatternStore` is the only seam between learning and persistence. It has
//! no business logic: keyed get/save/update/upsert/delete/list/clear.
//! Implementations are not internally synchronized. Mutation takes
//! `&mut self`, so sharing a store across threads needs sharding by
//! location or an external lock.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::patterns::{Category, Pattern};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryPatternStore;
pub use sqlite::SqlitePatternStore;

/// Database file inside the data directory
pub const DB_FILE: &str = "patterns.sqlite";
/// Configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Keyed storage for hourly patterns
///
/// "Not found" is a successful result: `Ok(None)`, `Ok(false)` or an empty
/// list. Errors are reserved for key conflicts and backend failures.
pub trait PatternStore {
    fn get(
        &self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<Option<Pattern>, StoreError>;

    /// Insert a new pattern; fails with `AlreadyExists` if the key is taken
    fn save(&mut self, pattern: Pattern) -> Result<(), StoreError>;

    /// Replace an existing pattern; fails with `NotFound` if the key is free
    fn update(&mut self, pattern: Pattern) -> Result<(), StoreError>;

    /// Insert or replace
    fn upsert(&mut self, pattern: Pattern) -> Result<(), StoreError>;

    /// Returns true iff a pattern was removed
    fn delete(
        &mut self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<bool, StoreError>;

    /// All patterns for a location, optionally for one category
    fn list(&self, location: &str, category: Option<Category>) -> Result<Vec<Pattern>, StoreError>;

    /// Remove everything
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Resolve the data directory: explicit, then `./.shiftgrade`, then `~/.shiftgrade`
pub fn data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    let project_dir = cwd.join(".shiftgrade");
    if project_dir.exists() {
        return Ok(project_dir);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".shiftgrade"))
}
