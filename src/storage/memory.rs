//! In-memory pattern store

use std::collections::HashMap;
use tracing::debug;

use super::PatternStore;
use crate::error::StoreError;
use crate::patterns::{Category, Pattern};

/// Reference `PatternStore` over a single keyed map
///
/// Not safe for concurrent mutation; wrap it in a lock or shard by location.
#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: HashMap<String, Pattern>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl PatternStore for InMemoryPatternStore {
    fn get(
        &self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<Option<Pattern>, StoreError> {
        let key = Pattern::key_for(location, category, hour, day_of_week);
        Ok(self.patterns.get(&key).cloned())
    }

    fn save(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        let key = pattern.key();
        if self.patterns.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key });
        }
        debug!("Saved pattern {}", key);
        self.patterns.insert(key, pattern);
        Ok(())
    }

    fn update(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        let key = pattern.key();
        match self.patterns.get_mut(&key) {
            Some(slot) => {
                *slot = pattern;
                Ok(())
            }
            None => Err(StoreError::NotFound { key }),
        }
    }

    fn upsert(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        self.patterns.insert(pattern.key(), pattern);
        Ok(())
    }

    fn delete(
        &mut self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<bool, StoreError> {
        let key = Pattern::key_for(location, category, hour, day_of_week);
        Ok(self.patterns.remove(&key).is_some())
    }

    fn list(&self, location: &str, category: Option<Category>) -> Result<Vec<Pattern>, StoreError> {
        let mut patterns: Vec<Pattern> = self
            .patterns
            .values()
            .filter(|p| p.location() == location)
            .filter(|p| category.map_or(true, |c| p.category() == c))
            .cloned()
            .collect();

        patterns.sort_by_key(|p| (p.category(), p.hour(), p.day_of_week()));
        Ok(patterns)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.patterns.clear();
        Ok(())
    }
}
