//! SQLite-backed pattern store
//!
//! One row per (location, category, hour, day_of_week). Metadata is JSON
//! text and timestamps are RFC 3339 text. Rows are validated again on read.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use tracing::debug;

use super::PatternStore;
use crate::error::{StoreError, ValidationError};
use crate::patterns::{Category, Metadata, Pattern};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS patterns (
    location TEXT NOT NULL,
    category TEXT NOT NULL,
    hour INTEGER NOT NULL,
    day_of_week INTEGER NOT NULL,
    expected_volume REAL NOT NULL,
    expected_staffing REAL NOT NULL,
    confidence REAL NOT NULL,
    observations INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (location, category, hour, day_of_week)
);

CREATE INDEX IF NOT EXISTS idx_patterns_location ON patterns(location, category);
"#;

const SELECT_COLUMNS: &str = "SELECT location, category, hour, day_of_week, expected_volume, \
     expected_staffing, confidence, observations, metadata, created_at, updated_at FROM patterns";

/// Pattern store backed by SQLite
pub struct SqlitePatternStore {
    conn: Connection,
}

impl SqlitePatternStore {
    /// Open or create a store at the given path
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.set_prepared_statement_cache_capacity(8);
        Ok(Self { conn })
    }

    /// Total pattern count
    pub fn count(&self) -> Result<i64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM patterns", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Pattern count per location, ordered by location
    pub fn location_counts(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT location, COUNT(*) FROM patterns GROUP BY location ORDER BY location",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_patterns(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Pattern>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, PatternRow::from_row)?;

        let mut patterns = Vec::new();
        for row in rows {
            patterns.push(row?.into_pattern()?);
        }
        Ok(patterns)
    }
}

impl PatternStore for SqlitePatternStore {
    fn get(
        &self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<Option<Pattern>, StoreError> {
        let sql = format!(
            "{} WHERE location = ?1 AND category = ?2 AND hour = ?3 AND day_of_week = ?4",
            SELECT_COLUMNS
        );
        let row = self
            .conn
            .prepare_cached(&sql)?
            .query_row(
                params![location, category.as_str(), hour, day_of_week],
                PatternRow::from_row,
            )
            .optional()?;

        row.map(PatternRow::into_pattern).transpose()
    }

    fn save(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        let key = pattern.key();
        let metadata = serde_json::to_string(pattern.metadata())?;

        let result = self.conn.execute(
            r#"
            INSERT INTO patterns
            (location, category, hour, day_of_week, expected_volume, expected_staffing,
             confidence, observations, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                pattern.location(),
                pattern.category().as_str(),
                pattern.hour(),
                pattern.day_of_week(),
                pattern.expected_volume(),
                pattern.expected_staffing(),
                pattern.confidence(),
                pattern.observations(),
                metadata,
                timestamp(pattern.created_at()),
                timestamp(pattern.updated_at()),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Saved pattern {}", key);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists { key })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(pattern.metadata())?;

        let changes = self.conn.execute(
            r#"
            UPDATE patterns
            SET expected_volume = ?5, expected_staffing = ?6, confidence = ?7,
                observations = ?8, metadata = ?9, created_at = ?10, updated_at = ?11
            WHERE location = ?1 AND category = ?2 AND hour = ?3 AND day_of_week = ?4
            "#,
            params![
                pattern.location(),
                pattern.category().as_str(),
                pattern.hour(),
                pattern.day_of_week(),
                pattern.expected_volume(),
                pattern.expected_staffing(),
                pattern.confidence(),
                pattern.observations(),
                metadata,
                timestamp(pattern.created_at()),
                timestamp(pattern.updated_at()),
            ],
        )?;

        if changes == 0 {
            return Err(StoreError::NotFound { key: pattern.key() });
        }
        Ok(())
    }

    fn upsert(&mut self, pattern: Pattern) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(pattern.metadata())?;

        self.conn.execute(
            r#"
            INSERT INTO patterns
            (location, category, hour, day_of_week, expected_volume, expected_staffing,
             confidence, observations, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(location, category, hour, day_of_week) DO UPDATE SET
                expected_volume = excluded.expected_volume,
                expected_staffing = excluded.expected_staffing,
                confidence = excluded.confidence,
                observations = excluded.observations,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
            params![
                pattern.location(),
                pattern.category().as_str(),
                pattern.hour(),
                pattern.day_of_week(),
                pattern.expected_volume(),
                pattern.expected_staffing(),
                pattern.confidence(),
                pattern.observations(),
                metadata,
                timestamp(pattern.created_at()),
                timestamp(pattern.updated_at()),
            ],
        )?;
        Ok(())
    }

    fn delete(
        &mut self,
        location: &str,
        category: Category,
        hour: u8,
        day_of_week: u8,
    ) -> Result<bool, StoreError> {
        let changes = self.conn.execute(
            "DELETE FROM patterns
             WHERE location = ?1 AND category = ?2 AND hour = ?3 AND day_of_week = ?4",
            params![location, category.as_str(), hour, day_of_week],
        )?;
        Ok(changes > 0)
    }

    fn list(&self, location: &str, category: Option<Category>) -> Result<Vec<Pattern>, StoreError> {
        match category {
            Some(cat) => {
                let sql = format!(
                    "{} WHERE location = ?1 AND category = ?2 ORDER BY hour, day_of_week",
                    SELECT_COLUMNS
                );
                self.query_patterns(&sql, params![location, cat.as_str()])
            }
            None => {
                let sql = format!(
                    "{} WHERE location = ?1 ORDER BY category, hour, day_of_week",
                    SELECT_COLUMNS
                );
                self.query_patterns(&sql, params![location])
            }
        }
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let removed = self.conn.execute("DELETE FROM patterns", [])?;
        debug!("Cleared {} patterns", removed);
        Ok(())
    }
}

/// Raw column values, converted outside the rusqlite row callback
struct PatternRow {
    location: String,
    category: String,
    hour: i64,
    day_of_week: i64,
    expected_volume: f64,
    expected_staffing: f64,
    confidence: f64,
    observations: i64,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl PatternRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            location: row.get(0)?,
            category: row.get(1)?,
            hour: row.get(2)?,
            day_of_week: row.get(3)?,
            expected_volume: row.get(4)?,
            expected_staffing: row.get(5)?,
            confidence: row.get(6)?,
            observations: row.get(7)?,
            metadata: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_pattern(self) -> Result<Pattern, StoreError> {
        let key = format!("{}:{}:{}:{}", self.location, self.category, self.hour, self.day_of_week);
        let corrupt = |source| StoreError::Corrupt { key: key.clone(), source };

        let category: Category = self.category.parse().map_err(corrupt)?;
        let hour = u8::try_from(self.hour)
            .map_err(|_| corrupt(ValidationError::new("hour", self.hour, "must be in 0..=23")))?;
        let day_of_week = u8::try_from(self.day_of_week).map_err(|_| {
            corrupt(ValidationError::new("day_of_week", self.day_of_week, "must be in 0..=6"))
        })?;
        let observations = u32::try_from(self.observations).map_err(|_| {
            corrupt(ValidationError::new("observations", self.observations, "must be non-negative"))
        })?;
        let metadata: Metadata = serde_json::from_str(&self.metadata)?;

        let pattern = Pattern::create(
            self.location,
            category,
            hour,
            day_of_week,
            self.expected_volume,
            self.expected_staffing,
            self.confidence,
            observations,
            Some(metadata),
        )
        .map_err(corrupt)?;

        let created_at = parse_timestamp(&self.created_at)?;
        let updated_at = parse_timestamp(&self.updated_at)?;
        Ok(pattern.with_timestamps(created_at, updated_at))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|source| StoreError::Timestamp {
            value: value.to_string(),
            source,
        })
}
