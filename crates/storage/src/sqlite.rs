//! Document store backed by SQLite with sqlx.
//!
//! Enrichment payloads are stored as JSON documents. Each enrichment table
//! carries `UNIQUE(system_id, date)` and inserts use `ON CONFLICT DO NOTHING`,
//! so two overlapping runs can never persist the same key twice.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use enrich_common::{
    EnrichError, EnrichResult, HistoryRecord, HourlySolarIrradianceRecord, HourlyWeatherRecord,
    System, WeatherSample,
};

use crate::store::{
    BulkWriteResult, Collection, DocumentStore, EnrichmentWrite, HistoryCursor, StoreStats,
    WriteFailure,
};

/// SQLite-backed document store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    #[instrument]
    pub async fn open(path: &Path) -> EnrichResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Connection failed: {}", e)))?;

        let store = Self { pool };
        store.migrate().await?;

        info!(path = %path.display(), "Opened document store");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> EnrichResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| EnrichError::DatabaseError(format!("Bad connection string: {}", e)))?;

        // A single connection that never expires keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Connection failed: {}", e)))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> EnrichResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| EnrichError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }
        Ok(())
    }

    async fn count(&self, sql: &str) -> EnrichResult<u64> {
        let count: (i64,) = sqlx::query_as(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Count failed: {}", e)))?;
        Ok(count.0 as u64)
    }

    async fn document(
        &self,
        collection: Collection,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<String>> {
        let sql = format!(
            "SELECT document FROM {} WHERE system_id = ? AND date = ?",
            collection.as_str()
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(system_id)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Lookup failed: {}", e)))?;
        Ok(row.map(|r| r.0))
    }

    async fn insert_document(
        &self,
        collection: Collection,
        system_id: &str,
        date: NaiveDate,
        document: String,
        created_at: DateTime<Utc>,
    ) -> Result<u64, String> {
        let sql = format!(
            "INSERT INTO {} (system_id, date, document, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(system_id, date) DO NOTHING",
            collection.as_str()
        );
        let result = sqlx::query(&sql)
            .bind(system_id)
            .bind(date.to_string())
            .bind(document)
            .bind(format_ts(created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(result.rows_affected())
    }

    async fn apply(&self, write: &EnrichmentWrite) -> Result<(), String> {
        match write {
            EnrichmentWrite::HourlyWeather(record) => {
                let doc = serde_json::to_string(record).map_err(|e| e.to_string())?;
                let inserted = self
                    .insert_document(
                        Collection::HourlyWeather,
                        &record.system_id,
                        record.date,
                        doc,
                        record.created_at,
                    )
                    .await?;
                if inserted == 0 {
                    debug!(key = %write.key(), "Record already present, insert ignored");
                }
                Ok(())
            }
            EnrichmentWrite::HourlyIrradiance(record) => {
                let doc = serde_json::to_string(record).map_err(|e| e.to_string())?;
                let inserted = self
                    .insert_document(
                        Collection::HourlyIrradiance,
                        &record.system_id,
                        record.date,
                        doc,
                        record.created_at,
                    )
                    .await?;
                if inserted == 0 {
                    debug!(key = %write.key(), "Record already present, insert ignored");
                }
                Ok(())
            }
            EnrichmentWrite::PointWeather { record_id, sample } => {
                let doc = serde_json::to_string(sample).map_err(|e| e.to_string())?;
                // COALESCE keeps an existing attachment from a concurrent run.
                let result = sqlx::query(
                    "UPDATE history SET weather = COALESCE(weather, ?) WHERE id = ?",
                )
                .bind(doc)
                .bind(record_id)
                .execute(&self.pool)
                .await
                .map_err(|e| e.to_string())?;
                if result.rows_affected() == 0 {
                    return Err("history record not found".to_string());
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn ping(&self) -> EnrichResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    async fn systems_with_coordinates(&self) -> EnrichResult<Vec<System>> {
        let rows: Vec<(String, String, Option<f64>, Option<f64>, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT id, name, latitude, longitude, altitude
            FROM systems
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EnrichError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| System {
                id: row.0,
                name: row.1,
                latitude: row.2,
                longitude: row.3,
                altitude: row.4,
            })
            .collect())
    }

    async fn history_range(
        &self,
        system_id: &str,
    ) -> EnrichResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row: (Option<String>, Option<String>) = sqlx::query_as(
            "SELECT MIN(timestamp), MAX(timestamp) FROM history WHERE system_id = ?",
        )
        .bind(system_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| EnrichError::DatabaseError(format!("Aggregate failed: {}", e)))?;

        match row {
            (Some(min), Some(max)) => Ok(Some((parse_ts(&min)?, parse_ts(&max)?))),
            _ => Ok(None),
        }
    }

    async fn history_missing_weather(
        &self,
        system_id: &str,
        after: Option<&HistoryCursor>,
        limit: u32,
    ) -> EnrichResult<Vec<HistoryRecord>> {
        // Empty strings sort before every stored timestamp and id.
        let (after_ts, after_id) = match after {
            Some(cursor) => (format_ts(cursor.timestamp), cursor.id.clone()),
            None => (String::new(), String::new()),
        };

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, system_id, timestamp
            FROM history
            WHERE system_id = ? AND weather IS NULL
              AND (timestamp > ? OR (timestamp = ? AND id > ?))
            ORDER BY timestamp ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(system_id)
        .bind(&after_ts)
        .bind(&after_ts)
        .bind(&after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EnrichError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter()
            .map(|(id, system_id, ts)| {
                Ok(HistoryRecord {
                    id,
                    system_id,
                    timestamp: parse_ts(&ts)?,
                    weather: None,
                })
            })
            .collect()
    }

    async fn exists(
        &self,
        collection: Collection,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE system_id = ? AND date = ?",
            collection.as_str()
        );
        let count: (i64,) = sqlx::query_as(&sql)
            .bind(system_id)
            .bind(date.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EnrichError::DatabaseError(format!("Existence check failed: {}", e)))?;
        Ok(count.0 > 0)
    }

    async fn hourly_weather(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlyWeatherRecord>> {
        match self.document(Collection::HourlyWeather, system_id, date).await? {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn hourly_irradiance(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlySolarIrradianceRecord>> {
        match self
            .document(Collection::HourlyIrradiance, system_id, date)
            .await?
        {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn bulk_write(&self, writes: Vec<EnrichmentWrite>) -> EnrichResult<BulkWriteResult> {
        let mut result = BulkWriteResult::default();

        for write in &writes {
            match self.apply(write).await {
                Ok(()) => result.written += 1,
                Err(error) => result.failed.push(WriteFailure {
                    key: write.key(),
                    error,
                }),
            }
        }

        Ok(result)
    }

    async fn stats(&self) -> EnrichResult<StoreStats> {
        Ok(StoreStats {
            systems: self.count("SELECT COUNT(*) FROM systems").await?,
            systems_with_coordinates: self
                .count(
                    "SELECT COUNT(*) FROM systems \
                     WHERE latitude IS NOT NULL AND longitude IS NOT NULL",
                )
                .await?,
            history_records: self.count("SELECT COUNT(*) FROM history").await?,
            history_with_weather: self
                .count("SELECT COUNT(*) FROM history WHERE weather IS NOT NULL")
                .await?,
            hourly_weather_records: self.count("SELECT COUNT(*) FROM hourly_weather").await?,
            hourly_irradiance_records: self
                .count("SELECT COUNT(*) FROM hourly_irradiance")
                .await?,
        })
    }

    async fn put_system(&self, system: &System) -> EnrichResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO systems (id, name, latitude, longitude, altitude)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&system.id)
        .bind(&system.name)
        .bind(system.latitude)
        .bind(system.longitude)
        .bind(system.altitude)
        .execute(&self.pool)
        .await
        .map_err(|e| EnrichError::DatabaseError(format!("Insert failed: {}", e)))?;
        Ok(())
    }

    async fn put_history(&self, record: &HistoryRecord) -> EnrichResult<()> {
        let weather = record
            .weather
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO history (id, system_id, timestamp, weather)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.system_id)
        .bind(format_ts(record.timestamp))
        .bind(weather)
        .execute(&self.pool)
        .await
        .map_err(|e| EnrichError::DatabaseError(format!("Insert failed: {}", e)))?;
        Ok(())
    }
}

impl SqliteStore {
    /// Weather attached to a history record, if any.
    pub async fn history_weather(&self, record_id: &str) -> EnrichResult<Option<WeatherSample>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT weather FROM history WHERE id = ?")
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| EnrichError::DatabaseError(format!("Lookup failed: {}", e)))?;

        match row.and_then(|r| r.0) {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> EnrichResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| EnrichError::StorageError(format!("Bad timestamp '{}': {}", s, e)))
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS systems (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    altitude REAL
);

CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY,
    system_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    weather TEXT
);

CREATE INDEX IF NOT EXISTS idx_history_system_time ON history(system_id, timestamp);

CREATE TABLE IF NOT EXISTS hourly_weather (
    system_id TEXT NOT NULL,
    date TEXT NOT NULL,
    document TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(system_id, date)
);

CREATE TABLE IF NOT EXISTS hourly_irradiance (
    system_id TEXT NOT NULL,
    date TEXT NOT NULL,
    document TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(system_id, date)
)
"#;
