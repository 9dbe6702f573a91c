//! SQLite store for claimer settings and claim run history

use crate::types::{ClaimResult, ClaimRun, ClaimTrigger};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

/// Settings key for the persisted auto-claim toggle
pub const AUTO_CLAIM_ENABLED_KEY: &str = "auto_claim_enabled";

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `path`
    pub async fn new(path: &str) -> Result<Self> {
        let in_memory = path.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(path)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claim_runs (
                id TEXT PRIMARY KEY,
                run_trigger TEXT NOT NULL,
                strategy TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                claimed INTEGER NOT NULL DEFAULT 0,
                failed INTEGER NOT NULL DEFAULT 0,
                result_json TEXT,
                error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_claim_runs_started ON claim_runs(started_at)")
            .execute(&self.pool)
            .await?;

        info!("[Database] Initialized");
        Ok(())
    }

    // ==================== SETTINGS ====================

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Boolean setting; unparseable values read as unset
    pub async fn get_bool_setting(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .get_setting(key)
            .await?
            .and_then(|v| match v.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            }))
    }

    // ==================== CLAIM RUNS ====================

    pub async fn record_claim_run(&self, run: &ClaimRun) -> Result<()> {
        let result_json = run
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode claim result")?;
        let (claimed, failed) = run
            .result
            .as_ref()
            .map(|r| (r.claimed as i64, r.failed as i64))
            .unwrap_or((0, 0));

        sqlx::query(
            r#"
            INSERT INTO claim_runs (id, run_trigger, strategy, started_at, finished_at, claimed, failed, result_json, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.trigger.as_str())
        .bind(&run.strategy)
        .bind(timestamp(&run.started_at))
        .bind(timestamp(&run.finished_at))
        .bind(claimed)
        .bind(failed)
        .bind(result_json)
        .bind(&run.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn last_claim_run(&self) -> Result<Option<ClaimRun>> {
        Ok(self.recent_claim_runs(1).await?.into_iter().next())
    }

    /// Most recent runs first
    pub async fn recent_claim_runs(&self, limit: i64) -> Result<Vec<ClaimRun>> {
        let rows = sqlx::query("SELECT * FROM claim_runs ORDER BY started_at DESC, rowid DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_claim_run).collect()
    }

    /// Total conditions redeemed across all recorded runs
    pub async fn total_claimed(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COALESCE(SUM(claimed), 0) FROM claim_runs")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.0)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn row_to_claim_run(row: &SqliteRow) -> Result<ClaimRun> {
    let id: String = row.get("id");
    let trigger: String = row.get("run_trigger");
    let started_at: String = row.get("started_at");
    let finished_at: String = row.get("finished_at");
    let result_json: Option<String> = row.get("result_json");

    let result = match result_json {
        Some(json) => Some(
            serde_json::from_str::<ClaimResult>(&json).context("Corrupt claim result in history")?,
        ),
        None => None,
    };

    Ok(ClaimRun {
        id: Uuid::parse_str(&id)?,
        trigger: ClaimTrigger::from_str(&trigger)?,
        strategy: row.get("strategy"),
        started_at: parse_timestamp(&started_at)?,
        finished_at: parse_timestamp(&finished_at)?,
        result,
        error: row.get("error"),
    })
}
