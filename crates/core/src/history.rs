//! History ledger access
//!
//! The engine records every executed migration in a table inside the target
//! database. The table is the wire contract between engine versions: rows are
//! append-only, `installed_rank` is strictly increasing and gapless, and
//! failed rows stay visible until `repair` removes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Row};
use tracing::debug;

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::source::{MigrationScript, ResolvedMigration};

/// Ledger kind tag for SQL scripts
pub const KIND_SQL: &str = "sql";
/// Ledger kind tag for code migrations
pub const KIND_CODE: &str = "code";
/// Ledger kind tag for the synthetic baseline row
pub const KIND_BASELINE: &str = "baseline";

/// A row of the history ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub installed_rank: i32,
    pub version: Option<String>,
    pub description: String,
    pub kind: String,
    pub script: String,
    pub checksum: Option<String>,
    pub installed_by: String,
    pub installed_on: DateTime<Utc>,
    pub execution_time_ms: i64,
    pub success: bool,
}

impl AppliedMigration {
    /// Whether this is the synthetic baseline marker
    pub fn is_baseline(&self) -> bool {
        self.kind == KIND_BASELINE
    }
}

/// Row data for a new ledger entry, rank assigned at insert time
#[derive(Debug, Clone)]
pub struct NewHistoryRecord<'a> {
    pub version: Option<&'a str>,
    pub description: &'a str,
    pub kind: &'a str,
    pub script: &'a str,
    pub checksum: Option<&'a str>,
    pub installed_by: &'a str,
    pub execution_time_ms: i64,
    pub success: bool,
}

impl<'a> NewHistoryRecord<'a> {
    /// Build the record for an executed migration
    pub fn for_migration(
        migration: &'a ResolvedMigration,
        installed_by: &'a str,
        execution_time_ms: i64,
        success: bool,
    ) -> Self {
        let kind = match &migration.body {
            MigrationScript::Sql { .. } => KIND_SQL,
            MigrationScript::Code(_) => KIND_CODE,
        };
        Self {
            version: migration.version.as_ref().map(|v| v.as_str()),
            description: &migration.description,
            kind,
            script: &migration.script,
            checksum: Some(&migration.checksum),
            installed_by,
            execution_time_ms,
            success,
        }
    }

    /// Build the synthetic baseline record
    pub fn baseline(version: &'a str, description: &'a str, installed_by: &'a str) -> Self {
        Self {
            version: Some(version),
            description,
            kind: KIND_BASELINE,
            script: description,
            checksum: None,
            installed_by,
            execution_time_ms: 0,
            success: true,
        }
    }
}

/// Accessor for the history ledger table
pub struct HistoryStore {
    table: String,
}

impl HistoryStore {
    /// Create a store bound to the configured (schema-qualified) table
    pub fn new(config: &MigrationConfig) -> Self {
        Self {
            table: config.qualified_history_table(),
        }
    }

    /// The qualified table name this store reads and writes
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table and its index if absent
    ///
    /// Idempotent; callers hold the advisory lock so a concurrent first run
    /// cannot race the creation.
    pub async fn ensure_table(&self, pool: &PgPool) -> MigrationResult<()> {
        sqlx::query(&self.create_table_sql()).execute(pool).await?;
        sqlx::query(&self.create_index_sql()).execute(pool).await?;
        debug!(table = %self.table, "history table ready");
        Ok(())
    }

    /// Whether the ledger table exists
    pub async fn exists(&self, pool: &PgPool) -> MigrationResult<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(&self.table)
            .fetch_one(pool)
            .await?;
        Ok(found.is_some())
    }

    /// Read the full ledger ordered by `installed_rank`
    pub async fn read_all(&self, pool: &PgPool) -> MigrationResult<Vec<AppliedMigration>> {
        let rows = sqlx::query(&self.select_all_sql()).fetch_all(pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Append a row with the next `installed_rank`
    ///
    /// Both the rank query and the insert run on the caller's connection, so
    /// inside a transaction the rank is assigned at commit time and stays
    /// gapless.
    pub async fn append(
        &self,
        conn: &mut PgConnection,
        record: &NewHistoryRecord<'_>,
    ) -> MigrationResult<i32> {
        let rank: i32 = sqlx::query_scalar(&self.next_rank_sql())
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(&self.insert_sql())
            .bind(rank)
            .bind(record.version)
            .bind(record.description)
            .bind(record.kind)
            .bind(record.script)
            .bind(record.checksum)
            .bind(record.installed_by)
            .bind(record.execution_time_ms)
            .bind(record.success)
            .execute(&mut *conn)
            .await?;

        Ok(rank)
    }

    /// Delete failed rows, optionally narrowed to a version or description
    ///
    /// Returns the removed rows; [`MigrationError::NoFailedRecord`] when
    /// nothing matched.
    pub async fn remove_failed(
        &self,
        conn: &mut PgConnection,
        target: Option<&str>,
    ) -> MigrationResult<Vec<AppliedMigration>> {
        let rows = match target {
            Some(target) => {
                sqlx::query(&self.delete_failed_targeted_sql())
                    .bind(target)
                    .fetch_all(&mut *conn)
                    .await?
            }
            None => {
                sqlx::query(&self.delete_failed_sql())
                    .fetch_all(&mut *conn)
                    .await?
            }
        };

        if rows.is_empty() {
            return Err(MigrationError::NoFailedRecord);
        }
        rows.iter().map(row_to_record).collect()
    }

    /// Overwrite the stored checksum of a row (repair realignment)
    pub async fn update_checksum(
        &self,
        conn: &mut PgConnection,
        installed_rank: i32,
        checksum: &str,
    ) -> MigrationResult<()> {
        sqlx::query(&self.update_checksum_sql())
            .bind(checksum)
            .bind(installed_rank)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// The database user recorded as `installed_by` when not configured
    pub async fn current_user(&self, pool: &PgPool) -> MigrationResult<String> {
        let user: String = sqlx::query_scalar("SELECT current_user::text")
            .fetch_one(pool)
            .await?;
        Ok(user)
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                installed_rank INTEGER NOT NULL PRIMARY KEY,\n    \
                version VARCHAR(50),\n    \
                description VARCHAR(200) NOT NULL,\n    \
                kind VARCHAR(20) NOT NULL,\n    \
                script VARCHAR(1000) NOT NULL,\n    \
                checksum VARCHAR(64),\n    \
                installed_by VARCHAR(100) NOT NULL,\n    \
                installed_on TIMESTAMPTZ NOT NULL DEFAULT now(),\n    \
                execution_time BIGINT NOT NULL,\n    \
                success BOOLEAN NOT NULL\n\
            )",
            self.table
        )
    }

    fn create_index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS \"{}_success_idx\" ON {} (success)",
            self.index_base_name(),
            self.table
        )
    }

    fn index_base_name(&self) -> String {
        self.table.replace('"', "").replace('.', "_")
    }

    fn select_all_sql(&self) -> String {
        format!(
            "SELECT installed_rank, version, description, kind, script, checksum, \
             installed_by, installed_on, execution_time, success \
             FROM {} ORDER BY installed_rank",
            self.table
        )
    }

    fn next_rank_sql(&self) -> String {
        format!(
            "SELECT COALESCE(MAX(installed_rank), 0) + 1 FROM {}",
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (installed_rank, version, description, kind, script, \
             checksum, installed_by, execution_time, success) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.table
        )
    }

    fn delete_failed_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE success = false \
             RETURNING installed_rank, version, description, kind, script, checksum, \
             installed_by, installed_on, execution_time, success",
            self.table
        )
    }

    fn delete_failed_targeted_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE success = false AND (version = $1 OR description = $1) \
             RETURNING installed_rank, version, description, kind, script, checksum, \
             installed_by, installed_on, execution_time, success",
            self.table
        )
    }

    fn update_checksum_sql(&self) -> String {
        format!(
            "UPDATE {} SET checksum = $1 WHERE installed_rank = $2",
            self.table
        )
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> MigrationResult<AppliedMigration> {
    Ok(AppliedMigration {
        installed_rank: row.try_get("installed_rank")?,
        version: row.try_get("version")?,
        description: row.try_get("description")?,
        kind: row.try_get("kind")?,
        script: row.try_get("script")?,
        checksum: row.try_get("checksum")?,
        installed_by: row.try_get("installed_by")?,
        installed_on: row.try_get("installed_on")?,
        execution_time_ms: row.try_get("execution_time")?,
        success: row.try_get("success")?,
    })
}
