//! Engine facade
//!
//! [`Migrator`] ties the stages together and exposes one method per
//! operation: `migrate`, `validate`, `info`, `baseline`, `repair`, `clean`.
//! Mutating operations run under the cluster-wide advisory lock from before
//! history-table initialization until after the last statement.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::code::CodeMigration;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::history::{HistoryStore, NewHistoryRecord};
use crate::lock::MigrationLock;
use crate::resolver::{self, MigrationInfo};
use crate::runner::{AppliedStep, MigrationRunner};
use crate::source::{self, ResolvedMigration};
use crate::validate::{self, ValidateReport};
use crate::version::MigrationVersion;

/// Result of a `migrate` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateReport {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// The applied migrations in execution order
    pub applied_migrations: Vec<AppliedStep>,
    /// Resolved migrations that needed no execution
    pub skipped_count: usize,
    /// Total wall-clock time including locking and planning
    pub execution_time_ms: u64,
}

/// Result of a `repair` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    /// Scripts whose failed rows were deleted
    pub removed_failed: Vec<String>,
    /// Scripts whose stored checksum was realigned to disk content
    pub realigned_checksums: Vec<String>,
}

/// Result of a `clean` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanReport {
    pub dropped_tables: Vec<String>,
    pub dropped_views: Vec<String>,
    pub dropped_sequences: Vec<String>,
}

/// The migration engine
pub struct Migrator {
    config: MigrationConfig,
    pool: PgPool,
    history: HistoryStore,
    code_migrations: Vec<Arc<dyn CodeMigration>>,
}

impl Migrator {
    /// Create a migrator over an existing connection pool
    pub fn new(pool: PgPool, config: MigrationConfig) -> Self {
        let history = HistoryStore::new(&config);
        Self {
            config,
            pool,
            history,
            code_migrations: Vec::new(),
        }
    }

    /// Create a migrator by connecting to a database URL
    pub async fn from_url(database_url: &str, config: MigrationConfig) -> MigrationResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool, config))
    }

    /// Register a code migration; it takes part in resolution like a script
    pub fn with_code_migration(mut self, migration: Arc<dyn CodeMigration>) -> Self {
        self.code_migrations.push(migration);
        self
    }

    /// The engine configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Scan locations, merge registered code migrations, reject duplicates
    pub fn resolve(&self) -> MigrationResult<Vec<ResolvedMigration>> {
        let mut artifacts = source::scan(&self.config)?;
        for code in &self.code_migrations {
            artifacts.push(source::resolve_code(code)?);
        }
        source::check_duplicates(&artifacts)?;
        Ok(artifacts)
    }

    /// Apply all pending migrations
    pub async fn migrate(&self) -> MigrationResult<MigrateReport> {
        let started = Instant::now();
        let artifacts = self.resolve()?;

        let lock = MigrationLock::acquire(&self.pool, &self.config).await?;
        let outcome = self.migrate_locked(&artifacts).await;
        let release = lock.release().await;
        let (applied_migrations, skipped_count) = outcome?;
        release?;

        info!(
            applied = applied_migrations.len(),
            skipped = skipped_count,
            "migrate complete"
        );
        Ok(MigrateReport {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn migrate_locked(
        &self,
        artifacts: &[ResolvedMigration],
    ) -> MigrationResult<(Vec<AppliedStep>, usize)> {
        self.history.ensure_table(&self.pool).await?;
        let mut records = self.history.read_all(&self.pool).await?;

        // Ledger empty but the schema is not: adopt it at the baseline version
        if self.config.baseline_on_migrate
            && records.is_empty()
            && self.schema_has_other_tables().await?
        {
            self.insert_baseline_row().await?;
            records = self.history.read_all(&self.pool).await?;
        }

        if self.config.validate_on_migrate {
            let report = validate::validate(artifacts, &records, &self.config)?;
            if let Some(err) = report.into_error() {
                return Err(err);
            }
        }

        let plan = resolver::plan(
            artifacts,
            &records,
            &self.config,
            self.config.validate_on_migrate,
        )?;
        if plan.is_empty() {
            info!("no pending migrations");
            return Ok((Vec::new(), artifacts.len()));
        }

        let skipped = artifacts.len() - plan.len();
        let installed_by = self.installed_by().await?;
        let runner = MigrationRunner::new(&self.config, &self.history, &self.pool, &installed_by);
        let applied = runner.run(&plan).await?;
        Ok((applied, skipped))
    }

    /// Validate applied migrations against the resolved artifacts
    pub async fn validate(&self) -> MigrationResult<ValidateReport> {
        let artifacts = self.resolve()?;
        let records = self.read_history_if_present().await?;
        validate::validate(&artifacts, &records, &self.config)
    }

    /// Classify every migration and ledger row
    pub async fn info(&self) -> MigrationResult<Vec<MigrationInfo>> {
        let artifacts = self.resolve()?;
        let records = self.read_history_if_present().await?;
        resolver::info(&artifacts, &records)
    }

    /// Mark a pre-existing database as already at the baseline version
    ///
    /// Refuses when the ledger holds any row; versions at or below the
    /// baseline are ignored from then on.
    pub async fn baseline(&self) -> MigrationResult<()> {
        let lock = MigrationLock::acquire(&self.pool, &self.config).await?;
        let outcome = self.baseline_locked().await;
        let release = lock.release().await;
        outcome?;
        release?;
        Ok(())
    }

    async fn baseline_locked(&self) -> MigrationResult<()> {
        self.history.ensure_table(&self.pool).await?;
        let records = self.history.read_all(&self.pool).await?;
        if !records.is_empty() {
            return Err(MigrationError::configuration(
                "cannot baseline: the history ledger is not empty",
            ));
        }
        self.insert_baseline_row().await
    }

    async fn insert_baseline_row(&self) -> MigrationResult<()> {
        // The baseline version must parse like any other
        MigrationVersion::parse(&self.config.baseline_version)?;

        let installed_by = self.installed_by().await?;
        let record = NewHistoryRecord::baseline(
            &self.config.baseline_version,
            &self.config.baseline_description,
            &installed_by,
        );
        let mut tx = self.pool.begin().await?;
        self.history.append(&mut tx, &record).await?;
        tx.commit().await?;

        info!(version = %self.config.baseline_version, "baseline recorded");
        Ok(())
    }

    /// Whether the configured schema holds tables besides the ledger
    async fn schema_has_other_tables(&self) -> MigrationResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pg_tables WHERE schemaname = $1 AND tablename <> $2",
        )
        .bind(self.config.schema_or_default())
        .bind(&self.config.history_table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Remove failed rows and realign stored checksums to disk content
    pub async fn repair(&self) -> MigrationResult<RepairReport> {
        let artifacts = self.resolve()?;
        let lock = MigrationLock::acquire(&self.pool, &self.config).await?;
        let outcome = self.repair_locked(&artifacts).await;
        let release = lock.release().await;
        let report = outcome?;
        release?;
        Ok(report)
    }

    async fn repair_locked(
        &self,
        artifacts: &[ResolvedMigration],
    ) -> MigrationResult<RepairReport> {
        self.history.ensure_table(&self.pool).await?;
        let records = self.history.read_all(&self.pool).await?;

        let mut tx = self.pool.begin().await?;
        let removed_failed = match self.history.remove_failed(&mut tx, None).await {
            Ok(rows) => rows.into_iter().map(|r| r.script).collect::<Vec<_>>(),
            Err(MigrationError::NoFailedRecord) => Vec::new(),
            Err(err) => return Err(err),
        };

        // Checksum realignment covers versioned rows; repeatable drift is
        // resolved by re-running the migration, not by rewriting history.
        let mut realigned_checksums = Vec::new();
        for record in records.iter().filter(|r| r.success && !r.is_baseline()) {
            let Some(raw) = record.version.as_deref() else {
                continue;
            };
            let version = MigrationVersion::parse(raw)?;
            let Some(artifact) = artifacts
                .iter()
                .find(|a| a.version.as_ref() == Some(&version))
            else {
                continue;
            };
            if record.checksum.as_deref() != Some(artifact.checksum.as_str()) {
                self.history
                    .update_checksum(&mut tx, record.installed_rank, &artifact.checksum)
                    .await?;
                realigned_checksums.push(record.script.clone());
            }
        }

        if removed_failed.is_empty() && realigned_checksums.is_empty() {
            tx.rollback().await?;
            return Err(MigrationError::NoFailedRecord);
        }
        tx.commit().await?;

        info!(
            removed = removed_failed.len(),
            realigned = realigned_checksums.len(),
            "history repaired"
        );
        Ok(RepairReport {
            removed_failed,
            realigned_checksums,
        })
    }

    /// Drop every table, view, and sequence in the configured schema
    ///
    /// Refuses with [`MigrationError::CleanDisabled`] unless the
    /// configuration explicitly enables it. The ledger table goes with the
    /// rest; the next `migrate` starts from scratch.
    pub async fn clean(&self) -> MigrationResult<CleanReport> {
        if self.config.clean_disabled {
            return Err(MigrationError::CleanDisabled);
        }

        let lock = MigrationLock::acquire(&self.pool, &self.config).await?;
        let outcome = self.clean_locked().await;
        let release = lock.release().await;
        let report = outcome?;
        release?;
        Ok(report)
    }

    async fn clean_locked(&self) -> MigrationResult<CleanReport> {
        let schema = self.config.schema_or_default();

        let dropped_views: Vec<String> =
            sqlx::query_scalar("SELECT viewname::text FROM pg_views WHERE schemaname = $1")
                .bind(schema)
                .fetch_all(&self.pool)
                .await?;
        for view in &dropped_views {
            let sql = format!("DROP VIEW IF EXISTS \"{}\".\"{}\" CASCADE", schema, view);
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        let dropped_tables: Vec<String> =
            sqlx::query_scalar("SELECT tablename::text FROM pg_tables WHERE schemaname = $1")
                .bind(schema)
                .fetch_all(&self.pool)
                .await?;
        for table in &dropped_tables {
            let sql = format!("DROP TABLE IF EXISTS \"{}\".\"{}\" CASCADE", schema, table);
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        let dropped_sequences: Vec<String> = sqlx::query_scalar(
            "SELECT sequencename::text FROM pg_sequences WHERE schemaname = $1",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        for sequence in &dropped_sequences {
            let sql = format!("DROP SEQUENCE IF EXISTS \"{}\".\"{}\" CASCADE", schema, sequence);
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        warn!(
            schema,
            tables = dropped_tables.len(),
            views = dropped_views.len(),
            sequences = dropped_sequences.len(),
            "dropped all objects in schema"
        );
        Ok(CleanReport {
            dropped_tables,
            dropped_views,
            dropped_sequences,
        })
    }

    async fn read_history_if_present(&self) -> MigrationResult<Vec<crate::history::AppliedMigration>> {
        if self.history.exists(&self.pool).await? {
            self.history.read_all(&self.pool).await
        } else {
            Ok(Vec::new())
        }
    }

    async fn installed_by(&self) -> MigrationResult<String> {
        match &self.config.installed_by {
            Some(user) => Ok(user.clone()),
            None => self.history.current_user(&self.pool).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlx::PgConnection;
    use std::fs;

    fn lazy_pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/strata_test").unwrap()
    }

    struct SeedAccounts;

    #[async_trait]
    impl CodeMigration for SeedAccounts {
        fn version(&self) -> Option<&str> {
            Some("1")
        }

        fn description(&self) -> &str {
            "seed accounts"
        }

        fn checksum(&self) -> String {
            "seed-accounts-v1".to_string()
        }

        async fn apply(&self, _conn: &mut PgConnection) -> MigrationResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_clean_is_gated_by_default() {
        let migrator = Migrator::new(lazy_pool(), MigrationConfig::default());
        let err = migrator.clean().await.unwrap_err();
        assert_eq!(err.error_code(), "CLEAN_DISABLED");
    }

    #[tokio::test]
    async fn test_resolve_merges_code_migrations() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("V2__add_email.sql"), "SELECT 1;").unwrap();

        let config = MigrationConfig::new(vec![dir.path().to_path_buf()]);
        let migrator =
            Migrator::new(lazy_pool(), config).with_code_migration(Arc::new(SeedAccounts));

        let artifacts = migrator.resolve().unwrap();
        assert_eq!(artifacts.len(), 2);
        let code = artifacts
            .iter()
            .find(|a| a.script == "code:seed accounts")
            .unwrap();
        assert_eq!(code.version.as_ref().unwrap().as_str(), "1");
        assert_eq!(code.checksum, "seed-accounts-v1");
    }

    #[tokio::test]
    async fn test_resolve_rejects_duplicate_version_across_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("V1__init.sql"), "SELECT 1;").unwrap();

        let config = MigrationConfig::new(vec![dir.path().to_path_buf()]);
        let migrator =
            Migrator::new(lazy_pool(), config).with_code_migration(Arc::new(SeedAccounts));

        let err = migrator.resolve().unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_VERSION");
    }
}
