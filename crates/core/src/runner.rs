//! Migration execution
//!
//! Runs a plan strictly in order. Each migration executes inside its own
//! transaction together with its history row, so a success commits both and
//! a failure rolls both back; the failure itself is then recorded in a
//! separate transaction so it stays visible. A script can opt out of the
//! wrapping transaction (for statements Postgres refuses to run inside one),
//! accepting partial application on failure.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::history::{HistoryStore, NewHistoryRecord};
use crate::placeholder::apply_placeholders;
use crate::resolver::MigrationPlan;
use crate::source::{MigrationScript, ResolvedMigration};

/// One successfully applied migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedStep {
    pub script: String,
    pub version: Option<String>,
    pub installed_rank: i32,
    pub execution_time_ms: i64,
}

/// Executes a plan against the database
pub(crate) struct MigrationRunner<'a> {
    config: &'a MigrationConfig,
    history: &'a HistoryStore,
    pool: &'a PgPool,
    installed_by: &'a str,
}

impl<'a> MigrationRunner<'a> {
    pub(crate) fn new(
        config: &'a MigrationConfig,
        history: &'a HistoryStore,
        pool: &'a PgPool,
        installed_by: &'a str,
    ) -> Self {
        Self {
            config,
            history,
            pool,
            installed_by,
        }
    }

    /// Run every step, stopping at the first failure
    ///
    /// The failure is durably recorded with `success = false` before the
    /// error propagates; later steps are never attempted.
    pub(crate) async fn run(&self, plan: &MigrationPlan) -> MigrationResult<Vec<AppliedStep>> {
        let mut applied = Vec::new();

        for migration in &plan.steps {
            info!(script = %migration.script, "applying migration");
            let started = Instant::now();

            let result = if migration.run_in_transaction() {
                self.apply_in_transaction(migration).await
            } else {
                self.apply_without_transaction(migration).await
            };

            match result {
                Ok(step) => {
                    debug!(
                        script = %step.script,
                        rank = step.installed_rank,
                        elapsed_ms = step.execution_time_ms,
                        "migration applied"
                    );
                    applied.push(step);
                }
                Err(err) => {
                    // Only a failure at the database layer leaves a ledger
                    // row; errors raised before execution (an unresolved
                    // placeholder) abort without dirtying the history.
                    if matches!(
                        err,
                        MigrationError::Execution { .. } | MigrationError::Database(_)
                    ) {
                        let elapsed = started.elapsed().as_millis() as i64;
                        warn!(script = %migration.script, "migration failed; recording failure and stopping");
                        self.record_failure(migration, elapsed).await;
                    }
                    return Err(err);
                }
            }
        }

        Ok(applied)
    }

    async fn apply_in_transaction(
        &self,
        migration: &ResolvedMigration,
    ) -> MigrationResult<AppliedStep> {
        let mut tx = self.pool.begin().await?;
        let started = Instant::now();
        self.execute_body(&mut tx, migration).await?;
        let execution_time_ms = started.elapsed().as_millis() as i64;

        let record =
            NewHistoryRecord::for_migration(migration, self.installed_by, execution_time_ms, true);
        let installed_rank = self.history.append(&mut tx, &record).await?;
        tx.commit().await?;

        Ok(AppliedStep {
            script: migration.script.clone(),
            version: migration.version.as_ref().map(|v| v.to_string()),
            installed_rank,
            execution_time_ms,
        })
    }

    async fn apply_without_transaction(
        &self,
        migration: &ResolvedMigration,
    ) -> MigrationResult<AppliedStep> {
        let mut conn = self.pool.acquire().await?;
        let started = Instant::now();
        self.execute_body(&mut conn, migration).await?;
        let execution_time_ms = started.elapsed().as_millis() as i64;

        let record =
            NewHistoryRecord::for_migration(migration, self.installed_by, execution_time_ms, true);
        let mut tx = self.pool.begin().await?;
        let installed_rank = self.history.append(&mut tx, &record).await?;
        tx.commit().await?;

        Ok(AppliedStep {
            script: migration.script.clone(),
            version: migration.version.as_ref().map(|v| v.to_string()),
            installed_rank,
            execution_time_ms,
        })
    }

    async fn execute_body(
        &self,
        conn: &mut PgConnection,
        migration: &ResolvedMigration,
    ) -> MigrationResult<()> {
        match &migration.body {
            MigrationScript::Sql { content, .. } => {
                let sql = apply_placeholders(content, self.config, &migration.script)?;
                for statement in split_sql_statements(&sql) {
                    sqlx::query(&statement)
                        .execute(&mut *conn)
                        .await
                        .map_err(|e| MigrationError::Execution {
                            script: migration.script.clone(),
                            statement: truncate_statement(&statement),
                            source: e,
                        })?;
                }
                Ok(())
            }
            MigrationScript::Code(code) => code.apply(conn).await,
        }
    }

    /// Record a failed run in its own transaction, best effort
    async fn record_failure(&self, migration: &ResolvedMigration, execution_time_ms: i64) {
        let record =
            NewHistoryRecord::for_migration(migration, self.installed_by, execution_time_ms, false);
        let outcome: MigrationResult<()> = async {
            let mut tx = self.pool.begin().await?;
            self.history.append(&mut tx, &record).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(err) = outcome {
            warn!(script = %migration.script, error = %err, "could not record migration failure");
        }
    }
}

/// Split a script into executable statements
///
/// Parses with sqlparser first so semicolons inside literals and bodies
/// survive; falls back to naive splitting when the dialect refuses the
/// script, matching what the database will ultimately judge anyway.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|s| format!("{};", s)).collect(),
        Err(err) => {
            warn!(error = %err, "SQL parsing failed, using naive semicolon splitting");
            sql.split(';')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

fn truncate_statement(statement: &str) -> String {
    const MAX: usize = 200;
    if statement.len() <= MAX {
        statement.to_string()
    } else {
        let mut end = MAX;
        while !statement.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &statement[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multiple_statements() {
        let statements = split_sql_statements(
            "CREATE TABLE users (id INT); ALTER TABLE users ADD COLUMN email TEXT;",
        );
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("ALTER TABLE"));
        assert!(statements.iter().all(|s| s.ends_with(';')));
    }

    #[test]
    fn test_split_preserves_semicolons_in_literals() {
        let statements =
            split_sql_statements("INSERT INTO notes (body) VALUES ('a; b'); SELECT 1;");
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("'a; b'"));
    }

    #[test]
    fn test_split_falls_back_on_unparseable_sql() {
        let statements =
            split_sql_statements("CREATE INDEX CONCURRENTLY IF NOT EXISTS $$weird$$; SELECT 1");
        assert!(!statements.is_empty());
        assert!(statements.iter().all(|s| s.ends_with(';')));
    }

    #[test]
    fn test_split_skips_empty_fragments() {
        let statements = split_sql_statements("  ;;  ");
        assert!(statements.is_empty());
    }

    #[test]
    fn test_truncate_statement() {
        let short = truncate_statement("SELECT 1;");
        assert_eq!(short, "SELECT 1;");

        let long = truncate_statement(&"x".repeat(500));
        assert!(long.len() < 500);
        assert!(long.ends_with("..."));
    }
}
