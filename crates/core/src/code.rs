//! Procedural migrations written in Rust
//!
//! SQL scripts cover declarative changes; a [`CodeMigration`] covers the
//! cases where migration logic must read live data and branch on it. Code
//! migrations are registered on the [`crate::Migrator`] builder and take
//! part in the same resolution, ordering, and history bookkeeping as SQL
//! scripts. Content is not textual, so implementors supply the checksum
//! themselves and are expected to change it whenever the logic changes.

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::error::MigrationResult;

/// A migration implemented as host-language code
#[async_trait]
pub trait CodeMigration: Send + Sync {
    /// Version for a versioned migration, `None` for a repeatable one
    fn version(&self) -> Option<&str>;

    /// Human-readable description; also keys repeatable migrations
    fn description(&self) -> &str;

    /// Caller-supplied content hash recorded in the history ledger
    fn checksum(&self) -> String;

    /// Whether `apply` runs inside a wrapping transaction
    fn run_in_transaction(&self) -> bool {
        true
    }

    /// Execute the migration against the given connection
    ///
    /// Inside a transaction this is the transaction's connection; on
    /// failure the transaction rolls back before the failure is recorded.
    async fn apply(&self, conn: &mut PgConnection) -> MigrationResult<()>;
}
