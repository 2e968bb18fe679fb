//! Cluster-wide migration lock
//!
//! Multiple application instances may boot at once and all attempt to
//! migrate. A session-scoped Postgres advisory lock, keyed off the history
//! table name, guarantees at most one execution cluster-wide. The lock is
//! taken before history-table initialization and held through planning and
//! execution; waiters retry with a bounded budget instead of racing.

use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};

/// Guard holding the advisory lock on a dedicated connection
///
/// Release is explicit so it can report unlock failures. If the guard is
/// dropped while still locked, its connection is detached from the pool and
/// closed, which makes the server free the session lock; a warning is logged
/// because that path means some exit was not handled.
pub struct MigrationLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

impl MigrationLock {
    /// Derive the advisory lock key for a history table name
    pub fn key_for(table: &str) -> i64 {
        let digest = Sha256::digest(table.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(bytes)
    }

    /// Acquire the lock, retrying within the configured budget
    pub async fn acquire(pool: &PgPool, config: &MigrationConfig) -> MigrationResult<Self> {
        let key = Self::key_for(&config.qualified_history_table());
        let mut conn = pool.acquire().await?;
        let attempts = config.lock_retry_count.max(1);

        for attempt in 1..=attempts {
            let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
                .bind(key)
                .fetch_one(&mut *conn)
                .await?;
            if locked {
                debug!(key, attempt, "acquired migration lock");
                return Ok(Self {
                    conn: Some(conn),
                    key,
                });
            }
            debug!(
                key,
                attempt, "migration lock held by another session; waiting"
            );
            tokio::time::sleep(config.lock_retry_interval).await;
        }

        Err(MigrationError::LockTimeout { attempts })
    }

    /// Release the lock and return the connection to the pool
    pub async fn release(mut self) -> MigrationResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        match sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                debug!(key = self.key, "released migration lock");
                Ok(())
            }
            Err(err) => {
                // The pool must not get back a connection that still holds
                // the lock; closing the session frees it server-side.
                drop(conn.detach());
                Err(err.into())
            }
        }
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(
                key = self.key,
                "migration lock guard dropped without release; closing its connection"
            );
            drop(conn.detach());
        }
    }
}
