//! # strata-core: SQL schema migrations for PostgreSQL
//!
//! A library-first migration engine: versioned and repeatable SQL scripts
//! are discovered from filesystem locations, checksummed, and applied in
//! strict version order, with every outcome recorded in a history ledger
//! inside the target database. A cluster-wide advisory lock keeps
//! simultaneously booting application instances from racing each other.
//!
//! ```rust,no_run
//! use strata_core::{MigrationConfig, Migrator};
//!
//! # async fn run() -> strata_core::MigrationResult<()> {
//! let config = MigrationConfig::new(vec!["migrations".into()]);
//! let migrator = Migrator::from_url("postgres://localhost/app", config).await?;
//! let report = migrator.migrate().await?;
//! println!("applied {} migrations", report.applied_count);
//! # Ok(())
//! # }
//! ```
//!
//! Operations map one-to-one onto [`Migrator`] methods: `migrate`,
//! `validate`, `info`, `baseline`, `repair`, and (hard-gated) `clean`.

pub mod checksum;
pub mod code;
pub mod config;
pub mod error;
pub mod history;
pub mod lock;
pub mod migrator;
pub mod placeholder;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod validate;
pub mod version;

// Re-export the core types
pub use code::CodeMigration;
pub use config::MigrationConfig;
pub use error::{MigrationError, MigrationResult};
pub use history::{AppliedMigration, HistoryStore, NewHistoryRecord};
pub use lock::MigrationLock;
pub use migrator::{CleanReport, MigrateReport, Migrator, RepairReport};
pub use resolver::{MigrationInfo, MigrationPlan, MigrationState};
pub use runner::AppliedStep;
pub use source::{MigrationKind, MigrationScript, ResolvedMigration};
pub use validate::{ValidateReport, ValidationFinding, ValidationFindingKind};
pub use version::MigrationVersion;
