//! Migration error types
//!
//! Every failure mode of the engine surfaces as a [`MigrationError`] carrying
//! the offending artifact identity and values, so callers never have to parse
//! message strings to find out what went wrong.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors produced by scanning, planning, executing, and validating migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration file name does not follow the naming grammar
    #[error("invalid migration file name '{path}': {reason}")]
    Naming { path: String, reason: String },

    /// Two versioned migrations share the same version
    #[error("found more than one migration with version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    /// Two repeatable migrations share the same description
    #[error("found more than one repeatable migration with description '{description}': '{first}' and '{second}'")]
    DuplicateDescription {
        description: String,
        first: String,
        second: String,
    },

    /// A version string does not parse under the version grammar
    #[error("invalid migration version '{raw}': {reason}")]
    InvalidVersion { raw: String, reason: String },

    /// Checksum or metadata drift between an applied migration and its script
    #[error("validation failed for '{script}': applied checksum {expected:?} does not match resolved checksum {actual:?}")]
    Validation {
        script: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// The history contains a failed migration that has not been repaired
    #[error("detected failed migration '{script}'; run repair before retrying")]
    PriorFailure { script: String },

    /// A pending version sits behind the applied frontier and out-of-order
    /// execution is not enabled
    #[error("detected out-of-order pending migration {version} behind applied version {frontier}")]
    OutOfOrder { version: String, frontier: String },

    /// Applied migrations that no configured location resolves anymore
    #[error("applied migrations missing from configured locations: {scripts:?}")]
    MissingMigration { scripts: Vec<String> },

    /// Applied versions newer than anything the locations resolve
    #[error("history contains versions newer than any resolved migration: {versions:?}")]
    FutureMigration { versions: Vec<String> },

    /// A placeholder in a script has no configured value and no default
    #[error("unresolved placeholder '{key}' in '{script}'")]
    UnresolvedPlaceholder { key: String, script: String },

    /// The advisory lock could not be acquired within the retry budget
    #[error("could not acquire migration lock after {attempts} attempts")]
    LockTimeout { attempts: u32 },

    /// Repair was requested but the history holds nothing to repair
    #[error("no failed migration records found to repair")]
    NoFailedRecord,

    /// A migration script failed at the database layer
    #[error("migration '{script}' failed while executing `{statement}`: {source}")]
    Execution {
        script: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// Clean is refused unless explicitly enabled in the configuration
    #[error("clean is disabled; enable it explicitly before dropping schema objects")]
    CleanDisabled,

    /// Invalid or inconsistent engine configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A migration file could not be read
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other database error outside script execution
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MigrationError {
    /// Create a naming error for the given path
    pub fn naming(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Naming {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an io error for the given path
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code identifying the error class
    pub fn error_code(&self) -> &'static str {
        match self {
            MigrationError::Naming { .. } => "NAMING",
            MigrationError::DuplicateVersion { .. } => "DUPLICATE_VERSION",
            MigrationError::DuplicateDescription { .. } => "DUPLICATE_DESCRIPTION",
            MigrationError::InvalidVersion { .. } => "INVALID_VERSION",
            MigrationError::Validation { .. } => "VALIDATION",
            MigrationError::PriorFailure { .. } => "PRIOR_FAILURE",
            MigrationError::OutOfOrder { .. } => "OUT_OF_ORDER",
            MigrationError::MissingMigration { .. } => "MISSING_MIGRATION",
            MigrationError::FutureMigration { .. } => "FUTURE_MIGRATION",
            MigrationError::UnresolvedPlaceholder { .. } => "UNRESOLVED_PLACEHOLDER",
            MigrationError::LockTimeout { .. } => "LOCK_TIMEOUT",
            MigrationError::NoFailedRecord => "NO_FAILED_RECORD",
            MigrationError::Execution { .. } => "EXECUTION",
            MigrationError::CleanDisabled => "CLEAN_DISABLED",
            MigrationError::Configuration { .. } => "CONFIGURATION",
            MigrationError::Io { .. } => "IO",
            MigrationError::Database(_) => "DATABASE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MigrationError::naming("V__x.sql", "missing version").error_code(),
            "NAMING"
        );
        assert_eq!(MigrationError::NoFailedRecord.error_code(), "NO_FAILED_RECORD");
        assert_eq!(MigrationError::CleanDisabled.error_code(), "CLEAN_DISABLED");
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = MigrationError::Validation {
            script: "V1__create_users.sql".to_string(),
            expected: Some("abc".to_string()),
            actual: Some("def".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("V1__create_users.sql"));
        assert!(message.contains("abc"));
        assert!(message.contains("def"));

        let err = MigrationError::OutOfOrder {
            version: "3".to_string(),
            frontier: "5".to_string(),
        };
        assert!(err.to_string().contains("out-of-order"));
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: MigrationError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.error_code(), "DATABASE");
    }
}
