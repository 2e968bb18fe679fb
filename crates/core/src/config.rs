//! Engine configuration
//!
//! A plain value struct consumed by every stage of the engine. Defaults are
//! safe for production: validation on, out-of-order off, clean disabled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Ordered directories scanned for migration scripts
    pub locations: Vec<PathBuf>,
    /// Schema holding the history table and targeted by `clean`
    pub schema: Option<String>,
    /// Name of the history table
    pub history_table: String,
    /// Version recorded by `baseline`
    pub baseline_version: String,
    /// Description recorded by `baseline`
    pub baseline_description: String,
    /// Run the validator before planning inside `migrate`
    pub validate_on_migrate: bool,
    /// Baseline a non-empty schema with an empty ledger on the first migrate
    pub baseline_on_migrate: bool,
    /// Allow pending versions behind the applied frontier
    pub out_of_order: bool,
    /// Tolerate applied migrations whose scripts are no longer resolved
    pub ignore_missing: bool,
    /// Tolerate applied versions newer than anything resolved
    pub ignore_future: bool,
    /// Placeholder values substituted into SQL scripts before execution
    pub placeholders: HashMap<String, String>,
    /// Placeholder opening token
    pub placeholder_prefix: String,
    /// Placeholder closing token
    pub placeholder_suffix: String,
    /// Disable substitution entirely (scripts run verbatim)
    pub placeholder_replacement: bool,
    /// Hard gate: `clean` refuses to run while this is set
    pub clean_disabled: bool,
    /// Advisory lock acquisition attempts before giving up
    pub lock_retry_count: u32,
    /// Delay between lock acquisition attempts
    pub lock_retry_interval: Duration,
    /// File name prefix for versioned migrations
    pub versioned_prefix: String,
    /// File name prefix for repeatable migrations
    pub repeatable_prefix: String,
    /// Separator between version/prefix and description
    pub separator: String,
    /// Suffix identifying SQL scripts
    pub sql_suffix: String,
    /// Log and skip unparseable file names instead of failing
    pub relaxed_naming: bool,
    /// Fail when a configured location does not exist
    pub fail_on_missing_locations: bool,
    /// Fold CRLF/CR to LF before checksumming SQL content
    pub normalize_line_endings: bool,
    /// Recorded as `installed_by`; defaults to the database user
    pub installed_by: Option<String>,
}

impl MigrationConfig {
    /// Create a configuration scanning the given locations, defaults elsewhere
    pub fn new(locations: Vec<PathBuf>) -> Self {
        Self {
            locations,
            ..Self::default()
        }
    }

    /// The history table name qualified with the configured schema
    pub fn qualified_history_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("\"{}\".\"{}\"", schema, self.history_table),
            None => format!("\"{}\"", self.history_table),
        }
    }

    /// Schema that `clean` and `installed_by` lookups operate on
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            locations: vec![PathBuf::from("migrations")],
            schema: None,
            history_table: "strata_history".to_string(),
            baseline_version: "1".to_string(),
            baseline_description: "<< baseline >>".to_string(),
            validate_on_migrate: true,
            baseline_on_migrate: false,
            out_of_order: false,
            ignore_missing: false,
            ignore_future: true,
            placeholders: HashMap::new(),
            placeholder_prefix: "${".to_string(),
            placeholder_suffix: "}".to_string(),
            placeholder_replacement: true,
            clean_disabled: true,
            lock_retry_count: 40,
            lock_retry_interval: Duration::from_millis(250),
            versioned_prefix: "V".to_string(),
            repeatable_prefix: "R".to_string(),
            separator: "__".to_string(),
            sql_suffix: ".sql".to_string(),
            relaxed_naming: false,
            fail_on_missing_locations: true,
            normalize_line_endings: true,
            installed_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_production_safe() {
        let config = MigrationConfig::default();
        assert!(config.validate_on_migrate);
        assert!(!config.baseline_on_migrate);
        assert!(!config.out_of_order);
        assert!(!config.ignore_missing);
        assert!(config.ignore_future);
        assert!(config.clean_disabled);
        assert!(config.placeholder_replacement);
    }

    #[test]
    fn test_qualified_history_table() {
        let mut config = MigrationConfig::default();
        assert_eq!(config.qualified_history_table(), "\"strata_history\"");

        config.schema = Some("app".to_string());
        assert_eq!(config.qualified_history_table(), "\"app\".\"strata_history\"");
        assert_eq!(config.schema_or_default(), "app");
    }

    #[test]
    fn test_new_keeps_defaults() {
        let config = MigrationConfig::new(vec![PathBuf::from("db/migrations")]);
        assert_eq!(config.locations, vec![PathBuf::from("db/migrations")]);
        assert_eq!(config.history_table, "strata_history");
        assert_eq!(config.lock_retry_count, 40);
    }
}
