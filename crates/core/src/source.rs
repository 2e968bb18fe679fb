//! Migration source scanning
//!
//! Discovers migration artifacts from the configured locations and parses
//! version, description, and kind out of the file name grammar:
//!
//! ```text
//! V<version>__<description>.sql     versioned, e.g. V1_2__create_users.sql
//! R__<description>.sql              repeatable, e.g. R__rebuild_views.sql
//! ```
//!
//! Prefixes, separator, and suffix are configurable. Underscores in the
//! description read as spaces. Files that carry the SQL suffix but do not
//! parse fail with a naming error instead of being skipped, unless relaxed
//! naming is enabled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::checksum::checksum_sql;
use crate::code::CodeMigration;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::version::MigrationVersion;

/// Directive marking a script as non-transactional
const NO_TRANSACTION_DIRECTIVE: &str = "strata:no-transaction";

/// Kind of a migration artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    /// One-time, strictly ordered change
    Versioned,
    /// Re-applied whenever its checksum changes
    Repeatable,
}

/// Executable payload of a resolved migration
#[derive(Clone)]
pub enum MigrationScript {
    /// Declarative SQL text
    Sql {
        content: String,
        run_in_transaction: bool,
    },
    /// Procedural host-language unit
    Code(Arc<dyn CodeMigration>),
}

impl fmt::Debug for MigrationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationScript::Sql {
                content,
                run_in_transaction,
            } => f
                .debug_struct("Sql")
                .field("bytes", &content.len())
                .field("run_in_transaction", run_in_transaction)
                .finish(),
            MigrationScript::Code(_) => f.write_str("Code(..)"),
        }
    }
}

/// A migration artifact discovered from a location or registered as code
///
/// Immutable once resolved; identity is version (or description for
/// repeatables) plus checksum.
#[derive(Debug, Clone)]
pub struct ResolvedMigration {
    /// Parsed version; `None` for repeatable migrations
    pub version: Option<MigrationVersion>,
    /// Human-readable description
    pub description: String,
    /// Script reference recorded in the ledger (file name or code id)
    pub script: String,
    /// Content checksum
    pub checksum: String,
    /// Versioned or repeatable
    pub kind: MigrationKind,
    /// Executable payload
    pub body: MigrationScript,
}

impl ResolvedMigration {
    /// Whether this artifact re-applies on checksum change
    pub fn is_repeatable(&self) -> bool {
        self.kind == MigrationKind::Repeatable
    }

    /// Whether execution happens inside a wrapping transaction
    pub fn run_in_transaction(&self) -> bool {
        match &self.body {
            MigrationScript::Sql {
                run_in_transaction, ..
            } => *run_in_transaction,
            MigrationScript::Code(code) => code.run_in_transaction(),
        }
    }
}

/// Scan every configured location for SQL migration scripts
///
/// Locations are walked in configuration order, directories recursively,
/// files in name order, so discovery is deterministic. Duplicate detection
/// runs later over the merged artifact set (see [`check_duplicates`]) so it
/// also covers registered code migrations.
pub fn scan(config: &MigrationConfig) -> MigrationResult<Vec<ResolvedMigration>> {
    let mut migrations = Vec::new();

    for location in &config.locations {
        if !location.exists() {
            if config.fail_on_missing_locations {
                return Err(MigrationError::configuration(format!(
                    "migration location '{}' does not exist",
                    location.display()
                )));
            }
            warn!(location = %location.display(), "skipping missing migration location");
            continue;
        }

        let mut files = Vec::new();
        collect_sql_files(location, &mut files)?;
        files.sort();

        for path in files {
            if let Some(migration) = resolve_file(&path, location, config)? {
                migrations.push(migration);
            }
        }
    }

    Ok(migrations)
}

/// Build a [`ResolvedMigration`] from a registered code migration
pub fn resolve_code(code: &Arc<dyn CodeMigration>) -> MigrationResult<ResolvedMigration> {
    let version = match code.version() {
        Some(raw) => Some(MigrationVersion::parse(raw)?),
        None => None,
    };
    let kind = if version.is_some() {
        MigrationKind::Versioned
    } else {
        MigrationKind::Repeatable
    };

    Ok(ResolvedMigration {
        script: format!("code:{}", code.description()),
        description: code.description().to_string(),
        checksum: code.checksum(),
        version,
        kind,
        body: MigrationScript::Code(Arc::clone(code)),
    })
}

/// Reject duplicate versions and duplicate repeatable descriptions
pub fn check_duplicates(migrations: &[ResolvedMigration]) -> MigrationResult<()> {
    let mut versioned: Vec<&ResolvedMigration> = migrations
        .iter()
        .filter(|m| m.kind == MigrationKind::Versioned)
        .collect();
    versioned.sort_by(|a, b| a.version.cmp(&b.version));
    for pair in versioned.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(MigrationError::DuplicateVersion {
                version: pair[0]
                    .version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                first: pair[0].script.clone(),
                second: pair[1].script.clone(),
            });
        }
    }

    let mut repeatable: Vec<&ResolvedMigration> = migrations
        .iter()
        .filter(|m| m.kind == MigrationKind::Repeatable)
        .collect();
    repeatable.sort_by(|a, b| a.description.cmp(&b.description));
    for pair in repeatable.windows(2) {
        if pair[0].description == pair[1].description {
            return Err(MigrationError::DuplicateDescription {
                description: pair[0].description.clone(),
                first: pair[0].script.clone(),
                second: pair[1].script.clone(),
            });
        }
    }

    Ok(())
}

fn collect_sql_files(dir: &Path, out: &mut Vec<PathBuf>) -> MigrationResult<()> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| MigrationError::io(dir.display().to_string(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(dir.display().to_string(), e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_sql_files(&path, out)?;
        } else {
            out.push(path);
        }
    }

    Ok(())
}

fn resolve_file(
    path: &Path,
    location: &Path,
    config: &MigrationConfig,
) -> MigrationResult<Option<ResolvedMigration>> {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => {
            return Err(MigrationError::naming(
                path.display().to_string(),
                "file name is not valid UTF-8",
            ))
        }
    };

    if !file_name.ends_with(&config.sql_suffix) {
        debug!(path = %path.display(), "ignoring non-SQL file");
        return Ok(None);
    }

    let parsed = match parse_file_name(file_name, config) {
        Ok(parsed) => parsed,
        Err(err) if config.relaxed_naming => {
            warn!(path = %path.display(), error = %err, "skipping unparseable migration name");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| MigrationError::io(path.display().to_string(), e))?;
    let run_in_transaction = !has_directive(&content, NO_TRANSACTION_DIRECTIVE);
    let checksum = checksum_sql(&content, config.normalize_line_endings);

    let script = path
        .strip_prefix(location)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();

    Ok(Some(ResolvedMigration {
        kind: if parsed.version.is_some() {
            MigrationKind::Versioned
        } else {
            MigrationKind::Repeatable
        },
        version: parsed.version,
        description: parsed.description,
        script,
        checksum,
        body: MigrationScript::Sql {
            content,
            run_in_transaction,
        },
    }))
}

struct ParsedName {
    version: Option<MigrationVersion>,
    description: String,
}

/// Parse a file name under the strict grammar
fn parse_file_name(file_name: &str, config: &MigrationConfig) -> MigrationResult<ParsedName> {
    let stem = &file_name[..file_name.len() - config.sql_suffix.len()];

    let repeatable_lead = format!("{}{}", config.repeatable_prefix, config.separator);
    if let Some(description) = stem.strip_prefix(&repeatable_lead) {
        if description.is_empty() {
            return Err(MigrationError::naming(file_name, "description is empty"));
        }
        return Ok(ParsedName {
            version: None,
            description: description.replace('_', " "),
        });
    }

    if let Some(rest) = stem.strip_prefix(&config.versioned_prefix) {
        let Some((raw_version, description)) = rest.split_once(&config.separator) else {
            return Err(MigrationError::naming(
                file_name,
                format!(
                    "missing separator '{}' between version and description",
                    config.separator
                ),
            ));
        };
        if description.is_empty() {
            return Err(MigrationError::naming(file_name, "description is empty"));
        }
        let version = MigrationVersion::parse(raw_version).map_err(|e| {
            MigrationError::naming(file_name, e.to_string())
        })?;
        return Ok(ParsedName {
            version: Some(version),
            description: description.replace('_', " "),
        });
    }

    Err(MigrationError::naming(
        file_name,
        format!(
            "expected prefix '{}' or '{}{}'",
            config.versioned_prefix, config.repeatable_prefix, config.separator
        ),
    ))
}

/// Check the script header comments for a directive
///
/// Only lines before the first non-comment content count, so a directive in
/// the body of a script has no effect.
fn has_directive(content: &str, directive: &str) -> bool {
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix("--") {
            if comment.trim() == directive {
                return true;
            }
        } else {
            break;
        }
    }
    false
}
