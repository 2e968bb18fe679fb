//! Standalone validation
//!
//! A read-only pass comparing the ledger against the resolved artifacts.
//! Unlike planning, validation never stops at the first problem: the report
//! carries one finding per drifted, missing, future, or failed migration, so
//! an operator sees the whole damage at once. `migrate` runs the same pass
//! up front when validate-on-migrate is enabled and surfaces the dominant
//! finding as its error.

use serde::{Deserialize, Serialize};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::history::AppliedMigration;
use crate::resolver;
use crate::source::ResolvedMigration;

/// What a validation finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFindingKind {
    /// Ledger checksum differs from the resolved artifact
    ChecksumMismatch,
    /// Applied migration that no location resolves anymore
    Missing,
    /// Applied version newer than anything resolved
    Future,
    /// Failed row still in the ledger; repair has not been run
    PendingRepair,
}

/// A single validation problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: ValidationFindingKind,
    pub script: String,
    pub version: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub detail: String,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateReport {
    pub findings: Vec<ValidationFinding>,
    /// Applied migrations that were compared against a resolved artifact
    pub validated_count: usize,
}

impl ValidateReport {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }

    /// Collapse the report into the dominant error for abort-style callers
    ///
    /// Failed rows outrank drift, drift outranks missing, missing outranks
    /// future. `None` when the report is clean.
    pub fn into_error(self) -> Option<MigrationError> {
        if let Some(finding) = self
            .findings
            .iter()
            .find(|f| f.kind == ValidationFindingKind::PendingRepair)
        {
            return Some(MigrationError::PriorFailure {
                script: finding.script.clone(),
            });
        }
        if let Some(finding) = self
            .findings
            .iter()
            .find(|f| f.kind == ValidationFindingKind::ChecksumMismatch)
        {
            return Some(MigrationError::Validation {
                script: finding.script.clone(),
                expected: finding.expected.clone(),
                actual: finding.actual.clone(),
            });
        }
        let missing: Vec<String> = self
            .findings
            .iter()
            .filter(|f| f.kind == ValidationFindingKind::Missing)
            .map(|f| f.script.clone())
            .collect();
        if !missing.is_empty() {
            return Some(MigrationError::MissingMigration { scripts: missing });
        }
        let future: Vec<String> = self
            .findings
            .iter()
            .filter(|f| f.kind == ValidationFindingKind::Future)
            .filter_map(|f| f.version.clone())
            .collect();
        if !future.is_empty() {
            return Some(MigrationError::FutureMigration { versions: future });
        }
        None
    }
}

/// Compare resolved artifacts against the ledger
pub fn validate(
    artifacts: &[ResolvedMigration],
    history: &[AppliedMigration],
    config: &MigrationConfig,
) -> MigrationResult<ValidateReport> {
    let analysis = resolver::analyze(history)?;
    let mut findings = Vec::new();
    let mut validated_count = 0;

    for record in &analysis.failed {
        findings.push(ValidationFinding {
            kind: ValidationFindingKind::PendingRepair,
            script: record.script.clone(),
            version: record.version.clone(),
            expected: None,
            actual: None,
            detail: format!(
                "migration '{}' failed on a previous run; repair the history before migrating",
                record.script
            ),
        });
    }

    for artifact in artifacts.iter().filter(|a| !a.is_repeatable()) {
        let Some(version) = artifact.version.as_ref() else {
            continue;
        };
        if let Some(record) = analysis.applied_versioned.get(version) {
            validated_count += 1;
            if record.checksum.as_deref() != Some(artifact.checksum.as_str()) {
                findings.push(ValidationFinding {
                    kind: ValidationFindingKind::ChecksumMismatch,
                    script: artifact.script.clone(),
                    version: Some(version.to_string()),
                    expected: record.checksum.clone(),
                    actual: Some(artifact.checksum.clone()),
                    detail: format!(
                        "checksum of '{}' changed after it was applied",
                        artifact.script
                    ),
                });
            }
        }
    }

    for artifact in artifacts.iter().filter(|a| a.is_repeatable()) {
        if analysis
            .latest_repeatable
            .contains_key(artifact.description.as_str())
        {
            // A differing checksum is a pending re-run, not drift.
            validated_count += 1;
        }
    }

    let (missing, future) = resolver::unresolved_records(artifacts, &analysis);
    if !config.ignore_missing {
        for script in missing {
            findings.push(ValidationFinding {
                kind: ValidationFindingKind::Missing,
                detail: format!("applied migration '{}' is no longer resolved", script),
                script,
                version: None,
                expected: None,
                actual: None,
            });
        }
    }
    if !config.ignore_future {
        for version in future {
            findings.push(ValidationFinding {
                kind: ValidationFindingKind::Future,
                script: String::new(),
                detail: format!("applied version {} is newer than any resolved migration", version),
                version: Some(version),
                expected: None,
                actual: None,
            });
        }
    }

    Ok(ValidateReport {
        findings,
        validated_count,
    })
}
