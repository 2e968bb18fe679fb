//! Resolution and planning
//!
//! Reconciles the resolved artifacts against the history ledger: classifies
//! every migration, rejects drift and policy violations, and produces the
//! ordered execution plan. Planning is a pure function of its inputs, so the
//! whole policy surface is testable without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MigrationConfig;
use crate::error::{MigrationError, MigrationResult};
use crate::history::{AppliedMigration, KIND_CODE, KIND_SQL};
use crate::source::{MigrationScript, ResolvedMigration};
use crate::version::MigrationVersion;

/// Classification of a migration relative to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Resolved, not yet applied
    Pending,
    /// Applied successfully
    Applied,
    /// Applied and failed; blocks further runs until repaired
    Failed,
    /// Applied but no configured location resolves it anymore
    Missing,
    /// Resolved but excluded (at or below the baseline)
    Ignored,
    /// Applied by a newer tree than the one currently resolved
    Future,
    /// The synthetic baseline marker
    Baseline,
    /// Repeatable row superseded by newer content
    Outdated,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MigrationState::Pending => "pending",
            MigrationState::Applied => "applied",
            MigrationState::Failed => "failed",
            MigrationState::Missing => "missing",
            MigrationState::Ignored => "ignored",
            MigrationState::Future => "future",
            MigrationState::Baseline => "baseline",
            MigrationState::Outdated => "outdated",
        };
        f.write_str(label)
    }
}

/// One line of the `info` view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: Option<String>,
    pub description: String,
    pub kind: String,
    pub script: String,
    pub state: MigrationState,
    pub installed_rank: Option<i32>,
    pub installed_on: Option<DateTime<Utc>>,
    pub installed_by: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub checksum: Option<String>,
}

/// Ordered execution plan produced by [`plan`]
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Versioned migrations ascending, then repeatables by description
    pub steps: Vec<ResolvedMigration>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Parsed view of the history ledger, shared with the validator
pub(crate) struct Analysis<'a> {
    pub(crate) baseline: Option<(MigrationVersion, &'a AppliedMigration)>,
    pub(crate) failed: Vec<&'a AppliedMigration>,
    pub(crate) applied_versioned: BTreeMap<MigrationVersion, &'a AppliedMigration>,
    pub(crate) latest_repeatable: HashMap<&'a str, &'a AppliedMigration>,
    pub(crate) frontier: Option<MigrationVersion>,
}

pub(crate) fn analyze(history: &[AppliedMigration]) -> MigrationResult<Analysis<'_>> {
    let mut baseline: Option<(MigrationVersion, &AppliedMigration)> = None;
    let mut failed = Vec::new();
    let mut applied_versioned = BTreeMap::new();
    let mut latest_repeatable: HashMap<&str, &AppliedMigration> = HashMap::new();

    for record in history {
        if !record.success {
            failed.push(record);
            continue;
        }
        if record.is_baseline() {
            let version = parse_recorded_version(record)?;
            match &baseline {
                Some((current, _)) if *current >= version => {}
                _ => baseline = Some((version, record)),
            }
            continue;
        }
        match &record.version {
            Some(_) => {
                let version = parse_recorded_version(record)?;
                applied_versioned.insert(version, record);
            }
            // Rank order makes the last insert win: the most recent applied
            // row for a description is the one repeatables compare against.
            None => {
                latest_repeatable.insert(record.description.as_str(), record);
            }
        }
    }

    let frontier = applied_versioned
        .keys()
        .last()
        .cloned()
        .into_iter()
        .chain(baseline.as_ref().map(|(v, _)| v.clone()))
        .max();

    Ok(Analysis {
        baseline,
        failed,
        applied_versioned,
        latest_repeatable,
        frontier,
    })
}

fn parse_recorded_version(record: &AppliedMigration) -> MigrationResult<MigrationVersion> {
    let raw = record.version.as_deref().ok_or_else(|| {
        MigrationError::configuration(format!(
            "history row {} ('{}') has no version",
            record.installed_rank, record.script
        ))
    })?;
    MigrationVersion::parse(raw)
}

/// Produce the ordered execution plan
///
/// `check_checksums` mirrors the validate-on-migrate switch: when false,
/// checksum drift between a matched artifact and its row is tolerated, every
/// other policy still applies.
pub fn plan(
    artifacts: &[ResolvedMigration],
    history: &[AppliedMigration],
    config: &MigrationConfig,
    check_checksums: bool,
) -> MigrationResult<MigrationPlan> {
    let analysis = analyze(history)?;

    if let Some(record) = analysis.failed.first() {
        return Err(MigrationError::PriorFailure {
            script: record.script.clone(),
        });
    }

    let baseline_version = analysis.baseline.as_ref().map(|(v, _)| v);

    let mut pending: Vec<&ResolvedMigration> = Vec::new();
    for artifact in artifacts.iter().filter(|a| !a.is_repeatable()) {
        let version = artifact_version(artifact)?;
        if let Some(record) = analysis.applied_versioned.get(version) {
            if check_checksums && record.checksum.as_deref() != Some(artifact.checksum.as_str()) {
                return Err(MigrationError::Validation {
                    script: artifact.script.clone(),
                    expected: record.checksum.clone(),
                    actual: Some(artifact.checksum.clone()),
                });
            }
            continue;
        }
        if baseline_version.is_some_and(|baseline| version <= baseline) {
            continue;
        }
        pending.push(artifact);
    }
    pending.sort_by(|a, b| a.version.cmp(&b.version));

    if let Some(frontier) = &analysis.frontier {
        for artifact in &pending {
            let version = artifact_version(artifact)?;
            if version < frontier && !config.out_of_order {
                return Err(MigrationError::OutOfOrder {
                    version: version.to_string(),
                    frontier: frontier.to_string(),
                });
            }
        }
    }

    // Repeatables run after every versioned migration, alphabetically, and
    // only when their content is new to the database.
    let mut repeatable: Vec<&ResolvedMigration> = artifacts
        .iter()
        .filter(|a| a.is_repeatable())
        .filter(|a| {
            match analysis.latest_repeatable.get(a.description.as_str()) {
                Some(record) => record.checksum.as_deref() != Some(a.checksum.as_str()),
                None => true,
            }
        })
        .collect();
    repeatable.sort_by(|a, b| a.description.cmp(&b.description));

    let (missing, future) = unresolved_records(artifacts, &analysis);
    if !missing.is_empty() && !config.ignore_missing {
        return Err(MigrationError::MissingMigration { scripts: missing });
    }
    if !future.is_empty() && !config.ignore_future {
        return Err(MigrationError::FutureMigration { versions: future });
    }

    let steps = pending
        .into_iter()
        .chain(repeatable)
        .cloned()
        .collect::<Vec<_>>();

    Ok(MigrationPlan { steps })
}

fn artifact_version<'a>(artifact: &'a ResolvedMigration) -> MigrationResult<&'a MigrationVersion> {
    artifact.version.as_ref().ok_or_else(|| {
        MigrationError::configuration(format!(
            "versioned migration '{}' has no version",
            artifact.script
        ))
    })
}

/// Applied rows that no artifact resolves, split into missing and future
pub(crate) fn unresolved_records(
    artifacts: &[ResolvedMigration],
    analysis: &Analysis<'_>,
) -> (Vec<String>, Vec<String>) {
    let resolved: BTreeSet<&MigrationVersion> = artifacts
        .iter()
        .filter_map(|a| a.version.as_ref())
        .collect();
    let max_resolved = resolved.iter().last().copied();
    let resolved_descriptions: BTreeSet<&str> = artifacts
        .iter()
        .filter(|a| a.is_repeatable())
        .map(|a| a.description.as_str())
        .collect();

    let mut missing = Vec::new();
    let mut future = Vec::new();
    for (version, record) in &analysis.applied_versioned {
        if resolved.contains(version) {
            continue;
        }
        if max_resolved.map_or(true, |max| version > max) {
            future.push(version.to_string());
        } else {
            missing.push(record.script.clone());
        }
    }
    for (description, record) in &analysis.latest_repeatable {
        if !resolved_descriptions.contains(description) {
            missing.push(record.script.clone());
        }
    }
    missing.sort();
    future.sort();
    (missing, future)
}

/// Classify every artifact and ledger row for the `info` view
///
/// Ledger rows come first in rank order, then pending migrations in
/// execution order. Policy flags do not affect classification; they only
/// decide what `plan` and `validate` treat as an error.
pub fn info(
    artifacts: &[ResolvedMigration],
    history: &[AppliedMigration],
) -> MigrationResult<Vec<MigrationInfo>> {
    let analysis = analyze(history)?;
    let baseline_version = analysis.baseline.as_ref().map(|(v, _)| v);

    let by_version: HashMap<&MigrationVersion, &ResolvedMigration> = artifacts
        .iter()
        .filter_map(|a| a.version.as_ref().map(|v| (v, a)))
        .collect();
    let repeatable_by_description: HashMap<&str, &ResolvedMigration> = artifacts
        .iter()
        .filter(|a| a.is_repeatable())
        .map(|a| (a.description.as_str(), a))
        .collect();

    let mut rows = Vec::new();
    for record in history {
        let state = if !record.success {
            MigrationState::Failed
        } else if record.is_baseline() {
            MigrationState::Baseline
        } else if let Some(raw) = &record.version {
            let version = MigrationVersion::parse(raw)?;
            if by_version.contains_key(&version) {
                MigrationState::Applied
            } else if artifacts
                .iter()
                .filter_map(|a| a.version.as_ref())
                .all(|v| *v < version)
            {
                MigrationState::Future
            } else {
                MigrationState::Missing
            }
        } else {
            match repeatable_by_description.get(record.description.as_str()) {
                Some(artifact) => {
                    let latest = analysis
                        .latest_repeatable
                        .get(record.description.as_str())
                        .map(|r| r.installed_rank);
                    if latest != Some(record.installed_rank)
                        || record.checksum.as_deref() != Some(artifact.checksum.as_str())
                    {
                        MigrationState::Outdated
                    } else {
                        MigrationState::Applied
                    }
                }
                None => MigrationState::Missing,
            }
        };

        rows.push(MigrationInfo {
            version: record.version.clone(),
            description: record.description.clone(),
            kind: record.kind.clone(),
            script: record.script.clone(),
            state,
            installed_rank: Some(record.installed_rank),
            installed_on: Some(record.installed_on),
            installed_by: Some(record.installed_by.clone()),
            execution_time_ms: Some(record.execution_time_ms),
            checksum: record.checksum.clone(),
        });
    }

    // Pending entries: versioned first in version order, then repeatables.
    let failed_versions: BTreeSet<&str> = analysis
        .failed
        .iter()
        .filter_map(|r| r.version.as_deref())
        .collect();

    let mut versioned: Vec<&ResolvedMigration> = artifacts
        .iter()
        .filter(|a| !a.is_repeatable())
        .collect();
    versioned.sort_by(|a, b| a.version.cmp(&b.version));
    for artifact in versioned {
        let version = artifact_version(artifact)?;
        if analysis.applied_versioned.contains_key(version) {
            continue;
        }
        if failed_versions.contains(version.as_str()) {
            continue;
        }
        let state = if baseline_version.is_some_and(|baseline| version <= baseline) {
            MigrationState::Ignored
        } else {
            MigrationState::Pending
        };
        rows.push(pending_info(artifact, state));
    }

    let mut repeatable: Vec<&ResolvedMigration> =
        artifacts.iter().filter(|a| a.is_repeatable()).collect();
    repeatable.sort_by(|a, b| a.description.cmp(&b.description));
    for artifact in repeatable {
        let rerun = match analysis.latest_repeatable.get(artifact.description.as_str()) {
            Some(record) => record.checksum.as_deref() != Some(artifact.checksum.as_str()),
            None => true,
        };
        if rerun {
            rows.push(pending_info(artifact, MigrationState::Pending));
        }
    }

    Ok(rows)
}

fn pending_info(artifact: &ResolvedMigration, state: MigrationState) -> MigrationInfo {
    let kind = match &artifact.body {
        MigrationScript::Sql { .. } => KIND_SQL,
        MigrationScript::Code(_) => KIND_CODE,
    };
    MigrationInfo {
        version: artifact.version.as_ref().map(|v| v.to_string()),
        description: artifact.description.clone(),
        kind: kind.to_string(),
        script: artifact.script.clone(),
        state,
        installed_rank: None,
        installed_on: None,
        installed_by: None,
        execution_time_ms: None,
        checksum: Some(artifact.checksum.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MigrationKind;

    fn sql_artifact(version: Option<&str>, description: &str, checksum: &str) -> ResolvedMigration {
        let script = match version {
            Some(v) => format!("V{}__{}.sql", v, description.replace(' ', "_")),
            None => format!("R__{}.sql", description.replace(' ', "_")),
        };
        ResolvedMigration {
            version: version.map(|v| MigrationVersion::parse(v).unwrap()),
            description: description.to_string(),
            script,
            checksum: checksum.to_string(),
            kind: if version.is_some() {
                MigrationKind::Versioned
            } else {
                MigrationKind::Repeatable
            },
            body: MigrationScript::Sql {
                content: format!("-- {description}"),
                run_in_transaction: true,
            },
        }
    }

    fn applied(
        rank: i32,
        version: Option<&str>,
        description: &str,
        checksum: Option<&str>,
        success: bool,
    ) -> AppliedMigration {
        let script = match version {
            Some(v) => format!("V{}__{}.sql", v, description.replace(' ', "_")),
            None => format!("R__{}.sql", description.replace(' ', "_")),
        };
        AppliedMigration {
            installed_rank: rank,
            version: version.map(|v| v.to_string()),
            description: description.to_string(),
            kind: "sql".to_string(),
            script,
            checksum: checksum.map(|c| c.to_string()),
            installed_by: "tester".to_string(),
            installed_on: Utc::now(),
            execution_time_ms: 5,
            success,
        }
    }

    fn baseline_row(rank: i32, version: &str) -> AppliedMigration {
        AppliedMigration {
            kind: "baseline".to_string(),
            script: "<< baseline >>".to_string(),
            checksum: None,
            ..applied(rank, Some(version), "<< baseline >>", None, true)
        }
    }

    fn versions(plan: &MigrationPlan) -> Vec<String> {
        plan.steps
            .iter()
            .map(|m| match &m.version {
                Some(v) => v.to_string(),
                None => format!("R:{}", m.description),
            })
            .collect()
    }

    #[test]
    fn test_plan_orders_versions_ascending() {
        let artifacts = vec![
            sql_artifact(Some("10"), "ten", "j"),
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let plan = plan(&artifacts, &[], &MigrationConfig::default(), true).unwrap();
        assert_eq!(versions(&plan), vec!["1", "2", "10"]);
    }

    #[test]
    fn test_plan_is_idempotent_when_nothing_changed() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let history = vec![
            applied(1, Some("1"), "one", Some("a"), true),
            applied(2, Some("2"), "two", Some("b"), true),
        ];
        let plan = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_checksum_drift_aborts_before_later_migrations() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "edited"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let history = vec![applied(1, Some("1"), "one", Some("a"), true)];

        let err = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap_err();
        match err {
            MigrationError::Validation {
                script,
                expected,
                actual,
            } => {
                assert_eq!(script, "V1__one.sql");
                assert_eq!(expected.as_deref(), Some("a"));
                assert_eq!(actual.as_deref(), Some("edited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_checksum_drift_tolerated_when_validation_disabled() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "edited"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let history = vec![applied(1, Some("1"), "one", Some("a"), true)];

        let plan = plan(&artifacts, &history, &MigrationConfig::default(), false).unwrap();
        assert_eq!(versions(&plan), vec!["2"]);
    }

    #[test]
    fn test_prior_failure_blocks_planning() {
        let artifacts = vec![sql_artifact(Some("2"), "two", "b")];
        let history = vec![
            applied(1, Some("1"), "one", Some("a"), true),
            applied(2, Some("2"), "two", Some("b"), false),
        ];
        let err = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap_err();
        assert_eq!(err.error_code(), "PRIOR_FAILURE");
        assert!(err.to_string().contains("V2__two.sql"));
    }

    #[test]
    fn test_repaired_failure_becomes_pending_again() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let history = vec![
            applied(1, Some("1"), "one", Some("a"), true),
            applied(2, Some("2"), "two", Some("b"), false),
        ];
        let err = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap_err();
        assert_eq!(err.error_code(), "PRIOR_FAILURE");

        // After repair deletes the failed row, exactly that migration is
        // pending again.
        let repaired: Vec<AppliedMigration> =
            history.into_iter().filter(|r| r.success).collect();
        let plan = plan(&artifacts, &repaired, &MigrationConfig::default(), true).unwrap();
        assert_eq!(versions(&plan), vec!["2"]);
    }

    #[test]
    fn test_out_of_order_rejected_by_default() {
        let artifacts = vec![
            sql_artifact(Some("3"), "three", "c"),
            sql_artifact(Some("5"), "five", "e"),
        ];
        let history = vec![applied(1, Some("5"), "five", Some("e"), true)];

        let err = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap_err();
        match err {
            MigrationError::OutOfOrder { version, frontier } => {
                assert_eq!(version, "3");
                assert_eq!(frontier, "5");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_order_runs_in_natural_position_when_enabled() {
        let artifacts = vec![
            sql_artifact(Some("6"), "six", "f"),
            sql_artifact(Some("3"), "three", "c"),
            sql_artifact(Some("5"), "five", "e"),
        ];
        let history = vec![applied(1, Some("5"), "five", Some("e"), true)];

        let mut config = MigrationConfig::default();
        config.out_of_order = true;
        let plan = plan(&artifacts, &history, &config, true).unwrap();
        assert_eq!(versions(&plan), vec!["3", "6"]);
    }

    #[test]
    fn test_missing_migration_policy() {
        let history = vec![
            applied(1, Some("1"), "one", Some("a"), true),
            applied(2, Some("2"), "two", Some("b"), true),
        ];
        let artifacts = vec![sql_artifact(Some("2"), "two", "b")];

        let err = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap_err();
        match err {
            MigrationError::MissingMigration { scripts } => {
                assert_eq!(scripts, vec!["V1__one.sql"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let mut config = MigrationConfig::default();
        config.ignore_missing = true;
        let plan = plan(&artifacts, &history, &config, true).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_future_migrations_tolerated_by_default() {
        let artifacts = vec![sql_artifact(Some("1"), "one", "a")];
        let history = vec![
            applied(1, Some("1"), "one", Some("a"), true),
            applied(2, Some("9"), "nine", Some("i"), true),
        ];

        // Default: a database ahead of the tree is fine
        let plan_ok = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap();
        assert!(plan_ok.is_empty());

        let mut config = MigrationConfig::default();
        config.ignore_future = false;
        let err = plan(&artifacts, &history, &config, true).unwrap_err();
        match err {
            MigrationError::FutureMigration { versions } => assert_eq!(versions, vec!["9"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_repeatables_run_last_ordered_by_description() {
        let artifacts = vec![
            sql_artifact(None, "zulu views", "z"),
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(None, "alpha views", "x"),
        ];
        let plan = plan(&artifacts, &[], &MigrationConfig::default(), true).unwrap();
        assert_eq!(versions(&plan), vec!["1", "R:alpha views", "R:zulu views"]);
    }

    #[test]
    fn test_repeatable_reruns_only_on_checksum_change() {
        let history = vec![
            applied(1, None, "views", Some("old"), true),
            applied(2, None, "views", Some("new"), true),
        ];

        // Most recent applied row for the description wins the comparison
        let same = vec![sql_artifact(None, "views", "new")];
        let plan_same = plan(&same, &history, &MigrationConfig::default(), true).unwrap();
        assert!(plan_same.is_empty());

        let reverted = vec![sql_artifact(None, "views", "old")];
        let plan_reverted = plan(&reverted, &history, &MigrationConfig::default(), true).unwrap();
        assert_eq!(versions(&plan_reverted), vec!["R:views"]);
    }

    #[test]
    fn test_baseline_ignores_at_and_below() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(Some("2"), "two", "b"),
            sql_artifact(Some("3"), "three", "c"),
        ];
        let history = vec![baseline_row(1, "2")];

        let plan = plan(&artifacts, &history, &MigrationConfig::default(), true).unwrap();
        assert_eq!(versions(&plan), vec!["3"]);
    }

    #[test]
    fn test_info_classifies_each_state() {
        let artifacts = vec![
            sql_artifact(Some("2"), "two", "b"),
            sql_artifact(Some("3"), "three", "c"),
            sql_artifact(None, "views", "fresh"),
        ];
        let history = vec![
            baseline_row(1, "1"),
            applied(2, Some("2"), "two", Some("b"), true),
            applied(3, None, "views", Some("stale"), true),
            applied(4, Some("4"), "four", Some("d"), true),
        ];

        let rows = info(&artifacts, &history).unwrap();
        let state_of = |script: &str| {
            rows.iter()
                .filter(|r| r.script == script)
                .map(|r| r.state)
                .collect::<Vec<_>>()
        };

        assert_eq!(state_of("<< baseline >>")[0], MigrationState::Baseline);
        assert_eq!(state_of("V2__two.sql"), vec![MigrationState::Applied]);
        assert_eq!(state_of("V4__four.sql"), vec![MigrationState::Future]);
        // Stale applied row plus a pending re-run for the new content
        assert_eq!(
            state_of("R__views.sql"),
            vec![MigrationState::Outdated, MigrationState::Pending]
        );
        assert_eq!(state_of("V3__three.sql"), vec![MigrationState::Pending]);
    }

    #[test]
    fn test_info_serializes_for_hosts() {
        let rows = info(&[sql_artifact(Some("1"), "one", "a")], &[]).unwrap();
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["state"], "pending");
        assert_eq!(json[0]["version"], "1");
        assert_eq!(json[0]["kind"], "sql");
        assert!(json[0]["installed_rank"].is_null());
    }

    #[test]
    fn test_info_marks_failed_and_ignored() {
        let artifacts = vec![
            sql_artifact(Some("1"), "one", "a"),
            sql_artifact(Some("2"), "two", "b"),
        ];
        let history = vec![
            baseline_row(1, "1"),
            applied(2, Some("2"), "two", Some("b"), false),
        ];

        let rows = info(&artifacts, &history).unwrap();
        let failed: Vec<_> = rows
            .iter()
            .filter(|r| r.state == MigrationState::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].script, "V2__two.sql");

        let ignored: Vec<_> = rows
            .iter()
            .filter(|r| r.state == MigrationState::Ignored)
            .collect();
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].script, "V1__one.sql");
    }
}
