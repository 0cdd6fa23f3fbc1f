//! Mutation applier
//!
//! Executes a plan against a [`LabelSink`], one issue at a time. A failed
//! call is recorded and the run moves on to the next issue.

use crate::plan::{Plan, PlanEntry};
use crate::report::{FailureKind, IssueFailure};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Remote label mutation capability.
///
/// Implementations must treat adding a present label or removing an absent
/// one as success.
#[async_trait]
pub trait LabelSink: Send + Sync {
    async fn add_label(&self, issue: u64, label: &str) -> Result<()>;

    async fn remove_label(&self, issue: u64, label: &str) -> Result<()>;
}

/// Whether the applier may call the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Apply,
    #[default]
    DryRun,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { RunMode::DryRun } else { RunMode::Apply }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub dry_run: bool,
    pub mutated: usize,
    pub unchanged: usize,
    pub failures: Vec<IssueFailure>,
}

fn mutation_failure(issue: u64, label: &str, err: Error) -> IssueFailure {
    let reason = match err {
        Error::Mutation { reason, .. } => reason,
        other => other.to_string(),
    };
    IssueFailure {
        issue,
        kind: FailureKind::Mutation,
        label: Some(label.to_string()),
        reason,
    }
}

/// Apply one entry. Removals only run once every addition succeeded, so a
/// failure never strips legacy labels from an issue that lacks the new one.
async fn apply_entry<S>(entry: &PlanEntry, sink: &S) -> Vec<IssueFailure>
where
    S: LabelSink + ?Sized,
{
    let mut failures = Vec::new();

    for label in &entry.add {
        if let Err(e) = sink.add_label(entry.issue, label).await {
            warn!(issue = entry.issue, label = %label, error = %e, "add failed");
            failures.push(mutation_failure(entry.issue, label, e));
            return failures;
        }
    }

    for label in &entry.remove {
        if let Err(e) = sink.remove_label(entry.issue, label).await {
            warn!(issue = entry.issue, label = %label, error = %e, "remove failed");
            failures.push(mutation_failure(entry.issue, label, e));
        }
    }

    failures
}

/// Apply a plan sequentially.
///
/// In [`RunMode::DryRun`] the sink is never called; the report counts what
/// would have been mutated.
pub async fn apply<S>(plan: &Plan, sink: &S, mode: RunMode) -> ApplyReport
where
    S: LabelSink + ?Sized,
{
    let mut report = ApplyReport {
        dry_run: mode.is_dry_run(),
        ..Default::default()
    };

    for entry in &plan.entries {
        if entry.is_noop() {
            report.unchanged += 1;
            continue;
        }

        if mode.is_dry_run() {
            info!(
                issue = entry.issue,
                add = ?entry.add,
                remove = ?entry.remove,
                "dry run: would update labels"
            );
            report.mutated += 1;
            continue;
        }

        info!(issue = entry.issue, add = ?entry.add, remove = ?entry.remove, "updating labels");
        let failures = apply_entry(entry, sink).await;
        if failures.is_empty() {
            report.mutated += 1;
        } else {
            report.failures.extend(failures);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, RawEvent};
    use crate::plan::{Convergence, build_plan};
    use crate::rules::RuleTable;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(&'static str, u64, String)>>,
        failing_issues: HashSet<u64>,
        failing_labels: HashSet<String>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<(&'static str, u64, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &'static str, issue: u64, label: &str) -> Result<()> {
            self.calls.lock().unwrap().push((op, issue, label.to_string()));
            if self.failing_issues.contains(&issue) || self.failing_labels.contains(label) {
                return Err(Error::Mutation {
                    issue,
                    label: label.to_string(),
                    reason: "HTTP 502".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LabelSink for RecordingSink {
        async fn add_label(&self, issue: u64, label: &str) -> Result<()> {
            self.record("add", issue, label)
        }

        async fn remove_label(&self, issue: u64, label: &str) -> Result<()> {
            self.record("remove", issue, label)
        }
    }

    fn immediate(number: u64) -> Issue {
        Issue::new(number, "t").with_timeline(vec![RawEvent::labeled("sup:acao imediata")])
    }

    fn plan_for(issues: &[Issue], convergence: Convergence) -> Plan {
        build_plan(issues, &RuleTable::default(), convergence)
    }

    #[tokio::test]
    async fn test_failure_on_one_issue_does_not_stop_the_next() {
        let plan = plan_for(&[immediate(42), immediate(43)], Convergence::Add);
        let sink = RecordingSink {
            failing_issues: HashSet::from([42]),
            ..Default::default()
        };

        let report = apply(&plan, &sink, RunMode::Apply).await;

        assert_eq!(
            sink.calls(),
            vec![
                ("add", 42, "prioridade:bloqueante".to_string()),
                ("add", 43, "prioridade:bloqueante".to_string()),
            ]
        );
        assert_eq!(report.mutated, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].issue, 42);
        assert_eq!(report.failures[0].reason, "HTTP 502");
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_sink() {
        let plan = plan_for(&[immediate(1), immediate(2)], Convergence::Replace);
        let sink = RecordingSink::default();

        let report = apply(&plan, &sink, RunMode::DryRun).await;

        assert!(sink.calls().is_empty());
        assert!(report.dry_run);
        assert_eq!(report.mutated, 2);
    }

    #[tokio::test]
    async fn test_add_runs_before_remove() {
        let plan = plan_for(&[immediate(5)], Convergence::Replace);
        let sink = RecordingSink::default();

        apply(&plan, &sink, RunMode::Apply).await;

        assert_eq!(
            sink.calls(),
            vec![
                ("add", 5, "prioridade:bloqueante".to_string()),
                ("remove", 5, "sup:acao imediata".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_add_skips_removals() {
        let plan = plan_for(&[immediate(8)], Convergence::Replace);
        let sink = RecordingSink {
            failing_labels: HashSet::from(["prioridade:bloqueante".to_string()]),
            ..Default::default()
        };

        let report = apply(&plan, &sink, RunMode::Apply).await;

        assert_eq!(sink.calls().len(), 1);
        assert_eq!(report.failures[0].label.as_deref(), Some("prioridade:bloqueante"));
    }

    #[tokio::test]
    async fn test_noop_entries_are_unchanged() {
        let converged = Issue::new(3, "t").with_timeline(vec![
            RawEvent::labeled("sup:acao imediata"),
            RawEvent::labeled("prioridade:bloqueante"),
        ]);
        let plan = plan_for(&[converged], Convergence::Add);
        let sink = RecordingSink::default();

        let report = apply(&plan, &sink, RunMode::Apply).await;

        assert!(sink.calls().is_empty());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.mutated, 0);
    }

    #[test]
    fn test_run_mode_from_flag() {
        assert_eq!(RunMode::from_dry_run(true), RunMode::DryRun);
        assert_eq!(RunMode::from_dry_run(false), RunMode::Apply);
    }
}
