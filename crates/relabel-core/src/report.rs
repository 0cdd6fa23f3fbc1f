//! Per-issue failures and the end-of-run summary

use crate::Error;
use crate::apply::ApplyReport;
use crate::plan::Plan;
use serde::Serialize;

/// Stage at which an issue failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Replay,
    Mutation,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Replay => write!(f, "replay"),
            FailureKind::Mutation => write!(f, "mutation"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// A failure isolated to one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueFailure {
    pub issue: u64,
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub reason: String,
}

impl IssueFailure {
    pub fn from_error(issue: u64, err: &Error) -> Self {
        match err {
            Error::Replay { reason, .. } => Self {
                issue,
                kind: FailureKind::Replay,
                label: None,
                reason: reason.clone(),
            },
            Error::Mutation { label, reason, .. } => Self {
                issue,
                kind: FailureKind::Mutation,
                label: Some(label.clone()),
                reason: reason.clone(),
            },
            other => Self {
                issue,
                kind: FailureKind::Other,
                label: None,
                reason: other.to_string(),
            },
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub matched: usize,
    pub unmatched: usize,
    /// Issues mutated (or that would be, on a dry run)
    pub mutated: usize,
    /// Matched issues that already carried the outcome
    pub unchanged: usize,
    /// Distinct issues with a replay or mutation failure
    pub failed: usize,
    pub failures: Vec<IssueFailure>,
}

impl RunSummary {
    /// Summary for a plan that was not applied. Counts match what a dry
    /// run of the same plan would report.
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            dry_run: true,
            matched: plan.matched(),
            unmatched: plan.unmatched,
            mutated: plan.pending().count(),
            unchanged: plan.entries.iter().filter(|e| e.is_noop()).count(),
            failed: plan.failures.len(),
            failures: plan.failures.clone(),
        }
    }

    /// Combine plan and apply results
    pub fn new(plan: &Plan, applied: &ApplyReport) -> Self {
        let mut failures = plan.failures.clone();
        failures.extend(applied.failures.iter().cloned());

        let mut failed_issues: Vec<u64> = failures.iter().map(|f| f.issue).collect();
        failed_issues.sort_unstable();
        failed_issues.dedup();

        Self {
            dry_run: applied.dry_run,
            matched: plan.matched(),
            unmatched: plan.unmatched,
            mutated: applied.mutated,
            unchanged: applied.unchanged,
            failed: failed_issues.len(),
            failures,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
