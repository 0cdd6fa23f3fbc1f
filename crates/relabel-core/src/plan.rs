//! Plan building
//!
//! Turns a snapshot of issues into per-issue mutation intents. Building is
//! pure: the same snapshot and rule table always give the same plan.

use crate::Result;
use crate::issue::Issue;
use crate::matcher::match_rules;
use crate::replay::replay_issue;
use crate::report::IssueFailure;
use crate::rules::{Rule, RuleTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How far an issue is converged towards its winning rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    /// Only add the result label
    #[default]
    Add,
    /// Add the result label and remove the winning rule's legacy labels
    Replace,
}

impl std::str::FromStr for Convergence {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" => Ok(Convergence::Add),
            "replace" => Ok(Convergence::Replace),
            _ => Err(crate::Error::Configuration(format!(
                "unknown convergence policy: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Convergence::Add => write!(f, "add"),
            Convergence::Replace => write!(f, "replace"),
        }
    }
}

/// Mutation intent for one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub issue: u64,
    pub title: String,
    /// Winning rule
    pub rule: Rule,
    /// Labels applied after replay, sorted
    pub current: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl PlanEntry {
    /// True when the issue already carries the rule's outcome
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Plan for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Issues replayed fine but matching no rule
    pub unmatched: usize,
    /// Issues whose timeline could not be replayed
    pub failures: Vec<IssueFailure>,
}

impl Plan {
    pub fn matched(&self) -> usize {
        self.entries.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| !e.is_noop())
    }
}

/// Replay and match a single issue.
///
/// Returns `Ok(None)` when no rule matches.
pub fn plan_issue(
    issue: &Issue,
    rules: &RuleTable,
    convergence: Convergence,
) -> Result<Option<PlanEntry>> {
    let labels = replay_issue(issue)?;
    let matches = match_rules(&labels, rules);
    let Some(winner) = matches.winner else {
        return Ok(None);
    };

    let add = if labels.contains(&winner.result) {
        Vec::new()
    } else {
        vec![winner.result.clone()]
    };

    let remove = match convergence {
        Convergence::Add => Vec::new(),
        Convergence::Replace => winner
            .old
            .iter()
            .filter(|name| **name != winner.result && labels.contains(name))
            .cloned()
            .collect(),
    };

    Ok(Some(PlanEntry {
        issue: issue.number,
        title: issue.title.clone(),
        rule: winner.clone(),
        current: labels.names().map(str::to_string).collect(),
        add,
        remove,
    }))
}

/// Build the plan for a batch of issues.
///
/// A malformed timeline fails only its own issue; the failure is recorded
/// and the rest of the batch is still planned.
pub fn build_plan(issues: &[Issue], rules: &RuleTable, convergence: Convergence) -> Plan {
    let mut plan = Plan::default();

    for issue in issues {
        match plan_issue(issue, rules, convergence) {
            Ok(Some(entry)) => {
                debug!(
                    issue = issue.number,
                    result = %entry.rule.result,
                    priority = entry.rule.priority,
                    "matched"
                );
                plan.entries.push(entry);
            }
            Ok(None) => plan.unmatched += 1,
            Err(e) => {
                warn!(issue = issue.number, error = %e, "skipping issue");
                plan.failures.push(IssueFailure::from_error(issue.number, &e));
            }
        }
    }

    plan
}
