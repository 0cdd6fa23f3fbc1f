//! Rule matching against a replayed label set

use crate::replay::LabelSet;
use crate::rules::{Rule, RuleTable};

/// Outcome of matching one label set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matches<'a> {
    /// Satisfied rules, in declaration order
    pub all: Vec<&'a Rule>,
    /// Lowest priority value among `all`, first declared on ties
    pub winner: Option<&'a Rule>,
}

impl Matches<'_> {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// A rule is satisfied only when every one of its old labels is present
pub fn is_satisfied(rule: &Rule, labels: &LabelSet) -> bool {
    rule.old.iter().all(|name| labels.contains(name))
}

/// Find all satisfied rules and pick the winner
pub fn match_rules<'a>(labels: &LabelSet, rules: &'a RuleTable) -> Matches<'a> {
    let all: Vec<&Rule> = rules.iter().filter(|r| is_satisfied(r, labels)).collect();
    // min_by_key returns the first of several equal minima
    let winner = all.iter().copied().min_by_key(|r| r.priority);
    Matches { all, winner }
}
