//! Consolidation rule table
//!
//! Each rule maps a conjunction of legacy labels to one priority label.
//! Lower `priority` values take precedence.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One consolidation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Label applied when the rule wins
    pub result: String,

    /// Legacy labels that must all be present
    pub old: BTreeSet<String>,

    /// 0 is the highest precedence
    pub priority: u32,
}

impl Rule {
    pub fn new<I, S>(result: impl Into<String>, old: I, priority: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            result: result.into(),
            old: old.into_iter().map(Into::into).collect(),
            priority,
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let old: Vec<&str> = self.old.iter().map(String::as_str).collect();
        write!(f, "[P{}] {} <- {}", self.priority, self.result, old.join(" + "))
    }
}

/// Ordered, validated rule collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Validate and build a table. Declaration order is kept and is the
    /// tie-break between rules of equal priority.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::Configuration("rule table is empty".into()));
        }

        let mut priorities: HashMap<&str, u32> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.result.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "rule {} has an empty result label",
                    index
                )));
            }
            if rule.old.is_empty() || rule.old.iter().any(|l| l.trim().is_empty()) {
                return Err(Error::Configuration(format!(
                    "rule {} ({}) needs at least one non-empty old label",
                    index, rule.result
                )));
            }
            if let Some(&existing) = priorities.get(rule.result.as_str())
                && existing != rule.priority
            {
                return Err(Error::Configuration(format!(
                    "result label '{}' declared with priorities {} and {}",
                    rule.result, existing, rule.priority
                )));
            }
            priorities.insert(rule.result.as_str(), rule.priority);
        }

        Ok(Self { rules })
    }

    /// Rules in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every distinct legacy label referenced by the table
    pub fn old_labels(&self) -> BTreeSet<&str> {
        self.rules
            .iter()
            .flat_map(|r| r.old.iter().map(String::as_str))
            .collect()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Built-in support-label consolidation rules
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "prioridade:baixa",
            ["sup:frequencia:raramente", "sup:gravidade:existem alternativas"],
            3,
        ),
        Rule::new(
            "prioridade:media",
            ["sup:frequencia:raramente", "sup:gravidade:não consegue contornar"],
            2,
        ),
        Rule::new(
            "prioridade:media",
            ["sup:frequencia:ocasionalmente", "sup:gravidade:existem alternativas"],
            2,
        ),
        Rule::new(
            "prioridade:bloqueante",
            ["sup:frequencia:sempre", "sup:gravidade:não consegue contornar"],
            1,
        ),
        Rule::new("prioridade:bloqueante", ["sup:acao imediata"], 1),
        Rule::new("prioridade:critico", ["sup:gravidade:não consegue contornar"], 0),
        Rule::new(
            "prioridade:critico",
            ["sup:frequencia:ocasionalmente", "sup:gravidade:não consegue contornar"],
            0,
        ),
    ]
}
