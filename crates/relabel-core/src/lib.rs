//! relabel-core: Core library for relabel
//!
//! Replays issue label timelines, matches the resulting label sets against
//! a consolidation rule table, and plans and applies the label changes.
//! All tracker I/O goes through the [`IssueSource`] and [`LabelSink`] traits.

pub mod apply;
pub mod config;
pub mod error;
pub mod fetch;
pub mod issue;
pub mod matcher;
pub mod plan;
pub mod replay;
pub mod report;
pub mod rules;
pub mod snapshot;

pub use apply::{ApplyReport, LabelSink, RunMode, apply};
pub use config::Config;
pub use error::Error;
pub use fetch::{IssueSource, fetch_snapshot};
pub use issue::{Event, EventKind, Issue, IssueState, Label, RawEvent, RawLabel};
pub use matcher::{Matches, match_rules};
pub use plan::{Convergence, Plan, PlanEntry, build_plan};
pub use replay::{LabelSet, replay, replay_issue};
pub use report::{FailureKind, IssueFailure, RunSummary};
pub use rules::{Rule, RuleTable};
pub use snapshot::SnapshotCache;

/// Result type for relabel operations
pub type Result<T> = std::result::Result<T, Error>;
