//! Issue and timeline data model for relabel
//!
//! Keeps only the parts of the tracker payloads that label reconciliation
//! needs. Unknown fields are dropped when reading, so raw API responses
//! deserialize straight into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue state as reported by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Open,
    Closed,
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
        }
    }
}

/// A label as attached to an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }
}

/// Label payload inside a timeline entry. The name is optional here because
/// timeline data is not trusted until it is parsed into an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RawLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One entry of an issue timeline, as returned by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RawEvent {
    /// Event name ("labeled", "unlabeled", "commented", "closed", ...)
    #[serde(default)]
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<RawLabel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RawEvent {
    pub fn labeled(name: impl Into<String>) -> Self {
        Self::label_event("labeled", name)
    }

    pub fn unlabeled(name: impl Into<String>) -> Self {
        Self::label_event("unlabeled", name)
    }

    fn label_event(event: &str, name: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            label: Some(RawLabel {
                name: Some(name.into()),
                color: None,
            }),
            created_at: None,
        }
    }

    /// Parse into a label event.
    ///
    /// Returns `Ok(None)` for entries that do not touch labels, and an error
    /// message for label entries that lack a label name.
    pub fn parse(&self, order: usize) -> Result<Option<Event>, String> {
        let kind = match self.event.as_str() {
            "labeled" => EventKind::Labeled,
            "unlabeled" => EventKind::Unlabeled,
            _ => return Ok(None),
        };

        let raw = self
            .label
            .as_ref()
            .ok_or_else(|| format!("{} event at position {} has no label", kind, order))?;
        let name = raw
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("{} event at position {} has no label name", kind, order))?;

        Ok(Some(Event {
            kind,
            label: Label {
                name: name.to_string(),
                color: raw.color.clone(),
            },
            order,
        }))
    }
}

/// Kind of label event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Labeled,
    Unlabeled,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Labeled => write!(f, "labeled"),
            EventKind::Unlabeled => write!(f, "unlabeled"),
        }
    }
}

/// A validated label event. `order` is the position in the source timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub label: Label,
    pub order: usize,
}

impl Event {
    pub fn labeled(name: impl Into<String>, order: usize) -> Self {
        Self {
            kind: EventKind::Labeled,
            label: Label::new(name),
            order,
        }
    }

    pub fn unlabeled(name: impl Into<String>, order: usize) -> Self {
        Self {
            kind: EventKind::Unlabeled,
            label: Label::new(name),
            order,
        }
    }
}

/// Issue snapshot: metadata plus its full timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub state: IssueState,

    /// Labels applied when the issue was fetched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub timeline: Vec<RawEvent>,
}

impl Issue {
    pub fn new(number: u64, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            state: IssueState::Closed,
            labels: Vec::new(),
            closed_at: None,
            timeline: Vec::new(),
        }
    }

    /// Builder-style helper to attach a timeline
    pub fn with_timeline(mut self, timeline: Vec<RawEvent>) -> Self {
        self.timeline = timeline;
        self
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} [{}] {}", self.number, self.state, self.title)
    }
}
