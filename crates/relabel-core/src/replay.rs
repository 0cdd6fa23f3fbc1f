//! Timeline replay
//!
//! Folds an ordered sequence of label events into the set of labels that
//! are applied once the whole timeline has played out.

use crate::issue::{Event, EventKind, Issue, Label};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Last-seen metadata for an applied label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelMeta {
    pub label: Label,
    /// Timeline position of the `labeled` event that applied it
    pub order: usize,
}

/// Labels currently applied to an issue, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: BTreeMap<String, LabelMeta>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set directly from label names (order 0)
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for name in names {
            set.apply(&Event::labeled(name, 0));
        }
        set
    }

    /// Apply one event to the set
    pub fn apply(&mut self, event: &Event) {
        match event.kind {
            EventKind::Labeled => {
                self.labels.insert(
                    event.label.name.clone(),
                    LabelMeta {
                        label: event.label.clone(),
                        order: event.order,
                    },
                );
            }
            EventKind::Unlabeled => {
                self.labels.remove(&event.label.name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&LabelMeta> {
        self.labels.get(name)
    }

    /// Label names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Replay validated events in the order given
pub fn replay<'a, I>(events: I) -> LabelSet
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().fold(LabelSet::new(), |mut set, event| {
        set.apply(event);
        set
    })
}

/// Parse and replay an issue's raw timeline.
///
/// Non-label entries are skipped. A label entry without a label name fails
/// the whole issue, since a partial history could match the wrong rule.
pub fn replay_issue(issue: &Issue) -> Result<LabelSet> {
    let mut set = LabelSet::new();
    for (order, raw) in issue.timeline.iter().enumerate() {
        let event = raw.parse(order).map_err(|reason| Error::Replay {
            issue: issue.number,
            reason,
        })?;
        if let Some(event) = event {
            set.apply(&event);
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{RawEvent, RawLabel};
    use proptest::prelude::*;

    #[test]
    fn test_empty_timeline() {
        assert!(replay(&Vec::<Event>::new()).is_empty());
    }

    #[test]
    fn test_labeled_then_unlabeled() {
        let events = [Event::labeled("x", 0), Event::unlabeled("x", 1)];
        assert!(replay(&events).is_empty());
    }

    #[test]
    fn test_repeated_labeled_keeps_last() {
        let events = [Event::labeled("bug", 0), Event::labeled("bug", 4)];
        let set = replay(&events);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("bug").map(|m| m.order), Some(4));
    }

    #[test]
    fn test_unlabeled_unknown_is_ignored() {
        let events = [Event::unlabeled("ghost", 0), Event::labeled("bug", 1)];
        let set = replay(&events);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["bug"]);
    }

    #[test]
    fn test_relabel_after_removal() {
        let events = [
            Event::labeled("a", 0),
            Event::unlabeled("a", 1),
            Event::labeled("a", 2),
        ];
        assert!(replay(&events).contains("a"));
    }

    #[test]
    fn test_replay_issue_skips_other_events() {
        let issue = Issue::new(1, "t").with_timeline(vec![
            RawEvent {
                event: "commented".into(),
                ..Default::default()
            },
            RawEvent::labeled("sup:acao imediata"),
            RawEvent {
                event: "closed".into(),
                ..Default::default()
            },
        ]);
        let set = replay_issue(&issue).unwrap();
        assert!(set.contains("sup:acao imediata"));
        assert_eq!(set.get("sup:acao imediata").map(|m| m.order), Some(1));
    }

    #[test]
    fn test_replay_issue_reports_malformed_event() {
        let issue = Issue::new(9, "t").with_timeline(vec![RawEvent {
            event: "labeled".into(),
            label: Some(RawLabel::default()),
            created_at: None,
        }]);
        match replay_issue(&issue) {
            Err(Error::Replay { issue, .. }) => assert_eq!(issue, 9),
            other => panic!("expected replay failure, got {other:?}"),
        }
    }

    fn timeline_strategy() -> impl Strategy<Value = Vec<Event>> {
        prop::collection::vec((any::<bool>(), 0usize..4), 0..24).prop_map(|steps| {
            steps
                .into_iter()
                .enumerate()
                .map(|(order, (labeled, n))| {
                    let name = format!("label-{n}");
                    if labeled {
                        Event::labeled(name, order)
                    } else {
                        Event::unlabeled(name, order)
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(events in timeline_strategy()) {
            prop_assert_eq!(replay(&events), replay(&events));
        }

        #[test]
        fn prop_present_labels_were_last_labeled(events in timeline_strategy()) {
            let set = replay(&events);
            for n in 0..4 {
                let name = format!("label-{n}");
                let last = events.iter().rev().find(|e| e.label.name == name);
                let expected = matches!(last, Some(e) if e.kind == EventKind::Labeled);
                prop_assert_eq!(set.contains(&name), expected);
            }
        }
    }
}
