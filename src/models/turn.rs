use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::SpeakerSpan;

/// A label attached to a speaker turn
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignedLabel {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// One speaker turn paired with one of its labels, or with none
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconciledTurn {
    pub speaker: SpeakerSpan,
    pub label: Option<AssignedLabel>,
}

impl ReconciledTurn {
    pub fn label_name(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.name.as_str())
    }

    pub fn label_start(&self) -> Option<usize> {
        self.label.as_ref().map(|l| l.start)
    }

    /// Order by turn start, then label start with unlabeled rows last
    pub fn cmp_position(&self, other: &Self) -> Ordering {
        self.speaker
            .name_start
            .cmp(&other.speaker.name_start)
            .then_with(|| match (self.label_start(), other.label_start()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}
