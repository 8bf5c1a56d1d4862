use std::collections::HashSet;

use tracing::debug;

use crate::error::{CorpusError, CorpusResult};
use crate::models::{AssignedLabel, LabelSpan, ReconciledTurn, SpeakerSpan};

/// Result of Stage 2 reconciliation
#[derive(Debug, Clone, Default)]
pub struct Stage2Result {
    /// Turns sorted by position, deduplicated
    pub turns: Vec<ReconciledTurn>,
    /// Number of label spans attached to a turn
    pub labeled: usize,
    /// Number of turns emitted without a label
    pub unlabeled: usize,
}

/// Execute Stage 2: attach every label span to the speaker turn containing it
///
/// `speakers` must be sorted by `name_start`. A label that no turn contains means
/// the transcript and the annotation export are out of sync, which is fatal.
/// Turns without any label are kept as unlabeled rows. When either side is
/// empty there is nothing to reconcile.
pub fn execute_stage2(
    speakers: &[SpeakerSpan],
    labels: &[LabelSpan],
) -> CorpusResult<Stage2Result> {
    if speakers.is_empty() || labels.is_empty() {
        return Ok(Stage2Result::default());
    }

    let mut turns = Vec::with_capacity(labels.len() + speakers.len());
    for label in labels {
        let speaker = find_speaker(speakers, label)?;
        turns.push(ReconciledTurn {
            speaker: *speaker,
            label: Some(AssignedLabel {
                name: label.label.clone(),
                start: label.start,
                end: label.end,
            }),
        });
    }
    let labeled = turns.len();

    let resolved: HashSet<usize> = turns.iter().map(|t| t.speaker.name_start).collect();
    turns.extend(
        speakers
            .iter()
            .filter(|s| !resolved.contains(&s.name_start))
            .map(|s| ReconciledTurn {
                speaker: *s,
                label: None,
            }),
    );
    let unlabeled = turns.len() - labeled;

    turns.sort_by(ReconciledTurn::cmp_position);
    let turns = dedup_turns(turns);

    debug!(
        "Stage 2: {} labels attached, {} unlabeled turns, {} rows after dedup",
        labeled,
        unlabeled,
        turns.len()
    );

    Ok(Stage2Result {
        turns,
        labeled,
        unlabeled,
    })
}

/// The turn with the greatest `name_start` not past the label start, checked to
/// contain the whole label
fn find_speaker<'a>(speakers: &'a [SpeakerSpan], label: &LabelSpan) -> CorpusResult<&'a SpeakerSpan> {
    let containment = |detail: String| CorpusError::Containment {
        label: label.label.clone(),
        start: label.start,
        end: label.end,
        detail,
    };

    let idx = speakers.partition_point(|s| s.name_start <= label.start);
    if idx == 0 {
        return Err(containment("label starts before the first speaker turn".to_string()));
    }

    let speaker = &speakers[idx - 1];
    if !speaker.contains(label.start, label.end) {
        return Err(containment(format!(
            "turn ({}, {}) ends before the label",
            speaker.name_start, speaker.text_end
        )));
    }
    Ok(speaker)
}

/// Drop exact duplicates, then keep only the first row per (turn, label name)
pub fn dedup_turns(turns: Vec<ReconciledTurn>) -> Vec<ReconciledTurn> {
    let mut seen_rows = HashSet::new();
    let mut seen_labels = HashSet::new();

    turns
        .into_iter()
        .filter(|t| seen_rows.insert(t.clone()))
        .filter(|t| seen_labels.insert((t.speaker.name_start, t.label_name().map(str::to_string))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(name_start: usize, text_start: usize, text_end: usize) -> SpeakerSpan {
        SpeakerSpan {
            name_start,
            text_start,
            text_end,
        }
    }

    fn label(segment_id: &str, name: &str, start: usize, end: usize) -> LabelSpan {
        LabelSpan {
            segment_id: segment_id.to_string(),
            label: name.to_string(),
            start,
            end,
        }
    }

    fn speakers() -> Vec<SpeakerSpan> {
        vec![speaker(0, 7, 19), speaker(19, 24, 40), speaker(40, 45, 60)]
    }

    #[test]
    fn test_labels_attach_to_containing_turn() {
        let labels = vec![label("s1", "Claim", 26, 30), label("s2", "Doubt", 7, 19)];
        let result = execute_stage2(&speakers(), &labels).unwrap();

        assert_eq!(result.labeled, 2);
        assert_eq!(result.unlabeled, 1);
        let rows: Vec<_> = result
            .turns
            .iter()
            .map(|t| (t.speaker.name_start, t.label_name()))
            .collect();
        assert_eq!(
            rows,
            vec![(0, Some("Doubt")), (19, Some("Claim")), (40, None)]
        );
    }

    #[test]
    fn test_label_before_first_turn() {
        let speakers = vec![speaker(12, 20, 30)];
        let labels = vec![label("s1", "Claim", 10, 15)];

        assert!(matches!(
            execute_stage2(&speakers, &labels),
            Err(CorpusError::Containment { .. })
        ));
    }

    #[test]
    fn test_label_crossing_turn_boundary() {
        let labels = vec![label("s1", "Claim", 15, 22)];

        assert!(matches!(
            execute_stage2(&speakers(), &labels),
            Err(CorpusError::Containment { .. })
        ));
    }

    #[test]
    fn test_label_on_turn_start_goes_to_that_turn() {
        let labels = vec![label("s1", "Claim", 19, 24)];
        let result = execute_stage2(&speakers(), &labels).unwrap();

        assert_eq!(result.turns[1].speaker.name_start, 19);
        assert_eq!(result.turns[1].label_name(), Some("Claim"));
    }

    #[test]
    fn test_same_label_twice_in_one_turn() {
        let labels = vec![label("s2", "Claim", 30, 35), label("s1", "Claim", 25, 28)];
        let result = execute_stage2(&speakers(), &labels).unwrap();

        let claims: Vec<_> = result
            .turns
            .iter()
            .filter(|t| t.label_name() == Some("Claim"))
            .collect();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].label_start(), Some(25));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(execute_stage2(&[], &[label("s1", "Claim", 0, 1)]).unwrap().turns.is_empty());
        assert!(execute_stage2(&speakers(), &[]).unwrap().turns.is_empty());
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let labels = vec![
            label("s1", "Claim", 26, 30),
            label("s2", "Claim", 26, 30),
            label("s3", "Claim", 31, 33),
            label("s4", "Doubt", 8, 10),
        ];
        let once = execute_stage2(&speakers(), &labels).unwrap().turns;
        let twice = dedup_turns(once.clone());

        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
