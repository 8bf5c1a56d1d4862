use std::collections::HashSet;

use tracing::debug;

use crate::heuristics::SpeakerStartRules;
use crate::models::{SpeakerSpan, TextNormalization};

/// Configuration for Stage 0 speaker segmentation
#[derive(Debug, Clone, Default)]
pub struct Stage0Config {
    /// Whitespace policy used to measure line lengths
    pub normalization: TextNormalization,
    /// Rules deciding which lines open a turn
    pub speaker_start: SpeakerStartRules,
}

/// Result of Stage 0 segmentation
#[derive(Debug, Clone, Default)]
pub struct Stage0Result {
    /// Speaker turns sorted by `name_start`
    pub speakers: Vec<SpeakerSpan>,
    /// Normalized length of the scanned text
    pub total_chars: usize,
}

/// Scan state carried across lines
#[derive(Debug, Default)]
struct ScanState {
    cursor: usize,
    /// `(name_start, text_start)` of the turn still being read
    open: Option<(usize, usize)>,
    finished: Vec<SpeakerSpan>,
}

/// Execute Stage 0: split transcript lines into speaker turns
///
/// Each line that looks like a speaker header closes the previous turn at the
/// current cursor and opens a new one. The last turn closes at the end of input.
/// Text before the first header belongs to no turn.
pub fn execute_stage0<S: AsRef<str>>(lines: &[S], config: &Stage0Config) -> Stage0Result {
    let state = lines.iter().fold(ScanState::default(), |mut state, line| {
        let line = line.as_ref();
        let line_len = config.normalization.effective_len(line);

        if config.speaker_start.is_speaker_start(line) {
            if let Some((name_start, text_start)) = state.open {
                state.finished.push(SpeakerSpan {
                    name_start,
                    text_start,
                    text_end: state.cursor,
                });
            }
            state.open = Some((state.cursor, state.cursor + line_len));
        }

        state.cursor += line_len;
        state
    });

    let ScanState {
        cursor,
        open,
        mut finished,
    } = state;

    if let Some((name_start, text_start)) = open {
        finished.push(SpeakerSpan {
            name_start,
            text_start,
            text_end: cursor,
        });
    }

    finished.sort_by_key(|s| s.name_start);
    let mut seen = HashSet::new();
    finished.retain(|s| seen.insert(*s));

    debug!(
        "Stage 0: {} speaker turns over {} chars",
        finished.len(),
        cursor
    );

    Stage0Result {
        speakers: finished,
        total_chars: cursor,
    }
}
