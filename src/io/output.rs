use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::error::{CorpusError, CorpusResult};
use crate::models::{collapse_whitespace, NormalizedText, ReconciledTurn};

/// Per-protocol values repeated on every row
#[derive(Debug, Clone)]
pub struct ProtocolMetadata {
    /// Base name of the protocol directory
    pub file: String,
    pub committee: String,
    pub protocol_number: Option<String>,
}

/// One output row: a speaker turn and one of its labels (or none)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusRow {
    pub file: String,
    pub committee: String,
    pub protocol_number: Option<String>,
    pub speaker_name_start_char: usize,
    pub speaker_text_start_char: usize,
    pub speaker_text_end_char: usize,
    pub speaker_name: String,
    pub speaker_text: String,
    pub clean_speaker_text: String,
    pub label: Option<String>,
    pub label_start_char: Option<usize>,
    pub label_end_char: Option<usize>,
    pub label_text: Option<String>,
    pub clean_label_text: Option<String>,
    pub before_speaker_text_context: Option<String>,
    pub after_speaker_text_context: Option<String>,
}

impl CorpusRow {
    /// Column names, in field order
    pub const COLUMNS: [&'static str; 16] = [
        "file",
        "committee",
        "protocol_number",
        "speaker_name_start_char",
        "speaker_text_start_char",
        "speaker_text_end_char",
        "speaker_name",
        "speaker_text",
        "clean_speaker_text",
        "label",
        "label_start_char",
        "label_end_char",
        "label_text",
        "clean_label_text",
        "before_speaker_text_context",
        "after_speaker_text_context",
    ];

    /// Materialize a reconciled turn. Text is copied out of the transcript.
    /// A `context_size` of zero leaves the context columns empty.
    pub fn from_turn(
        turn: &ReconciledTurn,
        text: &NormalizedText,
        metadata: &ProtocolMetadata,
        context_size: usize,
    ) -> Self {
        let speaker = &turn.speaker;
        let speaker_text = speaker.body(text).to_string();
        let label_text = turn
            .label
            .as_ref()
            .map(|l| text.slice(l.start, l.end).to_string());
        let (before, after) = if context_size > 0 {
            (
                Some(
                    text.slice(speaker.text_start.saturating_sub(context_size), speaker.text_start)
                        .to_string(),
                ),
                Some(
                    text.slice(speaker.text_end, speaker.text_end + context_size)
                        .to_string(),
                ),
            )
        } else {
            (None, None)
        };

        Self {
            file: metadata.file.clone(),
            committee: metadata.committee.clone(),
            protocol_number: metadata.protocol_number.clone(),
            speaker_name_start_char: speaker.name_start,
            speaker_text_start_char: speaker.text_start,
            speaker_text_end_char: speaker.text_end,
            speaker_name: speaker.name(text).to_string(),
            clean_speaker_text: collapse_whitespace(&speaker_text),
            speaker_text,
            label: turn.label_name().map(str::to_string),
            label_start_char: turn.label.as_ref().map(|l| l.start),
            label_end_char: turn.label.as_ref().map(|l| l.end),
            clean_label_text: label_text.as_deref().map(collapse_whitespace),
            label_text,
            before_speaker_text_context: before,
            after_speaker_text_context: after,
        }
    }
}

/// Write rows as a tab-separated file with a header line
pub fn write_tsv(rows: &[CorpusRow], path: &Path) -> CorpusResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CorpusError::io(parent, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(CorpusRow::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| CorpusError::io(path, e))?;
    Ok(())
}

/// Why a protocol contributed no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The annotation export tags nothing
    EmptyAnnotations,
    /// No speaker header was found in the transcript
    NoSpeakerTurns,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedProtocol {
    pub dir: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedProtocol {
    pub dir: String,
    pub error: String,
}

/// Machine-readable summary of a corpus build
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub protocols_total: usize,
    pub protocols_processed: usize,
    pub skipped: Vec<SkippedProtocol>,
    pub failed: Vec<FailedProtocol>,
    pub rows_written: usize,
    /// Rows per label; unlabeled rows are counted under an empty key
    pub label_counts: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Fill row-level counts from the final rows
    pub fn count_rows(&mut self, rows: &[CorpusRow]) {
        self.rows_written = rows.len();
        self.label_counts.clear();
        for row in rows {
            *self
                .label_counts
                .entry(row.label.clone().unwrap_or_default())
                .or_default() += 1;
        }
    }

    /// Write to a JSON file
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignedLabel, SpeakerSpan};

    fn metadata() -> ProtocolMetadata {
        ProtocolMetadata {
            file: "p42".to_string(),
            committee: "ועדת הכספים".to_string(),
            protocol_number: None,
        }
    }

    fn turn(label: Option<(usize, usize)>) -> ReconciledTurn {
        ReconciledTurn {
            speaker: SpeakerSpan {
                name_start: 4,
                text_start: 11,
                text_end: 25,
            },
            label: label.map(|(start, end)| AssignedLabel {
                name: "Claim".to_string(),
                start,
                end,
            }),
        }
    }

    #[test]
    fn test_row_from_turn() {
        let text = NormalizedText::new("Pre\nAlice:\nHello  \tthere\nBob:\n".to_string());
        let row = CorpusRow::from_turn(&turn(Some((11, 16))), &text, &metadata(), 0);

        assert_eq!(row.speaker_name, "Alice:\n");
        assert_eq!(row.speaker_text, "Hello  \tthere\n");
        assert_eq!(row.clean_speaker_text, "Hello there");
        assert_eq!(row.label_text.as_deref(), Some("Hello"));
        assert_eq!(row.before_speaker_text_context, None);
    }

    #[test]
    fn test_context_columns() {
        let text = NormalizedText::new("Pre\nAlice:\nHello  \tthere\nBob:\n".to_string());
        let row = CorpusRow::from_turn(&turn(None), &text, &metadata(), 20);

        assert_eq!(row.before_speaker_text_context.as_deref(), Some("Pre\nAlice:\n"));
        assert_eq!(row.after_speaker_text_context.as_deref(), Some("Bob:\n"));
        assert_eq!(row.label, None);
        assert_eq!(row.label_text, None);
    }

    #[test]
    fn test_write_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/dataset.tsv");
        let text = NormalizedText::new("Pre\nAlice:\nHello  \tthere\nBob:\n".to_string());
        let rows = vec![CorpusRow::from_turn(&turn(Some((11, 16))), &text, &metadata(), 0)];

        write_tsv(&rows, &path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), CorpusRow::COLUMNS.join("\t"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("p42\tועדת הכספים\t\t4\t11\t25\t"));
    }

    #[test]
    fn test_write_empty_tsv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.tsv");

        write_tsv(&[], &path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap().trim_end(),
            CorpusRow::COLUMNS.join("\t")
        );
    }

    #[test]
    fn test_summary_counts() {
        let text = NormalizedText::new("Pre\nAlice:\nHello  \tthere\nBob:\n".to_string());
        let rows = vec![
            CorpusRow::from_turn(&turn(Some((11, 16))), &text, &metadata(), 0),
            CorpusRow::from_turn(&turn(None), &text, &metadata(), 0),
        ];
        let mut summary = RunSummary::default();
        summary.count_rows(&rows);

        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.label_counts["Claim"], 1);
        assert_eq!(summary.label_counts[""], 1);
    }
}
