use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::CorpusResult;
use crate::heuristics::{extract_committee, extract_protocol_number};
use crate::io::{
    dir_name, locate_protocol_files, read_annotation_xml, read_transcript, CorpusRow,
    FailedProtocol, ProtocolMetadata, RunSummary, SkipReason, SkippedProtocol,
    DEFAULT_ANNOTATION_DIR,
};
use crate::models::{AnnotationSet, ReconciledTurn, SpeakerSpan, Transcript};
use crate::stages::{execute_stage0, execute_stage1, execute_stage2, Stage0Config};

/// Label renames applied to the final table
pub const DEFAULT_LABEL_REPLACEMENTS: &[(&str, &str)] = &[
    ("judicial decision turns turns", "Judicial decision"),
    (
        "Anticipating Judicial Review turns",
        "Anticipating Judicial Review",
    ),
];

/// Labels whose rows are left out of the final table
pub const DEFAULT_LABELS_TO_DROP: &[&str] = &["Doubt"];

/// Exact-match label renaming and exclusion
#[derive(Debug, Clone)]
pub struct LabelPolicy {
    pub replacements: BTreeMap<String, String>,
    /// Checked after renaming
    pub drop: BTreeSet<String>,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            replacements: DEFAULT_LABEL_REPLACEMENTS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            drop: DEFAULT_LABELS_TO_DROP.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Configuration for Stage 3 corpus assembly
#[derive(Debug, Clone)]
pub struct Stage3Config {
    pub segmentation: Stage0Config,
    /// Annotation sub-directory name inside each protocol directory
    pub annotation_dir: String,
    /// Characters of context around each turn; 0 disables the context columns
    pub context_size: usize,
    /// Abort on the first failing protocol instead of skipping it
    pub fail_fast: bool,
    pub label_policy: LabelPolicy,
}

impl Default for Stage3Config {
    fn default() -> Self {
        Self {
            segmentation: Stage0Config::default(),
            annotation_dir: DEFAULT_ANNOTATION_DIR.to_string(),
            context_size: 0,
            fail_fast: false,
            label_policy: LabelPolicy::default(),
        }
    }
}

/// Result of Stage 3 assembly
#[derive(Debug, Default)]
pub struct Stage3Result {
    /// Final rows across the corpus, label policy applied
    pub rows: Vec<CorpusRow>,
    pub summary: RunSummary,
}

/// What one protocol directory contributed
#[derive(Debug)]
pub enum ProtocolOutcome {
    Rows(Vec<CorpusRow>),
    Skipped(SkipReason),
}

/// Everything read and derived from one protocol's two input files
struct LoadedProtocol {
    transcript: Transcript,
    speakers: Vec<SpeakerSpan>,
    annotations: Option<AnnotationSet>,
}

fn load_protocol(dir: &Path, config: &Stage3Config) -> CorpusResult<LoadedProtocol> {
    let files = locate_protocol_files(dir, &config.annotation_dir)?;
    let transcript = read_transcript(&files.transcript, config.segmentation.normalization)?;
    let xml = read_annotation_xml(&files.annotation)?;

    let speakers = execute_stage0(&transcript.lines, &config.segmentation).speakers;
    let annotations = execute_stage1(&xml)?;

    Ok(LoadedProtocol {
        transcript,
        speakers,
        annotations,
    })
}

/// Reconcile one protocol directory into rows
///
/// A protocol with an empty annotation export or without any speaker header is
/// skipped. A missing committee name is fatal for the protocol, a missing
/// protocol number is not.
pub fn assemble_protocol(dir: &Path, config: &Stage3Config) -> CorpusResult<ProtocolOutcome> {
    let loaded = load_protocol(dir, config)?;

    let Some(annotations) = loaded.annotations else {
        return Ok(ProtocolOutcome::Skipped(SkipReason::EmptyAnnotations));
    };
    if loaded.speakers.is_empty() {
        return Ok(ProtocolOutcome::Skipped(SkipReason::NoSpeakerTurns));
    }

    let labels = annotations.label_spans()?;
    let reconciled = execute_stage2(&loaded.speakers, &labels)?;

    let text = &loaded.transcript.text;
    let committee = extract_committee(text.as_str())?;
    let protocol_number = extract_protocol_number(text.as_str());
    if protocol_number.is_none() {
        info!(
            "No protocol number in {:?} (committee: {})",
            dir, committee
        );
    }

    let metadata = ProtocolMetadata {
        file: dir_name(dir),
        committee,
        protocol_number,
    };
    let rows = reconciled
        .turns
        .iter()
        .map(|turn| CorpusRow::from_turn(turn, text, &metadata, config.context_size))
        .collect();

    Ok(ProtocolOutcome::Rows(rows))
}

/// Execute Stage 3: assemble the corpus table from validated protocol directories
///
/// A protocol that fails is logged, recorded in the summary and left out, unless
/// `fail_fast` is set.
pub fn execute_stage3(dirs: &[PathBuf], config: &Stage3Config) -> CorpusResult<Stage3Result> {
    let mut rows = Vec::new();
    let mut summary = RunSummary {
        protocols_total: dirs.len(),
        ..Default::default()
    };

    for dir in dirs {
        info!("Processing protocol dir {:?}", dir);

        match assemble_protocol(dir, config) {
            Ok(ProtocolOutcome::Rows(protocol_rows)) => {
                summary.protocols_processed += 1;
                rows.extend(protocol_rows);
            }
            Ok(ProtocolOutcome::Skipped(reason)) => {
                warn!("Skipping protocol dir {:?}: {:?}", dir, reason);
                summary.skipped.push(SkippedProtocol {
                    dir: dir_name(dir),
                    reason,
                });
            }
            Err(e) if config.fail_fast => return Err(e),
            Err(e) => {
                warn!("Failed to process protocol dir {:?}: {}", dir, e);
                summary.failed.push(FailedProtocol {
                    dir: dir_name(dir),
                    error: e.to_string(),
                });
            }
        }
    }

    let rows = apply_label_policy(rows, &config.label_policy);
    summary.count_rows(&rows);

    info!(
        "Stage 3: {} rows from {} of {} protocols ({} skipped, {} failed)",
        summary.rows_written,
        summary.protocols_processed,
        summary.protocols_total,
        summary.skipped.len(),
        summary.failed.len()
    );

    Ok(Stage3Result { rows, summary })
}

/// Drop rows without speaker text, rename labels, then drop excluded labels.
/// Unlabeled rows are never dropped by label.
pub fn apply_label_policy(rows: Vec<CorpusRow>, policy: &LabelPolicy) -> Vec<CorpusRow> {
    rows.into_iter()
        .filter(|row| !row.speaker_text.is_empty())
        .map(|mut row| {
            if let Some(renamed) = row.label.as_ref().and_then(|l| policy.replacements.get(l)) {
                row.label = Some(renamed.clone());
            }
            row
        })
        .filter(|row| row.label.as_ref().is_none_or(|l| !policy.drop.contains(l)))
        .collect()
}

/// Inspection of a single protocol, without label policy or output
#[derive(Debug)]
pub struct ProtocolAnalysis {
    pub speakers: Vec<SpeakerSpan>,
    pub annotations: Option<AnnotationSet>,
    pub turns: Vec<ReconciledTurn>,
    pub committee: Option<String>,
    pub protocol_number: Option<String>,
}

impl ProtocolAnalysis {
    /// Number of label spans in the export
    pub fn label_span_count(&self) -> usize {
        self.annotations
            .as_ref()
            .map_or(0, |a| a.segment_labels.len())
    }

    /// Number of pointer spans no label refers to
    pub fn untagged_span_count(&self) -> usize {
        self.annotations
            .as_ref()
            .map_or(0, |a| a.untagged_spans.len())
    }

    /// Reconciled rows per label
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for name in self.turns.iter().filter_map(ReconciledTurn::label_name) {
            *counts.entry(name.to_string()).or_default() += 1;
        }
        counts
    }
}

/// Run the pipeline on one protocol and keep the intermediate results
pub fn analyze_protocol(dir: &Path, config: &Stage3Config) -> CorpusResult<ProtocolAnalysis> {
    let loaded = load_protocol(dir, config)?;

    let turns = match &loaded.annotations {
        Some(annotations) => {
            let labels = annotations.label_spans()?;
            execute_stage2(&loaded.speakers, &labels)?.turns
        }
        None => Vec::new(),
    };

    let text = loaded.transcript.text.as_str();
    Ok(ProtocolAnalysis {
        committee: extract_committee(text).ok(),
        protocol_number: extract_protocol_number(text),
        speakers: loaded.speakers,
        annotations: loaded.annotations,
        turns,
    })
}
