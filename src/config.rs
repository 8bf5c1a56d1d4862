use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::heuristics::{SpeakerStartRules, DEFAULT_NOT_SPEAKER_START_PHRASES};
use crate::io::{ValidationOptions, DEFAULT_ANNOTATION_DIR};
use crate::models::TextNormalization;
use crate::stages::{LabelPolicy, Stage0Config, Stage3Config};

/// Settings for a corpus build, loaded from an optional TOML file
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding the `*.tar.gz` exports
    pub archives_dir: PathBuf,
    /// Directory the exports are unpacked into, one sub-directory per protocol
    pub unpacked_dir: PathBuf,
    /// Output TSV path
    pub output_path: PathBuf,
    /// Optional JSON run summary path
    pub summary_path: Option<PathBuf>,
    pub annotation_dir: String,
    /// Render newlines as two spaces and tabs as one before measuring offsets
    pub remove_new_line_and_tab: bool,
    /// Characters of context around each turn; 0 disables the context columns
    pub context_size: usize,
    /// Keep the longest of several annotation exports instead of rejecting the protocol
    pub tolerant: bool,
    /// Abort the build on the first failing protocol
    pub fail_fast: bool,
    pub label_replacements: BTreeMap<String, String>,
    pub labels_to_drop: BTreeSet<String>,
    pub not_speaker_start_phrases: BTreeSet<String>,
    /// Protocol directory names left out of the build
    pub excluded_protocol_dirs: BTreeSet<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let policy = LabelPolicy::default();

        Self {
            archives_dir: PathBuf::from("data"),
            unpacked_dir: PathBuf::from("data/unpacked_protocol_archives"),
            output_path: PathBuf::from("data/speaker_level_dataset.tsv"),
            summary_path: None,
            annotation_dir: DEFAULT_ANNOTATION_DIR.to_string(),
            remove_new_line_and_tab: false,
            context_size: 0,
            tolerant: true,
            fail_fast: false,
            label_replacements: policy.replacements,
            labels_to_drop: policy.drop,
            not_speaker_start_phrases: DEFAULT_NOT_SPEAKER_START_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            excluded_protocol_dirs: BTreeSet::new(),
        }
    }
}

impl CorpusConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load from `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn normalization(&self) -> TextNormalization {
        TextNormalization::new(self.remove_new_line_and_tab)
    }

    pub fn stage3_config(&self) -> Stage3Config {
        Stage3Config {
            segmentation: Stage0Config {
                normalization: self.normalization(),
                speaker_start: SpeakerStartRules::new(self.not_speaker_start_phrases.iter().cloned()),
            },
            annotation_dir: self.annotation_dir.clone(),
            context_size: self.context_size,
            fail_fast: self.fail_fast,
            label_policy: LabelPolicy {
                replacements: self.label_replacements.clone(),
                drop: self.labels_to_drop.clone(),
            },
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            annotation_dir: self.annotation_dir.clone(),
            excluded_dirs: self.excluded_protocol_dirs.clone(),
            tolerant: self.tolerant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CorpusConfig::default();

        assert_eq!(config.annotation_dir, "annotationcollections");
        assert!(config.tolerant);
        assert!(!config.remove_new_line_and_tab);
        assert_eq!(
            config.label_replacements["judicial decision turns turns"],
            "Judicial decision"
        );
        assert!(config.labels_to_drop.contains("Doubt"));
        assert!(config.not_speaker_start_phrases.contains("נכחו"));
    }

    #[test]
    fn test_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turnlabel.toml");
        fs::write(
            &path,
            r#"
unpacked_dir = "/corpus/unpacked"
remove_new_line_and_tab = true
context_size = 100
labels_to_drop = []
excluded_protocol_dirs = ["broken_protocol"]

[label_replacements]
"Claim turns" = "Claim"
"#,
        )
        .unwrap();

        let config = CorpusConfig::load(&path).unwrap();

        assert_eq!(config.unpacked_dir, PathBuf::from("/corpus/unpacked"));
        assert_eq!(config.output_path, CorpusConfig::default().output_path);
        assert!(config.labels_to_drop.is_empty());
        assert_eq!(config.label_replacements.len(), 1);

        let stage3 = config.stage3_config();
        assert!(stage3.segmentation.normalization.strip_newlines_and_tabs);
        assert_eq!(stage3.context_size, 100);
        assert_eq!(stage3.label_policy.replacements["Claim turns"], "Claim");

        let validation = config.validation_options();
        assert!(validation.excluded_dirs.contains("broken_protocol"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(CorpusConfig::load(&dir.path().join("nope.toml")).is_err());
        assert!(CorpusConfig::load_or_default(None).is_ok());
    }
}
