use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CorpusError, CorpusResult};
use crate::models::{TextNormalization, Transcript};

/// Sub-directory of a protocol holding the annotation export
pub const DEFAULT_ANNOTATION_DIR: &str = "annotationcollections";

/// Suffix given to annotation exports set aside in tolerant mode
const SET_ASIDE_SUFFIX: &str = "_short.x_rename_m_rename_l_rename";

/// The two input files of one protocol
#[derive(Debug, Clone)]
pub struct ProtocolFiles {
    pub transcript: PathBuf,
    pub annotation: PathBuf,
}

/// Non-hidden `*.<suffix>` files directly inside `dir`, sorted. A missing
/// directory has no files.
pub fn find_files_with_suffix(dir: &Path, suffix: &str) -> CorpusResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(CorpusError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CorpusError::io(dir, e))?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if !hidden && path.is_file() && path.extension().is_some_and(|ext| ext == suffix) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// The single `*.<suffix>` file in `dir`
pub fn find_single_file(dir: &Path, suffix: &str) -> CorpusResult<PathBuf> {
    let mut files = find_files_with_suffix(dir, suffix)?;
    if files.len() != 1 {
        return Err(CorpusError::AmbiguousFile {
            dir: dir.to_path_buf(),
            suffix: suffix.to_string(),
            found: files.len(),
        });
    }
    Ok(files.remove(0))
}

/// Locate the transcript and the annotation export of a protocol directory
pub fn locate_protocol_files(dir: &Path, annotation_dir: &str) -> CorpusResult<ProtocolFiles> {
    Ok(ProtocolFiles {
        transcript: find_single_file(dir, "txt")?,
        annotation: find_single_file(&dir.join(annotation_dir), "xml")?,
    })
}

/// Read a transcript and apply the normalization policy
pub fn read_transcript(path: &Path, normalization: TextNormalization) -> CorpusResult<Transcript> {
    let content = fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
    Ok(Transcript::from_content(&content, normalization))
}

/// Read an annotation export
pub fn read_annotation_xml(path: &Path) -> CorpusResult<String> {
    fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))
}

/// Options for protocol directory validation
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Annotation sub-directory name
    pub annotation_dir: String,
    /// Directory names to leave out entirely
    pub excluded_dirs: BTreeSet<String>,
    /// Keep the longest of several annotation exports instead of rejecting the directory
    pub tolerant: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            annotation_dir: DEFAULT_ANNOTATION_DIR.to_string(),
            excluded_dirs: BTreeSet::new(),
            tolerant: true,
        }
    }
}

/// Outcome of validating the unpacked protocol directories
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Number of candidate directories before exclusion
    pub total: usize,
    /// Directories ready for processing, sorted
    pub valid: Vec<PathBuf>,
    pub excluded: Vec<PathBuf>,
    pub without_annotation: Vec<PathBuf>,
    /// Directories that had several annotation exports
    pub with_multiple_annotations: Vec<PathBuf>,
    /// Directories rejected for having several exports (strict mode)
    pub ambiguous: Vec<PathBuf>,
}

impl ValidationReport {
    pub fn invalid_count(&self) -> usize {
        self.without_annotation.len() + self.ambiguous.len()
    }
}

/// Validate every protocol directory under `unpacked_dir`
///
/// Each valid directory ends up with exactly one annotation export. In tolerant
/// mode, the longest export (by word count) is kept and the others are renamed
/// so they no longer match `*.xml`.
pub fn validate_protocol_dirs(
    unpacked_dir: &Path,
    options: &ValidationOptions,
) -> CorpusResult<ValidationReport> {
    if !unpacked_dir.is_dir() {
        return Err(CorpusError::io(
            unpacked_dir,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "unpacked protocol directory is missing, unpack the archives first",
            ),
        ));
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(unpacked_dir).map_err(|e| CorpusError::io(unpacked_dir, e))? {
        let path = entry.map_err(|e| CorpusError::io(unpacked_dir, e))?.path();
        if path.is_dir() {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut report = ValidationReport {
        total: candidates.len(),
        ..Default::default()
    };

    for dir in candidates {
        let name = dir_name(&dir);
        if options.excluded_dirs.contains(&name) {
            report.excluded.push(dir);
            continue;
        }

        let xml_paths = find_files_with_suffix(&dir.join(&options.annotation_dir), "xml")?;
        match xml_paths.len() {
            0 => report.without_annotation.push(dir),
            1 => report.valid.push(dir),
            _ if options.tolerant => {
                warn!(
                    "Protocol dir {:?} has {} annotation files, keeping the longest",
                    dir,
                    xml_paths.len()
                );
                let longest = choose_longest_xml(&xml_paths)?;
                for path in xml_paths.iter().filter(|p| **p != longest) {
                    set_aside(path)?;
                }
                report.with_multiple_annotations.push(dir.clone());
                report.valid.push(dir);
            }
            _ => {
                report.with_multiple_annotations.push(dir.clone());
                report.ambiguous.push(dir);
            }
        }
    }

    info!(
        "{} out of {} unpacked protocol dirs are good",
        report.valid.len(),
        report.total
    );
    info!(
        "Protocol dirs without annotation for instance are: {:?}",
        &report.without_annotation[..report.without_annotation.len().min(3)]
    );
    info!(
        "Protocol dirs with multiple annotations for instance are: {:?}",
        &report.with_multiple_annotations[..report.with_multiple_annotations.len().min(3)]
    );

    Ok(report)
}

/// Base name of a directory
pub fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The export with the most whitespace-separated words; the first wins ties
fn choose_longest_xml(paths: &[PathBuf]) -> CorpusResult<PathBuf> {
    let mut longest: Option<(usize, &PathBuf)> = None;
    for path in paths {
        let words = read_annotation_xml(path)?.split_whitespace().count();
        if longest.is_none_or(|(best, _)| words > best) {
            longest = Some((words, path));
        }
    }
    longest
        .map(|(_, path)| path.clone())
        .ok_or_else(|| CorpusError::AmbiguousFile {
            dir: PathBuf::new(),
            suffix: "xml".to_string(),
            found: 0,
        })
}

fn set_aside(path: &Path) -> CorpusResult<()> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path.with_file_name(format!("{}{}", stem, SET_ASIDE_SUFFIX));
    fs::rename(path, &target).map_err(|e| CorpusError::io(path, e))
}
