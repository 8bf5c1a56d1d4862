use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for corpus operations
pub type CorpusResult<T> = Result<T, CorpusError>;

/// Errors raised while turning a protocol directory into labeled speaker turns
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("expected a single *.{suffix} file in {dir:?}, found {found}")]
    AmbiguousFile {
        dir: PathBuf,
        suffix: String,
        found: usize,
    },

    #[error("malformed annotation file: {0}")]
    MalformedAnnotation(String),

    #[error(
        "segment ids differ between label and offset mappings (only labeled: {only_labeled:?}, only offsets: {only_offsets:?})"
    )]
    Consistency {
        only_labeled: Vec<String>,
        only_offsets: Vec<String>,
    },

    #[error("pointer has no char=<start>,<end> offsets: {0:?}")]
    MalformedPointer(String),

    #[error("committee name marker not found in transcript")]
    CommitteeNotFound,

    #[error("label {label:?} at ({start}, {end}) is not contained in a speaker turn: {detail}")]
    Containment {
        label: String,
        start: usize,
        end: usize,
        detail: String,
    },

    #[error("label type {label_type:?} references base type {base_type:?} before it is declared")]
    TaxonomyOrder {
        label_type: String,
        base_type: String,
    },

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive extraction failed for {path:?}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("output error: {0}")]
    Output(#[from] csv::Error),
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }
}
