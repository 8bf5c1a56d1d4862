pub mod config;
pub mod error;
pub mod heuristics;
pub mod io;
pub mod models;
pub mod stages;

pub use config::CorpusConfig;
pub use error::{CorpusError, CorpusResult};
pub use io::{
    unpack_archives, validate_protocol_dirs, write_tsv, CorpusRow, RunSummary, ValidationOptions,
    ValidationReport,
};
pub use models::{LabelSpan, ReconciledTurn, SpeakerSpan, TextNormalization, Transcript};
pub use stages::{
    analyze_protocol, apply_label_policy, assemble_protocol, execute_stage0, execute_stage1,
    execute_stage2, execute_stage3, LabelPolicy, ProtocolAnalysis, ProtocolOutcome, Stage0Config,
    Stage3Config,
};
