use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CorpusError, CorpusResult};

/// "Committee of" followed by a run of Hebrew letters and spaces
static COMMITTEE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ועדת[\x{0590}-\x{05FF} ]*").expect("valid committee regex"));

/// "Protocol no." followed by digits
static PROTOCOL_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"פרוטוקול מס' *\d+").expect("valid protocol number regex"));

const COMMITTEE_TOKENS: usize = 4;

/// First committee name in the transcript, cut to its first four words
pub fn extract_committee(text: &str) -> CorpusResult<String> {
    let found = COMMITTEE_RE
        .find(text)
        .ok_or(CorpusError::CommitteeNotFound)?;
    Ok(found
        .as_str()
        .split_whitespace()
        .take(COMMITTEE_TOKENS)
        .collect::<Vec<_>>()
        .join(" "))
}

/// The "protocol no. N" marker, if the transcript has one
pub fn extract_protocol_number(text: &str) -> Option<String> {
    PROTOCOL_NUMBER_RE
        .find(text)
        .map(|m| m.as_str().trim().to_string())
}
