use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CorpusError, CorpusResult};

static CHAR_OFFSETS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"char=(\d+),(\d+)").expect("valid char offsets regex"));

/// Parse the `(start, end)` character offsets of a pointer target such as
/// `catma://CATMA_1234#char=10,57`. The last `char=` occurrence wins.
pub fn extract_offsets(pointer: &str) -> CorpusResult<(usize, usize)> {
    let caps = CHAR_OFFSETS_RE
        .captures_iter(pointer)
        .last()
        .ok_or_else(|| CorpusError::MalformedPointer(pointer.to_string()))?;

    let parse = |i: usize| {
        caps[i]
            .parse::<usize>()
            .map_err(|_| CorpusError::MalformedPointer(pointer.to_string()))
    };
    Ok((parse(1)?, parse(2)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_offsets() {
        assert_eq!(
            extract_offsets("catma://CATMA_ABC#char=10,57").unwrap(),
            (10, 57)
        );
    }

    #[test]
    fn test_last_occurrence_wins() {
        assert_eq!(
            extract_offsets("doc#char=1,2 other#char=30,40").unwrap(),
            (30, 40)
        );
    }

    #[test]
    fn test_missing_offsets() {
        assert!(matches!(
            extract_offsets("catma://CATMA_ABC#line=1"),
            Err(CorpusError::MalformedPointer(_))
        ));
        assert!(matches!(
            extract_offsets("#char=99999999999999999999999,1"),
            Err(CorpusError::MalformedPointer(_))
        ));
    }
}
