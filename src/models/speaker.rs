use serde::{Deserialize, Serialize};

use super::NormalizedText;

/// One speaker turn, addressed by character offsets into the normalized transcript
///
/// `name_start..text_start` covers the speaker header line and
/// `text_start..text_end` covers everything said until the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeakerSpan {
    pub name_start: usize,
    pub text_start: usize,
    pub text_end: usize,
}

impl SpeakerSpan {
    /// The speaker header, e.g. `היו"ר משה גפני:\n`
    pub fn name<'a>(&self, text: &'a NormalizedText) -> &'a str {
        text.slice(self.name_start, self.text_start)
    }

    /// What the speaker said
    pub fn body<'a>(&self, text: &'a NormalizedText) -> &'a str {
        text.slice(self.text_start, self.text_end)
    }

    /// Whether `[start, end)` lies inside this turn, header included
    pub fn contains(&self, start: usize, end: usize) -> bool {
        self.name_start <= start && end <= self.text_end
    }
}
