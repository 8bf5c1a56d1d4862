/// Whitespace policy applied to transcript text before offsets are measured
///
/// The annotation tool counts characters against whatever text it was given, so the
/// same policy has to be used both when measuring line lengths and when slicing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextNormalization {
    /// Render each newline as two spaces and each tab as one space
    pub strip_newlines_and_tabs: bool,
}

impl TextNormalization {
    pub fn new(strip_newlines_and_tabs: bool) -> Self {
        Self {
            strip_newlines_and_tabs,
        }
    }

    /// Apply the policy to a piece of text
    pub fn apply(&self, text: &str) -> String {
        if self.strip_newlines_and_tabs {
            text.replace('\n', "  ").replace('\t', " ")
        } else {
            text.to_string()
        }
    }

    /// Length of `line` in characters once the policy has been applied
    pub fn effective_len(&self, line: &str) -> usize {
        if self.strip_newlines_and_tabs {
            line.chars().map(|c| if c == '\n' { 2 } else { 1 }).sum()
        } else {
            line.chars().count()
        }
    }
}

/// Normalized transcript text addressable by character offsets
#[derive(Debug, Clone)]
pub struct NormalizedText {
    text: String,
    /// Byte position of every char boundary, including the end of the string
    boundaries: Vec<usize>,
}

impl NormalizedText {
    pub fn new(text: String) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of characters in the text
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Slice by character offsets. Out-of-range bounds are clamped and an
    /// inverted range yields an empty string.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let len = self.char_len();
        let start = start.min(len);
        let end = end.min(len);
        if start >= end {
            return "";
        }
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }
}

/// A transcript loaded from disk: its newline-terminated lines and the
/// normalized full text the offsets refer to
#[derive(Debug, Clone)]
pub struct Transcript {
    pub lines: Vec<String>,
    pub text: NormalizedText,
    pub normalization: TextNormalization,
}

impl Transcript {
    /// Build from raw file content. Line endings are unified to `\n` first.
    pub fn from_content(content: &str, normalization: TextNormalization) -> Self {
        let content = content.replace("\r\n", "\n").replace('\r', "\n");
        let lines = content.split_inclusive('\n').map(str::to_string).collect();
        let text = NormalizedText::new(normalization.apply(&content));
        Self {
            lines,
            text,
            normalization,
        }
    }
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
