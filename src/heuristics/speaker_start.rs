use std::collections::BTreeSet;

/// Section headers that look like speaker lines (`<text>:`) but open lists of
/// attendees, staff or agenda items instead of a turn.
pub const DEFAULT_NOT_SPEAKER_START_PHRASES: &[&str] = &[
    "נכחו",
    "חברי הוועדה",
    "חברי הכנסת",
    "חברי כנסת",
    "מוזמנים",
    "משתתפים באמצעים מקוונים",
    "ייעוץ משפטי",
    "יועץ משפטי",
    "יועצת משפטית",
    "מנהל הוועדה",
    "מנהלת הוועדה",
    "מנהל/ת הוועדה",
    "רישום פרלמנטרי",
    "רשם פרלמנטרי",
    "רשמת פרלמנטרית",
    "קצרנית פרלמנטרית",
    "סדר היום",
    "הצעת סדר היום",
];

/// Line-ending rule for speaker turn boundaries
#[derive(Debug, Clone)]
pub struct SpeakerStartRules {
    /// Exact, case-sensitive phrases (colons and newlines removed) that never start a turn
    pub not_speaker_start_phrases: BTreeSet<String>,
}

impl Default for SpeakerStartRules {
    fn default() -> Self {
        Self {
            not_speaker_start_phrases: DEFAULT_NOT_SPEAKER_START_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl SpeakerStartRules {
    pub fn new(phrases: impl IntoIterator<Item = String>) -> Self {
        Self {
            not_speaker_start_phrases: phrases.into_iter().collect(),
        }
    }

    /// A raw line opens a turn when it ends with `":\n"` and is not a known header
    pub fn is_speaker_start(&self, line: &str) -> bool {
        if !line.ends_with(":\n") {
            return false;
        }
        let stripped: String = line.chars().filter(|c| *c != ':' && *c != '\n').collect();
        !self.not_speaker_start_phrases.contains(&stripped)
    }
}
