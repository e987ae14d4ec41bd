use serde::{Deserialize, Serialize};

pub const NO_SUMMARY: &str = "No summary available";
pub const NO_DATE: &str = "Date not available";

/// Title keywords worth two points in the engagement score.
const HIGH_KEYWORDS: [&str; 10] = [
    "breakthrough",
    "revolutionary",
    "major",
    "new",
    "latest",
    "ai",
    "quantum",
    "innovative",
    "discovery",
    "advanced",
];

/// Title keywords worth one point.
const MEDIUM_KEYWORDS: [&str; 5] = ["technology", "research", "development", "tool", "update"];

/// A candidate news item. The title is the dedup key across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Free-form, may be [`NO_DATE`].
    pub date: String,
    pub source: String,
    /// View counter or a High/Medium label, depending on the feed.
    pub engagement: String,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: NO_SUMMARY.to_string(),
            date: NO_DATE.to_string(),
            source: String::new(),
            engagement: String::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.link.trim().is_empty()
    }

    pub fn engagement_score(&self) -> u32 {
        engagement_score(&self.title)
    }
}

/// Keyword-weighted score over the lowercase title. Substring matches count,
/// so "AI" inside "said" scores as well.
pub fn engagement_score(title: &str) -> u32 {
    let lower = title.to_lowercase();
    let high = HIGH_KEYWORDS.iter().filter(|k| lower.contains(*k)).count() as u32;
    let medium = MEDIUM_KEYWORDS.iter().filter(|k| lower.contains(*k)).count() as u32;
    high * 2 + medium
}

/// Cut `summary` to `max_chars` characters and append "..." when it is longer.
pub fn truncate_summary(summary: &str, max_chars: usize) -> String {
    match summary.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &summary[..byte_idx]),
        None => summary.to_string(),
    }
}

/// Trimmed text, or `fallback` when nothing is left.
pub(crate) fn text_or(text: &str, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
