use serde::{Deserialize, Serialize};

/// Average silent reading speed used for the reading-time estimate.
pub const DEFAULT_WORDS_PER_MINUTE: usize = 200;

/// Separator placed between paragraphs of a formatted story.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Summary numbers shown next to a finished story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryStatistics {
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    /// Estimated reading time in whole minutes, never less than one.
    pub reading_time: usize,
}

impl StoryStatistics {
    /// Derive statistics from story text at the default reading speed.
    pub fn from_text(text: &str) -> Self {
        Self::with_reading_speed(text, DEFAULT_WORDS_PER_MINUTE)
    }

    pub fn with_reading_speed(text: &str, words_per_minute: usize) -> Self {
        let words = text.split_whitespace().count();
        let blocks: Vec<&str> = text
            .split(PARAGRAPH_SEPARATOR)
            .filter(|p| !p.trim().is_empty())
            .collect();
        // Counted per block so a paragraph ending in `?` or `!` does not
        // merge with the first sentence of the next one.
        let sentences = blocks
            .iter()
            .map(|block| block.split('.').filter(|s| !s.trim().is_empty()).count())
            .sum();
        let paragraphs = blocks.len();
        let reading_time = (words / words_per_minute.max(1)).max(1);
        Self {
            words,
            sentences,
            paragraphs,
            reading_time,
        }
    }
}

/// Cleaned, paragraphed story text together with its statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedStory {
    pub text: String,
    pub stats: StoryStatistics,
}

impl FormattedStory {
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text
            .split(PARAGRAPH_SEPARATOR)
            .filter(|p| !p.trim().is_empty())
    }
}
