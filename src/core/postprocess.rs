/// Post-processing pass: turns raw model output into paragraphed prose.
///
/// Steps run in a fixed order: sentence de-duplication, whitespace and
/// punctuation normalization, paragraph segmentation, paragraph join and
/// statistics. Each step is also exposed on its own.

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::schema::story::{
    FormattedStory, StoryStatistics, DEFAULT_WORDS_PER_MINUTE, PARAGRAPH_SEPARATOR,
};

/// Delimiter used to split and rejoin sentences during de-duplication.
const SENTENCE_JOINER: &str = ". ";

const DEFAULT_CUE_WORDS: [&str; 6] = [
    "however",
    "meanwhile",
    "suddenly",
    "later",
    "then",
    "after",
];

/// Raw text could not be turned into a usable story. The caller should
/// retry generation, typically with different sampling settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentQualityError {
    #[error("no usable sentences remain after de-duplication")]
    NoUsableSentences,
    #[error("story has {words} words, below the minimum of {minimum}")]
    TooShort { words: usize, minimum: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// How cue words are found in a sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueMatch {
    /// Anywhere in the lowercased sentence, so "then" also fires on
    /// "strengthen".
    #[default]
    Substring,
    /// Only as a whole word.
    WholeWord,
}

/// Tunable thresholds for the post-processing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Sentences whose trimmed text is shorter than this many characters
    /// are dropped during de-duplication.
    pub min_sentence_chars: usize,
    /// A paragraph is only closed once it holds this many sentences.
    pub min_paragraph_sentences: usize,
    /// Transition words that close a paragraph once it is long enough.
    pub cue_words: Vec<String>,
    pub cue_match: CueMatch,
    pub words_per_minute: usize,
    /// Stories with fewer words are rejected. Zero disables the check.
    pub min_viable_words: usize,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            min_sentence_chars: 6,
            min_paragraph_sentences: 3,
            cue_words: DEFAULT_CUE_WORDS.iter().map(|w| w.to_string()).collect(),
            cue_match: CueMatch::default(),
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            min_viable_words: 0,
        }
    }
}

impl PostProcessConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a config from RON. Missing fields keep their defaults.
    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

/// The post-processing pass, configured once and reused.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    config: PostProcessConfig,
    cues: FxHashSet<String>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(PostProcessConfig::default())
    }
}

impl PostProcessor {
    pub fn new(config: PostProcessConfig) -> Self {
        let cues = config
            .cue_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { config, cues }
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Run every step over `raw` and derive statistics for the result.
    pub fn process(&self, raw: &str) -> Result<FormattedStory, ContentQualityError> {
        let sentences = unique_sentences(raw, self.config.min_sentence_chars);
        if sentences.is_empty() {
            tracing::debug!(input_chars = raw.len(), "no sentences survived de-duplication");
            return Err(ContentQualityError::NoUsableSentences);
        }

        let normalized = normalize_punctuation(&sentences.join(SENTENCE_JOINER));
        let paragraphs = self.segment_paragraphs(&normalized);
        if paragraphs.is_empty() {
            return Err(ContentQualityError::NoUsableSentences);
        }

        let text = paragraphs.join(PARAGRAPH_SEPARATOR);
        let stats = StoryStatistics::with_reading_speed(&text, self.config.words_per_minute);
        if stats.words < self.config.min_viable_words {
            return Err(ContentQualityError::TooShort {
                words: stats.words,
                minimum: self.config.min_viable_words,
            });
        }

        tracing::debug!(
            unique_sentences = sentences.len(),
            paragraphs = stats.paragraphs,
            words = stats.words,
            "post-processed story"
        );
        Ok(FormattedStory { text, stats })
    }

    /// Group sentences into paragraphs.
    ///
    /// A paragraph closes once it holds `min_paragraph_sentences`
    /// sentences and either the current sentence is the last one or it
    /// contains a cue word. Leftover sentences form the final paragraph.
    pub fn segment_paragraphs(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let last = sentences.len().saturating_sub(1);
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for (i, sentence) in sentences.iter().enumerate() {
            current.push(sentence);
            if current.len() >= self.config.min_paragraph_sentences
                && (i == last || self.has_cue_word(sentence))
            {
                paragraphs.push(close_paragraph(&current));
                current.clear();
            }
        }
        if !current.is_empty() {
            paragraphs.push(close_paragraph(&current));
        }
        paragraphs
    }

    /// Whether `sentence` contains one of the cue words, matched as
    /// configured by `cue_match`.
    pub fn has_cue_word(&self, sentence: &str) -> bool {
        let lowered = sentence.to_lowercase();
        match self.config.cue_match {
            CueMatch::Substring => self.cues.iter().any(|cue| lowered.contains(cue.as_str())),
            CueMatch::WholeWord => lowered
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .filter(|w| !w.is_empty())
                .any(|w| self.cues.contains(w)),
        }
    }
}

/// Post-process with the default configuration.
pub fn postprocess(raw: &str) -> Result<FormattedStory, ContentQualityError> {
    PostProcessor::default().process(raw)
}

/// Drop repeated and too-short sentences, keeping first occurrences in
/// order, and rejoin the rest with `". "`.
///
/// Sentences are compared trimmed, lowercased and without trailing
/// `.`, `?` or `!`; the kept text keeps its original form. Running this
/// twice gives the same result as once.
pub fn deduplicate_sentences(text: &str, min_sentence_chars: usize) -> String {
    unique_sentences(text, min_sentence_chars).join(SENTENCE_JOINER)
}

fn unique_sentences(text: &str, min_sentence_chars: usize) -> Vec<&str> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut kept = Vec::new();
    let mut dropped = 0usize;

    for sentence in text.split(SENTENCE_JOINER) {
        let trimmed = sentence.trim();
        let key = trimmed.trim_end_matches(['.', '?', '!']).trim_end().to_lowercase();
        if key.chars().count() < min_sentence_chars || !seen.insert(key) {
            dropped += 1;
            continue;
        }
        kept.push(trimmed);
    }

    if dropped > 0 {
        tracing::debug!(kept = kept.len(), dropped, "dropped duplicate or short sentences");
    }
    kept
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn punctuation_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{2,}|\?{2,}|!{2,}").expect("valid punctuation regex"))
}

/// Collapse whitespace runs to one space and runs of `.`, `?` or `!` to
/// a single mark.
pub fn normalize_punctuation(text: &str) -> String {
    let spaced = whitespace_run().replace_all(text, " ");
    punctuation_run()
        .replace_all(&spaced, |caps: &regex::Captures<'_>| {
            caps[0].chars().next().map(String::from).unwrap_or_default()
        })
        .into_owned()
}

/// Split on `.` and keep the trimmed, non-empty pieces.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn close_paragraph(sentences: &[&str]) -> String {
    let mut paragraph = sentences.join(SENTENCE_JOINER);
    if !paragraph.ends_with(['?', '!']) {
        paragraph.push('.');
    }
    paragraph
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALEX: &str = "Alex ran. Alex ran. The door creaked. The door creaked. \
Suddenly, it opened. Alex gasped. She stepped inside. It was dark. \
Meanwhile, footsteps echoed.";

    #[test]
    fn dedup_removes_repeats_and_keeps_order() {
        let unique = unique_sentences(ALEX, 6);
        assert_eq!(
            unique,
            vec![
                "Alex ran",
                "The door creaked",
                "Suddenly, it opened",
                "Alex gasped",
                "She stepped inside",
                "It was dark",
                "Meanwhile, footsteps echoed.",
            ]
        );
    }

    #[test]
    fn dedup_compares_case_insensitively() {
        let out = deduplicate_sentences("The wind howled. THE WIND HOWLED. The end came", 6);
        assert_eq!(out, "The wind howled. The end came");
    }

    #[test]
    fn dedup_ignores_terminal_punctuation() {
        let story = postprocess("The door creaked. It opened slowly. The door creaked.").unwrap();
        assert_eq!(story.text, "The door creaked. It opened slowly.");
        assert_eq!(story.stats.sentences, 2);

        assert_eq!(
            deduplicate_sentences("Who goes there. WHO GOES THERE?", 6),
            "Who goes there"
        );
    }

    #[test]
    fn dedup_drops_short_fragments() {
        assert_eq!(deduplicate_sentences("Ok. Yes. It was over", 6), "It was over");
        assert_eq!(deduplicate_sentences("Ok. Yes. It was over", 0), "Ok. Yes. It was over");
    }

    #[test]
    fn dedup_is_idempotent() {
        let inputs = [
            ALEX,
            "a.. b. a.. b. Something longer here.",
            "  spaced   out.  spaced   out. ",
            "",
        ];
        for input in inputs {
            let once = deduplicate_sentences(input, 6);
            let twice = deduplicate_sentences(&once, 6);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn normalization_collapses_runs() {
        assert_eq!(
            normalize_punctuation("Wait...  what??\n\nNo!!!  Really?!"),
            "Wait. what? No! Really?!"
        );
    }

    #[test]
    fn cue_words_match_substrings_by_default() {
        let pp = PostProcessor::default();
        assert!(pp.has_cue_word("Then, the lights went out"));
        assert!(pp.has_cue_word("It was LATER than she thought"));
        assert!(pp.has_cue_word("She would strengthen the walls"));
        assert!(pp.has_cue_word("The afternoon was quiet"));
        assert!(!pp.has_cue_word("The door creaked"));
    }

    #[test]
    fn whole_word_cue_matching() {
        let pp = PostProcessor::new(PostProcessConfig {
            cue_match: CueMatch::WholeWord,
            ..PostProcessConfig::default()
        });
        assert!(pp.has_cue_word("Then, the lights went out"));
        assert!(pp.has_cue_word("It was LATER than she thought"));
        assert!(!pp.has_cue_word("She would strengthen the walls"));
        assert!(!pp.has_cue_word("The afternoon was quiet"));
    }

    #[test]
    fn embedded_cue_closes_paragraph_unless_whole_word() {
        let text = "One fish swam. Two fish swam. They would strengthen the walls. \
Four more swam. Five swam";
        assert_eq!(
            PostProcessor::default().segment_paragraphs(text),
            vec![
                "One fish swam. Two fish swam. They would strengthen the walls.",
                "Four more swam. Five swam.",
            ]
        );

        let whole_word = PostProcessor::new(PostProcessConfig {
            cue_match: CueMatch::WholeWord,
            ..PostProcessConfig::default()
        });
        assert_eq!(whole_word.segment_paragraphs(text).len(), 1);
    }

    #[test]
    fn paragraph_closes_on_cue_after_three_sentences() {
        let story = postprocess(ALEX).unwrap();
        let paragraphs: Vec<&str> = story.paragraphs().collect();
        assert_eq!(
            paragraphs,
            vec![
                "Alex ran. The door creaked. Suddenly, it opened.",
                "Alex gasped. She stepped inside. It was dark. Meanwhile, footsteps echoed.",
            ]
        );
        assert_eq!(story.stats.sentences, 7);
        assert_eq!(story.stats.paragraphs, 2);
        assert_eq!(story.stats.words, 19);
        assert_eq!(story.stats.reading_time, 1);
    }

    #[test]
    fn cue_before_minimum_does_not_close() {
        let pp = PostProcessor::default();
        let paragraphs =
            pp.segment_paragraphs("Then it rained. Later it stopped. Birds sang. The sun rose");
        assert_eq!(
            paragraphs,
            vec!["Then it rained. Later it stopped. Birds sang. The sun rose."]
        );
    }

    #[test]
    fn leftover_sentences_flush_as_final_paragraph() {
        let pp = PostProcessor::new(PostProcessConfig {
            cue_words: vec!["however".to_string()],
            ..PostProcessConfig::default()
        });
        let paragraphs = pp.segment_paragraphs(
            "One fish swam. Two fish swam. However the third hid. Four. Five",
        );
        assert_eq!(
            paragraphs,
            vec![
                "One fish swam. Two fish swam. However the third hid.",
                "Four. Five.",
            ]
        );
    }

    #[test]
    fn paragraph_keeps_question_or_exclamation_ending() {
        let pp = PostProcessor::default();
        let paragraphs = pp.segment_paragraphs("Who is there. Nobody answered. Is anyone home?");
        assert_eq!(paragraphs, vec!["Who is there. Nobody answered. Is anyone home?"]);
    }

    #[test]
    fn five_char_sentence_is_content_quality_error() {
        assert_eq!(postprocess("Done."), Err(ContentQualityError::NoUsableSentences));
        assert_eq!(postprocess(""), Err(ContentQualityError::NoUsableSentences));
        assert_eq!(postprocess("Hello"), Err(ContentQualityError::NoUsableSentences));
        assert_eq!(postprocess("Hello."), Err(ContentQualityError::NoUsableSentences));
        assert_eq!(postprocess("Quiet."), Err(ContentQualityError::NoUsableSentences));
        assert_eq!(postprocess("  Hush!  "), Err(ContentQualityError::NoUsableSentences));
    }

    #[test]
    fn punctuation_only_input_is_rejected() {
        assert_eq!(postprocess("........"), Err(ContentQualityError::NoUsableSentences));
    }

    #[test]
    fn min_viable_words_is_enforced() {
        let pp = PostProcessor::new(PostProcessConfig {
            min_viable_words: 50,
            ..PostProcessConfig::default()
        });
        assert_eq!(
            pp.process(ALEX),
            Err(ContentQualityError::TooShort {
                words: 19,
                minimum: 50
            })
        );
    }

    #[test]
    fn config_parses_partial_ron() {
        let config = PostProcessConfig::parse_ron(
            r#"(min_paragraph_sentences: 2, cue_words: ["finally"])"#,
        )
        .unwrap();
        assert_eq!(config.min_paragraph_sentences, 2);
        assert_eq!(config.cue_words, vec!["finally"]);
        assert_eq!(config.min_sentence_chars, 6);
        assert_eq!(config.words_per_minute, 200);
        assert_eq!(config.cue_match, CueMatch::Substring);

        let whole = PostProcessConfig::parse_ron("(cue_match: WholeWord)").unwrap();
        assert_eq!(whole.cue_match, CueMatch::WholeWord);
    }

    #[test]
    fn config_reports_bad_ron() {
        assert!(matches!(
            PostProcessConfig::parse_ron("(min_paragraph_sentences: \"three\")"),
            Err(ConfigError::Ron(_))
        ));
    }
}
