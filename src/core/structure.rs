/// Genre structure table: the four narrative beats that guide each genre.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::params::{fold_label, Genre};

/// Genre whose beats are used when a requested genre is not in the table.
pub const DEFAULT_GENRE: &str = "adventure";

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("genre '{0}' has an empty beat description")]
    EmptyBeat(String),
}

/// Opening, development, climax and resolution guidance for one genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Beats")]
pub struct NarrativeBeats {
    pub opening: String,
    pub development: String,
    pub climax: String,
    pub resolution: String,
}

impl NarrativeBeats {
    fn from_static(beats: &[&str; 4]) -> Self {
        Self {
            opening: beats[0].to_string(),
            development: beats[1].to_string(),
            climax: beats[2].to_string(),
            resolution: beats[3].to_string(),
        }
    }

    /// Beats paired with their heading, in story order.
    pub fn labelled(&self) -> [(&'static str, &str); 4] {
        [
            ("Opening", self.opening.as_str()),
            ("Development", self.development.as_str()),
            ("Climax", self.climax.as_str()),
            ("Resolution", self.resolution.as_str()),
        ]
    }

    fn has_empty_beat(&self) -> bool {
        self.labelled().iter().any(|(_, text)| text.trim().is_empty())
    }
}

static BUILTIN_BEATS: [(&str, [&str; 4]); 6] = [
    (
        "suspense",
        [
            "Create an atmosphere of tension and uncertainty",
            "Build suspense through pacing, foreshadowing, and mystery",
            "Reveal the truth with maximum impact",
            "Provide a satisfying conclusion that ties up loose ends",
        ],
    ),
    (
        "adventure",
        [
            "Establish the quest or journey",
            "Present challenges and obstacles to overcome",
            "Face the greatest challenge or enemy",
            "Achieve the goal and show character growth",
        ],
    ),
    (
        "fantasy",
        [
            "Introduce the magical world and its rules",
            "Explore magical elements and their consequences",
            "Confront the magical threat or complete the quest",
            "Restore balance to the magical world",
        ],
    ),
    (
        "drama",
        [
            "Establish character relationships and conflicts",
            "Deepen emotional conflicts and character development",
            "Face the emotional crisis or life-changing moment",
            "Show character growth and resolution of conflicts",
        ],
    ),
    (
        "mystery",
        [
            "Present the mystery or crime to be solved",
            "Gather clues and red herrings, build intrigue",
            "Reveal the solution and confront the perpetrator",
            "Explain the mystery and show justice served",
        ],
    ),
    (
        "horror",
        [
            "Establish normalcy before introducing the supernatural threat",
            "Escalate fear through psychological and physical terror",
            "Confront the ultimate horror",
            "Survive or succumb to the horror with lasting impact",
        ],
    ),
];

/// Read-only map from genre key to narrative beats.
///
/// Always contains the [`DEFAULT_GENRE`] entry: tables start from the
/// built-in genres and can only be extended or overridden.
#[derive(Debug, Clone)]
pub struct GenreStructures {
    entries: FxHashMap<String, NarrativeBeats>,
}

impl Default for GenreStructures {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GenreStructures {
    /// The six genres the story form offers.
    pub fn builtin() -> Self {
        let entries = BUILTIN_BEATS
            .iter()
            .map(|(key, beats)| (key.to_string(), NarrativeBeats::from_static(beats)))
            .collect();
        Self { entries }
    }

    /// Built-in table extended with the genres in a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Self, StructureError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Built-in table extended with genres from a RON map of
    /// `"name": Beats(opening: .., development: .., climax: .., resolution: ..)`.
    pub fn parse_ron(input: &str) -> Result<Self, StructureError> {
        let raw: FxHashMap<String, NarrativeBeats> = ron::from_str(input)?;
        let mut table = Self::builtin();
        for (name, beats) in raw {
            if beats.has_empty_beat() {
                return Err(StructureError::EmptyBeat(name));
            }
            table.insert(&name, beats);
        }
        Ok(table)
    }

    /// Merge another table into this one. Entries from `other` win.
    pub fn merge(&mut self, other: GenreStructures) {
        for (key, beats) in other.entries {
            self.entries.insert(key, beats);
        }
    }

    pub fn insert(&mut self, genre: &str, beats: NarrativeBeats) {
        self.entries.insert(fold_label(genre), beats);
    }

    pub fn contains(&self, genre: &Genre) -> bool {
        self.entries.contains_key(&genre.key())
    }

    /// Genre keys in the table, sorted.
    pub fn genres(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    /// Beats for `genre`, falling back to the default genre when the
    /// table has no entry for it.
    pub fn beats_for(&self, genre: &Genre) -> &NarrativeBeats {
        let key = genre.key();
        match self.entries.get(&key) {
            Some(beats) => beats,
            None => {
                tracing::debug!(
                    genre = %genre,
                    fallback = DEFAULT_GENRE,
                    "unknown genre, using default beats"
                );
                self.default_beats()
            }
        }
    }

    fn default_beats(&self) -> &NarrativeBeats {
        // Present by construction: every table starts from `builtin()` and
        // entries are never removed.
        &self.entries[DEFAULT_GENRE]
    }
}
