use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A story parameter that the caller failed to supply or spelled wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("unrecognized {field}: '{value}'")]
    Unrecognized { field: &'static str, value: String },
}

/// Fold a label for case- and separator-insensitive comparison:
/// "Dialogue-Heavy", "dialogue heavy" and "DIALOGUE_HEAVY" all become
/// "dialogue_heavy".
pub(crate) fn fold_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for c in label.trim().chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Story genre. Unknown names are carried verbatim; the prompt builder
/// decides how to fall back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Suspense,
    Adventure,
    Fantasy,
    Drama,
    Mystery,
    Horror,
    Custom(String),
}

impl Genre {
    pub const BUILTIN: [Genre; 6] = [
        Genre::Suspense,
        Genre::Adventure,
        Genre::Fantasy,
        Genre::Drama,
        Genre::Mystery,
        Genre::Horror,
    ];

    /// Parse a genre label. Never fails: unknown labels become `Custom`.
    pub fn from_label(label: &str) -> Genre {
        match fold_label(label).as_str() {
            "suspense" => Genre::Suspense,
            "adventure" => Genre::Adventure,
            "fantasy" => Genre::Fantasy,
            "drama" => Genre::Drama,
            "mystery" => Genre::Mystery,
            "horror" => Genre::Horror,
            _ => Genre::Custom(label.trim().to_string()),
        }
    }

    /// Display label, e.g. "Suspense".
    pub fn label(&self) -> &str {
        match self {
            Self::Suspense => "Suspense",
            Self::Adventure => "Adventure",
            Self::Fantasy => "Fantasy",
            Self::Drama => "Drama",
            Self::Mystery => "Mystery",
            Self::Horror => "Horror",
            Self::Custom(name) => name,
        }
    }

    /// Key used to look the genre up in a structure table.
    pub fn key(&self) -> String {
        fold_label(self.label())
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WritingStyle {
    Narrative,
    Descriptive,
    DialogueHeavy,
    ActionPacked,
    Literary,
    Cinematic,
}

impl WritingStyle {
    pub const ALL: [WritingStyle; 6] = [
        WritingStyle::Narrative,
        WritingStyle::Descriptive,
        WritingStyle::DialogueHeavy,
        WritingStyle::ActionPacked,
        WritingStyle::Literary,
        WritingStyle::Cinematic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Narrative => "Narrative",
            Self::Descriptive => "Descriptive",
            Self::DialogueHeavy => "Dialogue-Heavy",
            Self::ActionPacked => "Action-Packed",
            Self::Literary => "Literary",
            Self::Cinematic => "Cinematic",
        }
    }
}

impl FromStr for WritingStyle {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_label(s).as_str() {
            "narrative" => Ok(Self::Narrative),
            "descriptive" => Ok(Self::Descriptive),
            "dialogue_heavy" => Ok(Self::DialogueHeavy),
            "action_packed" => Ok(Self::ActionPacked),
            "literary" => Ok(Self::Literary),
            "cinematic" => Ok(Self::Cinematic),
            _ => Err(ParameterError::Unrecognized {
                field: "writing_style",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WritingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target story length. Each category maps to a word range and to the
/// token budget requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthCategory {
    Short,
    Medium,
    Long,
}

impl LengthCategory {
    pub const ALL: [LengthCategory; 3] = [
        LengthCategory::Short,
        LengthCategory::Medium,
        LengthCategory::Long,
    ];

    /// Inclusive (min, max) target word count.
    pub fn word_range(&self) -> (u32, u32) {
        match self {
            Self::Short => (300, 500),
            Self::Medium => (500, 800),
            Self::Long => (800, 1200),
        }
    }

    pub fn max_new_tokens(&self) -> u32 {
        match self {
            Self::Short => 600,
            Self::Medium => 1000,
            Self::Long => 1500,
        }
    }

    /// Label as offered on the form, e.g. "Short (300-500 words)".
    pub fn label(&self) -> String {
        let (min, max) = self.word_range();
        let name = match self {
            Self::Short => "Short",
            Self::Medium => "Medium",
            Self::Long => "Long",
        };
        format!("{name} ({min}-{max} words)")
    }
}

impl FromStr for LengthCategory {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both "short" and the full form label.
        let head = s.split('(').next().unwrap_or_default();
        match fold_label(head).as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(ParameterError::Unrecognized {
                field: "length_category",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LengthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// The emotional tone requested for the story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    DarkMysterious,
    LightHopeful,
    IntenseThrilling,
    Melancholic,
    Humorous,
    Romantic,
    Eerie,
    Inspirational,
    Custom(String),
}

static MOOD_TABLE: [(Mood, &str); 8] = [
    (Mood::DarkMysterious, "Dark & Mysterious"),
    (Mood::LightHopeful, "Light & Hopeful"),
    (Mood::IntenseThrilling, "Intense & Thrilling"),
    (Mood::Melancholic, "Melancholic"),
    (Mood::Humorous, "Humorous"),
    (Mood::Romantic, "Romantic"),
    (Mood::Eerie, "Eerie"),
    (Mood::Inspirational, "Inspirational"),
];

impl Mood {
    pub fn builtin() -> impl Iterator<Item = &'static Mood> {
        MOOD_TABLE.iter().map(|(mood, _)| mood)
    }

    pub fn from_label(label: &str) -> Mood {
        let folded = fold_label(&label.replace('&', " "));
        MOOD_TABLE
            .iter()
            .find(|(_, l)| fold_label(&l.replace('&', " ")) == folded)
            .map(|(mood, _)| mood.clone())
            .unwrap_or_else(|| Mood::Custom(label.trim().to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Custom(label) => label,
            known => MOOD_TABLE
                .iter()
                .find(|(mood, _)| mood == known)
                .map(|(_, label)| *label)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the story takes place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Setting {
    ModernCity,
    SmallTown,
    FantasyRealm,
    SpaceStation,
    MedievalCastle,
    HauntedHouse,
    DesertIsland,
    UndergroundBunker,
    Forest,
    Custom(String),
}

static SETTING_TABLE: [(Setting, &str); 9] = [
    (Setting::ModernCity, "Modern City"),
    (Setting::SmallTown, "Small Town"),
    (Setting::FantasyRealm, "Fantasy Realm"),
    (Setting::SpaceStation, "Space Station"),
    (Setting::MedievalCastle, "Medieval Castle"),
    (Setting::HauntedHouse, "Haunted House"),
    (Setting::DesertIsland, "Desert Island"),
    (Setting::UndergroundBunker, "Underground Bunker"),
    (Setting::Forest, "Forest"),
];

impl Setting {
    pub fn builtin() -> impl Iterator<Item = &'static Setting> {
        SETTING_TABLE.iter().map(|(setting, _)| setting)
    }

    pub fn from_label(label: &str) -> Setting {
        let folded = fold_label(label);
        SETTING_TABLE
            .iter()
            .find(|(_, l)| fold_label(l) == folded)
            .map(|(setting, _)| setting.clone())
            .unwrap_or_else(|| Setting::Custom(label.trim().to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Custom(label) => label,
            known => SETTING_TABLE
                .iter()
                .find(|(setting, _)| setting == known)
                .map(|(_, label)| *label)
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the form collects for one generation request.
///
/// Fields are private; construct through [`StoryParameters::new`] so the
/// required text fields are known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStoryParameters")]
pub struct StoryParameters {
    character_name: String,
    genre: Genre,
    context: String,
    writing_style: WritingStyle,
    length_category: LengthCategory,
    mood: Mood,
    setting: Setting,
}

impl StoryParameters {
    pub fn new(
        character_name: impl Into<String>,
        genre: Genre,
        context: impl Into<String>,
        writing_style: WritingStyle,
        length_category: LengthCategory,
        mood: Mood,
        setting: Setting,
    ) -> Result<Self, ParameterError> {
        let character_name = character_name.into().trim().to_string();
        if character_name.is_empty() {
            return Err(ParameterError::Missing("character_name"));
        }
        let context = context.into();
        if context.trim().is_empty() {
            return Err(ParameterError::Missing("context"));
        }
        Ok(Self {
            character_name,
            genre,
            context,
            writing_style,
            length_category,
            mood,
            setting,
        })
    }

    /// Build parameters from the plain labels a form submits.
    pub fn from_labels(labels: &ParameterLabels) -> Result<Self, ParameterError> {
        Self::new(
            labels.character_name.as_str(),
            Genre::from_label(&labels.genre),
            labels.context.as_str(),
            labels.writing_style.parse()?,
            labels.length_category.parse()?,
            Mood::from_label(&labels.mood),
            Setting::from_label(&labels.setting),
        )
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn genre(&self) -> &Genre {
        &self.genre
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn writing_style(&self) -> WritingStyle {
        self.writing_style
    }

    pub fn length_category(&self) -> LengthCategory {
        self.length_category
    }

    pub fn mood(&self) -> &Mood {
        &self.mood
    }

    pub fn setting(&self) -> &Setting {
        &self.setting
    }

    /// File name offered when the finished story is downloaded.
    pub fn export_file_name(&self) -> String {
        format!(
            "{}_{}_{}.txt",
            self.character_name,
            self.genre.label(),
            self.setting.label().replace(' ', "_")
        )
    }
}

/// Unvalidated form values, as strings. This is the shape accepted from
/// JSON and RON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterLabels {
    pub character_name: String,
    pub genre: String,
    pub context: String,
    pub writing_style: String,
    pub length_category: String,
    pub mood: String,
    pub setting: String,
}

#[derive(Deserialize)]
struct RawStoryParameters {
    character_name: String,
    genre: Genre,
    context: String,
    writing_style: WritingStyle,
    length_category: LengthCategory,
    mood: Mood,
    setting: Setting,
}

impl TryFrom<RawStoryParameters> for StoryParameters {
    type Error = ParameterError;

    fn try_from(raw: RawStoryParameters) -> Result<Self, Self::Error> {
        StoryParameters::new(
            raw.character_name,
            raw.genre,
            raw.context,
            raw.writing_style,
            raw.length_category,
            raw.mood,
            raw.setting,
        )
    }
}
