/// Prompt builder: renders story parameters into an instruction prompt.

use rand::Rng;
use std::fmt::Write;

use crate::core::structure::GenreStructures;
use crate::schema::params::StoryParameters;

/// General writing instructions shared by every genre.
const INSTRUCTIONS: [&str; 7] = [
    "Write a complete, engaging story from beginning to end",
    "Use vivid descriptions and realistic dialogue",
    "Show character development and emotional depth",
    "Create a satisfying narrative arc with proper pacing",
    "Include specific details that bring the story to life",
    "Maintain the chosen mood and writing style throughout",
    "Make sure the story has a clear beginning, middle, and end",
];

const CLOSING_DIRECTIVE: &str = "Write the complete story now. It must reach a proper ending \
that resolves the main conflict. Do not stop abruptly, do not leave the story unfinished, \
and never end with \"to be continued\" or a similar cliffhanger.";

/// Renders [`StoryParameters`] into a prompt using a genre structure table.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    structures: GenreStructures,
}

impl PromptBuilder {
    pub fn new(structures: GenreStructures) -> Self {
        Self { structures }
    }

    pub fn structures(&self) -> &GenreStructures {
        &self.structures
    }

    /// Build the prompt. The output depends only on `params` and the
    /// structure table.
    pub fn build(&self, params: &StoryParameters) -> String {
        let genre = params.genre();
        let beats = self.structures.beats_for(genre);
        let mut prompt = String::with_capacity(1024 + params.context().len());

        // `write!` into a String cannot fail.
        let _ = writeln!(
            prompt,
            "Write a compelling {} story with the following requirements:",
            genre.label().to_lowercase()
        );
        prompt.push('\n');
        let _ = writeln!(prompt, "CHARACTER: {}", params.character_name());
        let _ = writeln!(prompt, "GENRE: {}", genre.label());
        let _ = writeln!(prompt, "SETTING: {}", params.setting().label());
        let _ = writeln!(prompt, "MOOD: {}", params.mood().label());
        let _ = writeln!(prompt, "STYLE: {}", params.writing_style().label());
        let _ = writeln!(prompt, "LENGTH: {}", params.length_category().label());

        prompt.push_str("\nCONTEXT AND BACKGROUND:\n");
        prompt.push_str(params.context());
        prompt.push('\n');

        prompt.push_str("\nSTORY STRUCTURE:\n");
        for (heading, text) in beats.labelled() {
            let _ = writeln!(prompt, "- {heading}: {text}");
        }

        prompt.push_str("\nINSTRUCTIONS:\n");
        for (i, line) in INSTRUCTIONS.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, line);
        }

        prompt.push('\n');
        prompt.push_str(CLOSING_DIRECTIVE);
        prompt
    }
}

/// Build a prompt with the built-in genre table.
pub fn build_prompt(params: &StoryParameters) -> String {
    PromptBuilder::default().build(params)
}

/// Append a random request token so an upstream response cache cannot
/// serve a previous story for an identical prompt.
pub fn with_uniqueness_token<R: Rng + ?Sized>(prompt: &str, rng: &mut R) -> String {
    let token: u64 = rng.gen();
    format!("{prompt}\n\n[request: {token:016x}]")
}
