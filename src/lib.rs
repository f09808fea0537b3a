//! Story Forge: prompt construction and output cleanup for LLM-written
//! short stories.
//!
//! Turns a handful of story parameters into a genre-aware instruction
//! prompt, and turns the raw text a language model sends back into
//! de-duplicated, paragraphed prose with reading statistics. The model
//! call itself sits behind the `TextGenerator` trait.

pub mod core;
pub mod schema;

pub use crate::core::pipeline::{GeneratedStory, StoryPipeline, TextGenerator};
pub use crate::core::postprocess::{postprocess, ContentQualityError};
pub use crate::core::prompt::build_prompt;
pub use crate::schema::params::StoryParameters;
pub use crate::schema::story::{FormattedStory, StoryStatistics};
