/// The story pipeline: parameters → prompt → generation → post-processing.
///
/// Generation itself is delegated to a [`TextGenerator`]; the pipeline
/// owns the retry policy for outputs that fail the content-quality check.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;

use crate::core::postprocess::{ConfigError, ContentQualityError, PostProcessConfig, PostProcessor};
use crate::core::prompt::{with_uniqueness_token, PromptBuilder};
use crate::core::structure::{GenreStructures, StructureError};
use crate::schema::generation::{clamp_temperature, GenerationSettings, MAX_TEMPERATURE};
use crate::schema::params::StoryParameters;
use crate::schema::story::FormattedStory;

/// Seed offset between attempts.
const RETRY_SEED_STRIDE: u64 = 7919;

/// Failure reported by the external text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("text generation failed: {message}")]
pub struct GeneratorError {
    message: String,
}

impl GeneratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Anything that turns a prompt into raw story text: an HTTP client for a
/// hosted model, a local model, or a canned response in tests.
pub trait TextGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, GeneratorError>;
}

impl<F> TextGenerator for F
where
    F: FnMut(&str, &GenerationSettings) -> Result<String, GeneratorError>,
{
    fn generate(
        &mut self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, GeneratorError> {
        self(prompt, settings)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("genre structure error: {0}")]
    Structure(#[from] StructureError),
    #[error("post-processing config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("no usable story after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: ContentQualityError,
    },
}

/// How to react when generated text fails post-processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Added to the temperature before each retry.
    pub temperature_step: f32,
    pub max_temperature: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            temperature_step: 0.1,
            max_temperature: MAX_TEMPERATURE,
        }
    }
}

impl RetryPolicy {
    /// Settings for attempt number `attempt` (zero-based).
    pub fn settings_for_attempt(
        &self,
        base: &GenerationSettings,
        base_seed: u64,
        attempt: u32,
    ) -> GenerationSettings {
        let boosted = base.temperature + self.temperature_step * attempt as f32;
        let mut settings = base.clone();
        settings.temperature = clamp_temperature(boosted.min(self.max_temperature));
        settings.random_seed =
            Some(base_seed.wrapping_add(attempt as u64 * RETRY_SEED_STRIDE));
        settings
    }
}

/// A finished story and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStory {
    pub prompt: String,
    pub story: FormattedStory,
    /// Number of generation calls made, including the successful one.
    pub attempts: u32,
    /// Settings of the successful attempt.
    pub settings: GenerationSettings,
}

/// The top-level story pipeline. Built via `StoryPipeline::builder()`.
#[derive(Debug, Clone)]
pub struct StoryPipeline {
    prompts: PromptBuilder,
    postprocessor: PostProcessor,
    retry: RetryPolicy,
    unique_prompts: bool,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `StoryPipeline`.
pub struct StoryPipelineBuilder {
    genre_files: Vec<String>,
    postprocess_config_path: Option<String>,
    retry: RetryPolicy,
    unique_prompts: bool,
    seed: u64,
    /// Directly provided structure table (for testing without files).
    structures: Option<GenreStructures>,
    /// Directly provided post-processing config (for testing without files).
    postprocess_config: Option<PostProcessConfig>,
}

impl StoryPipeline {
    pub fn builder() -> StoryPipelineBuilder {
        StoryPipelineBuilder {
            genre_files: Vec::new(),
            postprocess_config_path: None,
            retry: RetryPolicy::default(),
            unique_prompts: false,
            seed: 0,
            structures: None,
            postprocess_config: None,
        }
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocessor
    }

    /// The prompt sent for `params`, including the uniqueness token when
    /// enabled.
    pub fn prompt_for(&self, params: &StoryParameters) -> String {
        let prompt = self.prompts.build(params);
        if self.unique_prompts {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.generation_count));
            with_uniqueness_token(&prompt, &mut rng)
        } else {
            prompt
        }
    }

    /// Generate a story, retrying with a hotter temperature and a new seed
    /// whenever the output fails the content-quality check.
    ///
    /// Generator errors are returned immediately; only content-quality
    /// failures are retried.
    pub fn generate<G: TextGenerator + ?Sized>(
        &mut self,
        generator: &mut G,
        params: &StoryParameters,
        settings: GenerationSettings,
    ) -> Result<GeneratedStory, PipelineError> {
        let prompt = self.prompt_for(params);
        let base_seed = settings
            .random_seed
            .unwrap_or_else(|| self.seed.wrapping_add(self.generation_count));
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_failure = ContentQualityError::NoUsableSentences;

        for attempt in 0..max_attempts {
            let attempt_settings = self.retry.settings_for_attempt(&settings, base_seed, attempt);
            let raw = generator.generate(&prompt, &attempt_settings)?;

            match self.postprocessor.process(&raw) {
                Ok(story) => {
                    self.generation_count += 1;
                    tracing::info!(
                        attempts = attempt + 1,
                        words = story.stats.words,
                        paragraphs = story.stats.paragraphs,
                        "story generated"
                    );
                    return Ok(GeneratedStory {
                        prompt,
                        story,
                        attempts: attempt + 1,
                        settings: attempt_settings,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        temperature = attempt_settings.temperature,
                        error = %err,
                        "generated text failed quality check"
                    );
                    last_failure = err;
                }
            }
        }

        self.generation_count += 1;
        Err(PipelineError::Exhausted {
            attempts: max_attempts,
            last: last_failure,
        })
    }
}

impl StoryPipelineBuilder {
    /// Add a RON file of extra genre structures. Later files override
    /// earlier ones.
    pub fn genre_file(mut self, path: &str) -> Self {
        self.genre_files.push(path.to_string());
        self
    }

    pub fn postprocess_config(mut self, path: &str) -> Self {
        self.postprocess_config_path = Some(path.to_string());
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Append a seeded uniqueness token to every prompt.
    pub fn unique_prompts(mut self, enabled: bool) -> Self {
        self.unique_prompts = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide the structure table directly (for testing without files).
    pub fn with_structures(mut self, structures: GenreStructures) -> Self {
        self.structures = Some(structures);
        self
    }

    /// Provide the post-processing config directly (for testing without files).
    pub fn with_postprocess_config(mut self, config: PostProcessConfig) -> Self {
        self.postprocess_config = Some(config);
        self
    }

    pub fn build(self) -> Result<StoryPipeline, PipelineError> {
        let mut structures = self.structures.unwrap_or_default();
        for path in &self.genre_files {
            structures.merge(GenreStructures::load_from_ron(Path::new(path))?);
        }

        // A config file takes precedence over one provided directly.
        let config = match self.postprocess_config_path {
            Some(ref path) => PostProcessConfig::load_from_ron(Path::new(path))?,
            None => self.postprocess_config.unwrap_or_default(),
        };

        Ok(StoryPipeline {
            prompts: PromptBuilder::new(structures),
            postprocessor: PostProcessor::new(config),
            retry: self.retry,
            unique_prompts: self.unique_prompts,
            seed: self.seed,
            generation_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::params::{Genre, LengthCategory, Mood, Setting, WritingStyle};
    use std::collections::VecDeque;

    const GOOD_STORY: &str = "Mira climbed the tower. The wind tore at her cloak. \
She reached the top at dusk. Suddenly, the dragon woke. It spoke her name. \
She answered without fear.";

    /// Replays canned responses and records the settings of each call.
    struct Scripted {
        responses: VecDeque<Result<String, GeneratorError>>,
        calls: Vec<GenerationSettings>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(GeneratorError::new))
                    .collect(),
                calls: Vec::new(),
            }
        }
    }

    impl TextGenerator for Scripted {
        fn generate(
            &mut self,
            _prompt: &str,
            settings: &GenerationSettings,
        ) -> Result<String, GeneratorError> {
            self.calls.push(settings.clone());
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(GeneratorError::new("script exhausted")))
        }
    }

    fn params() -> StoryParameters {
        StoryParameters::new(
            "Mira",
            Genre::Fantasy,
            "Mira must wake the last dragon.",
            WritingStyle::Narrative,
            LengthCategory::Short,
            Mood::Inspirational,
            Setting::FantasyRealm,
        )
        .unwrap()
    }

    fn settings() -> GenerationSettings {
        GenerationSettings::for_length("test-model", LengthCategory::Short)
    }

    #[test]
    fn first_attempt_success() {
        let mut pipeline = StoryPipeline::builder().seed(42).build().unwrap();
        let mut generator = Scripted::new(vec![Ok(GOOD_STORY)]);

        let result = pipeline.generate(&mut generator, &params(), settings()).unwrap();
        assert_eq!(result.attempts, 1);
        assert_eq!(result.story.stats.paragraphs, 2);
        assert_eq!(result.settings.temperature, 0.7);
        assert_eq!(result.settings.random_seed, Some(42));
        assert!(result.prompt.contains("CHARACTER: Mira"));
    }

    #[test]
    fn retries_with_boosted_temperature_and_new_seed() {
        let mut pipeline = StoryPipeline::builder().seed(10).build().unwrap();
        let mut generator = Scripted::new(vec![Ok("Meh."), Ok("Ok. Ok."), Ok(GOOD_STORY)]);

        let result = pipeline.generate(&mut generator, &params(), settings()).unwrap();
        assert_eq!(result.attempts, 3);

        let temps: Vec<f32> = generator.calls.iter().map(|s| s.temperature).collect();
        assert!((temps[0] - 0.7).abs() < 1e-6);
        assert!((temps[1] - 0.8).abs() < 1e-6);
        assert!((temps[2] - 0.9).abs() < 1e-6);

        let seeds: Vec<Option<u64>> = generator.calls.iter().map(|s| s.random_seed).collect();
        assert_eq!(seeds, vec![Some(10), Some(10 + 7919), Some(10 + 2 * 7919)]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut pipeline = StoryPipeline::builder()
            .retry_policy(RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            })
            .build()
            .unwrap();
        let mut generator = Scripted::new(vec![Ok("Nope."), Ok("Nope."), Ok(GOOD_STORY)]);

        let err = pipeline.generate(&mut generator, &params(), settings()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Exhausted {
                attempts: 2,
                last: ContentQualityError::NoUsableSentences
            }
        ));
        assert_eq!(generator.calls.len(), 2);
    }

    #[test]
    fn generator_errors_are_not_retried() {
        let mut pipeline = StoryPipeline::builder().build().unwrap();
        let mut generator = Scripted::new(vec![Err("401 unauthorized"), Ok(GOOD_STORY)]);

        let err = pipeline.generate(&mut generator, &params(), settings()).unwrap_err();
        match err {
            PipelineError::Generator(e) => assert_eq!(e.message(), "401 unauthorized"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(generator.calls.len(), 1);
    }

    #[test]
    fn temperature_never_exceeds_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            temperature_step: 0.5,
            max_temperature: 1.0,
        };
        let base = settings().with_temperature(0.9);
        let s = policy.settings_for_attempt(&base, 0, 5);
        assert_eq!(s.temperature, 1.0);
    }

    #[test]
    fn caller_seed_is_used_for_first_attempt() {
        let mut pipeline = StoryPipeline::builder().seed(1).build().unwrap();
        let mut generator = Scripted::new(vec![Ok(GOOD_STORY)]);
        let result = pipeline
            .generate(&mut generator, &params(), settings().with_seed(777))
            .unwrap();
        assert_eq!(result.settings.random_seed, Some(777));
    }

    #[test]
    fn closures_are_generators() {
        let mut pipeline = StoryPipeline::builder().build().unwrap();
        let mut generator = |prompt: &str, _: &GenerationSettings| {
            assert!(prompt.contains("Mira must wake the last dragon."));
            Ok::<_, GeneratorError>(GOOD_STORY.to_string())
        };
        let result = pipeline.generate(&mut generator, &params(), settings()).unwrap();
        assert_eq!(result.story.stats.sentences, 6);
    }

    #[test]
    fn unique_prompts_vary_per_generation() {
        let mut pipeline = StoryPipeline::builder()
            .seed(3)
            .unique_prompts(true)
            .build()
            .unwrap();
        let first = pipeline.prompt_for(&params());
        assert!(first.contains("[request: "));
        assert_eq!(first, pipeline.prompt_for(&params()));

        let mut generator = Scripted::new(vec![Ok(GOOD_STORY)]);
        pipeline.generate(&mut generator, &params(), settings()).unwrap();
        assert_ne!(first, pipeline.prompt_for(&params()));
    }

    #[test]
    fn builder_loads_genre_files() {
        let pipeline = StoryPipeline::builder()
            .genre_file("genre_data/extended_genres.ron")
            .build()
            .unwrap();
        assert!(pipeline
            .prompt_builder()
            .structures()
            .contains(&Genre::from_label("Romance")));
    }

    #[test]
    fn builder_reports_missing_config_file() {
        let result = StoryPipeline::builder()
            .postprocess_config("does/not/exist.ron")
            .build();
        assert!(matches!(result, Err(PipelineError::Config(ConfigError::Io(_)))));
    }
}
