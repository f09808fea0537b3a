/// Sampling settings and request/response bodies for the hosted
/// text-generation endpoint. Nothing here performs I/O; the caller owns
/// transport and authentication.

use serde::{Deserialize, Serialize};

use super::params::LengthCategory;

pub const MIN_TEMPERATURE: f32 = 0.1;
pub const MAX_TEMPERATURE: f32 = 1.2;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TOP_K: u32 = 40;
const DEFAULT_TOP_P: f32 = 0.85;
const DEFAULT_REPETITION_PENALTY: f32 = 1.1;
const MIN_NEW_TOKENS_FLOOR: u32 = 200;
const STOP_SEQUENCES: [&str; 2] = ["</s>", "<|endoftext|>"];

/// Model sampling parameters for one generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model_id: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl GenerationSettings {
    /// Settings for a story of the given length, with the token budget
    /// derived from the category.
    pub fn for_length(model_id: impl Into<String>, length: LengthCategory) -> Self {
        let max_new_tokens = length.max_new_tokens();
        Self {
            model_id: model_id.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            repetition_penalty: DEFAULT_REPETITION_PENALTY,
            max_new_tokens,
            min_new_tokens: min_new_tokens_for(max_new_tokens),
            stop_sequences: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            random_seed: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = clamp_temperature(temperature);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
}

pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

fn min_new_tokens_for(max_new_tokens: u32) -> u32 {
    MIN_NEW_TOKENS_FLOOR.max(max_new_tokens / 4)
}

/// JSON body posted to the text-generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model_id: String,
    pub input: String,
    pub project_id: String,
    pub parameters: RequestParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    pub decoding_method: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub stop_sequences: Vec<String>,
    pub include_stop_sequence: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub random_seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        project_id: impl Into<String>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            model_id: settings.model_id.clone(),
            input: prompt.into(),
            project_id: project_id.into(),
            parameters: RequestParameters {
                decoding_method: "sample".to_string(),
                temperature: settings.temperature,
                max_new_tokens: settings.max_new_tokens,
                min_new_tokens: settings.min_new_tokens,
                top_k: settings.top_k,
                top_p: settings.top_p,
                repetition_penalty: settings.repetition_penalty,
                stop_sequences: settings.stop_sequences.clone(),
                include_stop_sequence: false,
                random_seed: settings.random_seed,
            },
        }
    }
}

/// Response body of the text-generation endpoint. Only the fields the
/// story pipeline reads are modelled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub results: Vec<GenerationResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub generated_text: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl GenerationResponse {
    /// Trimmed text of the first result, or `None` when the endpoint
    /// produced nothing usable.
    pub fn first_text(&self) -> Option<&str> {
        self.results
            .first()
            .map(|r| r.generated_text.trim())
            .filter(|t| !t.is_empty())
    }
}
