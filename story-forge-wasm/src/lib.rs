//! WASM bindings for story-forge: backs the browser story studio.

use wasm_bindgen::prelude::*;

use story_forge::core::postprocess::PostProcessor;
use story_forge::schema::story::FormattedStory;
use story_forge::core::prompt::{with_uniqueness_token, PromptBuilder};
use story_forge::core::structure::GenreStructures;
use story_forge::schema::generation::{GenerationRequest, GenerationResponse, GenerationSettings};
use story_forge::schema::params::{
    Genre, LengthCategory, Mood, ParameterLabels, Setting, StoryParameters, WritingStyle,
};

// ---------------------------------------------------------------------------
// Embedded genre data: compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const EXTENDED_GENRES: &str = include_str!("../../genre_data/extended_genres.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Deserialize)]
struct RequestInput {
    model_id: String,
    project_id: String,
    temperature: Option<f32>,
    seed: Option<u64>,
    /// Append a random request token to the prompt.
    #[serde(default)]
    unique: bool,
}

// Helpers return plain messages; exported methods turn them into
// `JsError` at the boundary.
fn parse_params(params_json: &str) -> Result<StoryParameters, String> {
    let labels: ParameterLabels = serde_json::from_str(params_json)
        .map_err(|e| format!("Invalid parameters JSON: {e}"))?;
    StoryParameters::from_labels(&labels).map_err(|e| e.to_string())
}

fn parse_request_input(settings_json: &str) -> Result<RequestInput, String> {
    serde_json::from_str(settings_json).map_err(|e| format!("Invalid settings JSON: {e}"))
}

fn response_text(response_json: &str) -> Result<String, String> {
    let response: GenerationResponse = serde_json::from_str(response_json)
        .map_err(|e| format!("Invalid response JSON: {e}"))?;
    response
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| "Response contains no generated text".to_string())
}

fn clean(postprocessor: &PostProcessor, raw: &str) -> Result<FormattedStory, String> {
    postprocessor.process(raw).map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {e}"))
}

fn js(message: String) -> JsError {
    JsError::new(&message)
}

fn labels_json<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    let labels: Vec<&str> = labels.collect();
    serde_json::to_string(&labels).unwrap_or_else(|_| "[]".to_string())
}

// ---------------------------------------------------------------------------
// StoryStudio: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryStudio {
    prompts: PromptBuilder,
    postprocessor: PostProcessor,
}

#[wasm_bindgen]
impl StoryStudio {
    /// Create a studio with the built-in and extended genre structures.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<StoryStudio, JsError> {
        let structures = GenreStructures::parse_ron(data::EXTENDED_GENRES)
            .map_err(|e| JsError::new(&format!("Genre data error: {e}")))?;
        Ok(StoryStudio {
            prompts: PromptBuilder::new(structures),
            postprocessor: PostProcessor::default(),
        })
    }

    /// Render the prompt for form values given as JSON.
    ///
    /// Expected JSON shape:
    /// ```json
    /// {
    ///   "character_name": "Alex",
    ///   "genre": "Mystery",
    ///   "context": "A letter arrives with no return address.",
    ///   "writing_style": "Narrative",
    ///   "length_category": "Short (300-500 words)",
    ///   "mood": "Dark & Mysterious",
    ///   "setting": "Small Town"
    /// }
    /// ```
    pub fn build_prompt(&self, params_json: &str) -> Result<String, JsError> {
        let params = parse_params(params_json).map_err(js)?;
        Ok(self.prompts.build(&params))
    }

    /// Build the JSON request body for the text-generation endpoint.
    ///
    /// `settings_json` carries `model_id`, `project_id` and optionally
    /// `temperature`, `seed` and `unique`.
    pub fn build_request(
        &self,
        params_json: &str,
        settings_json: &str,
    ) -> Result<String, JsError> {
        let params = parse_params(params_json).map_err(js)?;
        let input = parse_request_input(settings_json).map_err(js)?;

        let mut settings =
            GenerationSettings::for_length(input.model_id, params.length_category());
        if let Some(temperature) = input.temperature {
            settings = settings.with_temperature(temperature);
        }
        if let Some(seed) = input.seed {
            settings = settings.with_seed(seed);
        }

        let mut prompt = self.prompts.build(&params);
        if input.unique {
            prompt = with_uniqueness_token(&prompt, &mut rand::thread_rng());
        }
        to_json(&GenerationRequest::new(prompt, input.project_id, &settings)).map_err(js)
    }

    /// Clean raw model output. Returns JSON `{ "text": .., "stats": .. }`.
    pub fn postprocess(&self, raw: &str) -> Result<String, JsError> {
        let story = clean(&self.postprocessor, raw).map_err(js)?;
        to_json(&story).map_err(js)
    }

    /// Pull the generated text out of an endpoint response body.
    pub fn extract_text(&self, response_json: &str) -> Result<String, JsError> {
        response_text(response_json).map_err(js)
    }

    pub fn export_file_name(&self, params_json: &str) -> Result<String, JsError> {
        Ok(parse_params(params_json).map_err(js)?.export_file_name())
    }

    /// Genre keys with a structure entry, sorted.
    pub fn known_genres(&self) -> String {
        labels_json(self.prompts.structures().genres().into_iter())
    }

    /// Return JSON array of the form's genre labels.
    pub fn genres() -> String {
        labels_json(Genre::BUILTIN.iter().map(|g| g.label()))
    }

    pub fn writing_styles() -> String {
        labels_json(WritingStyle::ALL.iter().map(|s| s.label()))
    }

    pub fn lengths() -> String {
        let labels: Vec<String> = LengthCategory::ALL.iter().map(|l| l.label()).collect();
        serde_json::to_string(&labels).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn moods() -> String {
        labels_json(Mood::builtin().map(|m| m.label()))
    }

    pub fn settings() -> String {
        labels_json(Setting::builtin().map(|s| s.label()))
    }
}
