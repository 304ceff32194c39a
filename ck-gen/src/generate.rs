//! The five generation operations the application needs, behind a trait so
//! the sequencing layer can run against a fake in tests.
//!
//! Recipe generation is the only call that surfaces errors; everything
//! else is best-effort and collapses to an empty result so a failing
//! auxiliary feature never blocks the primary recipe flow.

use async_trait::async_trait;
use ck::markup::{speech_text, strip_markup};
use ck::models::{LeftoverSuggestion, Recipe};
use ck::wav::pcm_to_wav;
use serde_json::{json, Value};

use crate::error::{GenError, GenResult};
use crate::gemini::{
    first_inline_audio, first_inline_image, first_text_part, GeminiClient, IMAGE_MODEL,
    SPEECH_MODEL, SPEECH_SAMPLE_RATE, SPEECH_VOICE, TEXT_MODEL,
};
use crate::retry::retry_with_backoff;

/// Keeps step prompts focused on one action; anything past this many
/// characters is usually prose the illustration doesn't need.
const STEP_ACTION_LIMIT: usize = 150;

#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    /// Generate a full recipe for a free-text craving. Fatal on empty or
    /// malformed responses: the caller shows a failure message and the
    /// user retries by resubmitting the query.
    async fn generate_recipe(&self, query: &str) -> GenResult<Recipe>;

    /// Exactly 3 leftover ideas, or an empty list on any failure.
    async fn generate_leftover_suggestions(
        &self,
        ingredients: &[String],
        current_title: &str,
    ) -> Vec<LeftoverSuggestion>;

    /// An illustration of the finished dish, as a data URI.
    async fn generate_recipe_visual(&self, title: &str, description: &str) -> Option<String>;

    /// An illustration of one step, with visual continuity against all
    /// earlier instructions.
    async fn generate_step_visual(
        &self,
        instruction: &str,
        previous_instructions: &[String],
    ) -> Option<String>;

    /// Narration audio for one step, as a complete WAV file.
    async fn generate_step_audio(&self, instruction: &str) -> Option<Vec<u8>>;
}

fn truncate_action(action: &str, limit: usize) -> String {
    if action.chars().count() <= limit {
        return action.to_string();
    }
    let mut truncated: String = action.chars().take(limit).collect();
    truncated.push('…');
    truncated
}

/// Build the step-illustration prompt: the markup-stripped current action,
/// plus a "dish state so far" clause when earlier steps exist.
pub(crate) fn step_visual_prompt(instruction: &str, previous_instructions: &[String]) -> String {
    let action = truncate_action(&strip_markup(instruction), STEP_ACTION_LIMIT);
    let context = if previous_instructions.is_empty() {
        String::new()
    } else {
        let done: Vec<String> = previous_instructions
            .iter()
            .map(|earlier| strip_markup(earlier))
            .collect();
        format!(
            "The dish so far: {}. Keep visual continuity with that accumulated state, \
             e.g. show the pan or bowl already holding what earlier steps added.\n",
            done.join("; ")
        )
    };
    include_str!("prompts/step-image.md")
        .replace("{action}", &action)
        .replace("{context}", &context)
}

/// The response shape required from recipe generation. `insight` is
/// nullable and not required; both spellings of "missing" land as `None`.
fn recipe_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {"type": "STRING"},
            "description": {"type": "STRING"},
            "ingredients": {"type": "ARRAY", "items": {"type": "STRING"}},
            "steps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "instruction": {"type": "STRING"},
                        "type": {"type": "STRING", "enum": ["PREP", "COOK", "TIMING"]},
                        "insight": {"type": "STRING", "nullable": true},
                    },
                    "required": ["instruction", "type"],
                },
            },
        },
        "required": ["title", "description", "ingredients", "steps"],
    })
}

fn leftovers_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {"type": "STRING"},
                "description": {"type": "STRING"},
                "matchingIngredients": {"type": "ARRAY", "items": {"type": "STRING"}},
            },
            "required": ["title", "description", "matchingIngredients"],
        },
    })
}

/// Swallow a failure from an auxiliary call, leaving only a log line.
fn best_effort<T>(what: &str, result: GenResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("{} failed, continuing without it: {}", what, err);
            None
        }
    }
}

impl GeminiClient {
    /// Schema-constrained JSON round trip shared by the two structured
    /// operations.
    async fn generate_structured(&self, prompt: String, schema: Value) -> GenResult<String> {
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });
        let response = retry_with_backoff(|| self.generate_content(TEXT_MODEL, body.clone())).await?;
        let text = first_text_part(&response)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(GenError::EmptyResponse)?;
        Ok(text.to_string())
    }
}

#[async_trait]
impl RecipeGenerator for GeminiClient {
    async fn generate_recipe(&self, query: &str) -> GenResult<Recipe> {
        tracing::info!("Generating a recipe for {:?}", query);
        let prompt = include_str!("prompts/recipe.md").replace("{query}", query);
        let text = self.generate_structured(prompt, recipe_schema()).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn generate_leftover_suggestions(
        &self,
        ingredients: &[String],
        current_title: &str,
    ) -> Vec<LeftoverSuggestion> {
        let prompt = include_str!("prompts/leftovers.md")
            .replace("{title}", current_title)
            .replace("{ingredients}", &ingredients.join(", "));
        let result = async {
            let text = self.generate_structured(prompt, leftovers_schema()).await?;
            let suggestions: Vec<LeftoverSuggestion> = serde_json::from_str(&text)?;
            Ok(suggestions)
        }
        .await;
        best_effort("Leftover suggestions", result).unwrap_or_default()
    }

    async fn generate_recipe_visual(&self, title: &str, description: &str) -> Option<String> {
        let prompt = include_str!("prompts/dish-image.md")
            .replace("{title}", title)
            .replace("{description}", description);
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"responseModalities": ["IMAGE", "TEXT"]},
        });
        let response = best_effort(
            "Dish illustration",
            retry_with_backoff(|| self.generate_content(IMAGE_MODEL, body.clone())).await,
        )?;
        first_inline_image(&response)
    }

    async fn generate_step_visual(
        &self,
        instruction: &str,
        previous_instructions: &[String],
    ) -> Option<String> {
        let prompt = step_visual_prompt(instruction, previous_instructions);
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"responseModalities": ["IMAGE", "TEXT"]},
        });
        let response = best_effort(
            "Step illustration",
            retry_with_backoff(|| self.generate_content(IMAGE_MODEL, body.clone())).await,
        )?;
        first_inline_image(&response)
    }

    async fn generate_step_audio(&self, instruction: &str) -> Option<Vec<u8>> {
        // Annotations must be read out loud, not as markup
        let spoken = speech_text(instruction);
        let body = json!({
            "contents": [{"parts": [{"text": spoken}]}],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": SPEECH_VOICE}}
                },
            },
        });
        let response = best_effort(
            "Step narration",
            retry_with_backoff(|| self.generate_content(SPEECH_MODEL, body.clone())).await,
        )?;
        let pcm = first_inline_audio(&response)?;
        Some(pcm_to_wav(&pcm, SPEECH_SAMPLE_RATE, 1, 16))
    }
}
