//! Thin client for the generative-model endpoint.
//!
//! Every call is a single `generateContent` round trip; the higher-level
//! operations in [`crate::generate`] only differ in model, prompt, and
//! generation config. Responses are drilled with `Value::pointer` rather
//! than a full typed mirror of the API, since we only ever need the first
//! matching part.

use anyhow::anyhow;
use base64::Engine;
use serde_json::Value;

use crate::error::{GenError, GenResult};

pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const SPEECH_VOICE: &str = "Kore";
/// The speech model emits bare s16le mono PCM at this rate.
pub const SPEECH_SAMPLE_RATE: u32 = 24000;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    /// Build a client from the `GEMINI_API_KEY` environment variable,
    /// the only external configuration this crate needs.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(dotenvy::var("GEMINI_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One `generateContent` round trip. A 429 becomes `RateLimited` so the
    /// retry policy can see it structurally; other non-success statuses
    /// become `Upstream` with the body attached for the logs.
    pub(crate) async fn generate_content(&self, model: &str, body: Value) -> GenResult<Value> {
        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() == 429 {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenError::RateLimited(detail));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenError::Upstream(anyhow!(
                "Model API returned {}: {}",
                status,
                detail
            )));
        }
        Ok(response.json().await?)
    }
}

/// The text of the first candidate part that has any.
pub(crate) fn first_text_part(response: &Value) -> Option<&str> {
    candidate_parts(response)?
        .iter()
        .find_map(|part| part.get("text")?.as_str())
}

/// The first inline image payload, as a self-contained data URI.
pub(crate) fn first_inline_image(response: &Value) -> Option<String> {
    candidate_parts(response)?.iter().find_map(|part| {
        let mime = part.pointer("/inlineData/mimeType")?.as_str()?;
        if !mime.starts_with("image/") {
            return None;
        }
        let data = part.pointer("/inlineData/data")?.as_str()?;
        Some(format!("data:{};base64,{}", mime, data))
    })
}

/// The first inline audio payload, decoded from its base64 transport
/// encoding into raw PCM bytes.
pub(crate) fn first_inline_audio(response: &Value) -> Option<Vec<u8>> {
    candidate_parts(response)?.iter().find_map(|part| {
        let mime = part.pointer("/inlineData/mimeType")?.as_str()?;
        if !mime.starts_with("audio/") {
            return None;
        }
        let data = part.pointer("/inlineData/data")?.as_str()?;
        base64::engine::general_purpose::STANDARD.decode(data).ok()
    })
}

fn candidate_parts(response: &Value) -> Option<&Vec<Value>> {
    response.pointer("/candidates/0/content/parts")?.as_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_extraction_skips_non_text_parts() {
        let response = json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png", "data": "aaaa"}},
            {"text": "hello"},
        ]}}]});
        assert_eq!(first_text_part(&response), Some("hello"));
    }

    #[test]
    fn image_extraction_builds_a_data_uri() {
        let response = json!({"candidates": [{"content": {"parts": [
            {"text": "Here is your diagram"},
            {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}},
        ]}}]});
        assert_eq!(
            first_inline_image(&response).as_deref(),
            Some("data:image/png;base64,aGVsbG8=")
        );
    }

    #[test]
    fn audio_extraction_decodes_base64_pcm() {
        let pcm = [0u8, 1, 2, 3];
        let encoded = base64::engine::general_purpose::STANDARD.encode(pcm);
        let response = json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "audio/L16;rate=24000", "data": encoded}},
        ]}}]});
        assert_eq!(first_inline_audio(&response), Some(pcm.to_vec()));
    }

    #[test]
    fn absent_candidates_extract_to_none() {
        for response in [json!({}), json!({"candidates": []})] {
            assert_eq!(first_text_part(&response), None);
            assert_eq!(first_inline_image(&response), None);
            assert_eq!(first_inline_audio(&response), None);
        }
    }

    #[test]
    fn image_extraction_ignores_audio_payloads() {
        let response = json!({"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "audio/L16;rate=24000", "data": "aaaa"}},
        ]}}]});
        assert_eq!(first_inline_image(&response), None);
    }
}
