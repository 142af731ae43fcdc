use reqwest::Url;
use serde_json::{Value, json};

use super::{ProviderAdapter, ProviderConfig, ProviderKind, SYSTEM_INSTRUCTION};
use crate::error::{GenerateError, Result};
use crate::executor::HttpRequest;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiAdapter;

impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn default_model(&self) -> &'static str {
        "gemini-1.5-flash"
    }

    fn accepts_model(&self, model: &str) -> bool {
        model.starts_with("gemini-")
    }

    fn build_request(&self, prompt: &str, config: &ProviderConfig) -> Result<HttpRequest> {
        let model = self.resolve_model(&config.model);
        let url = Url::parse_with_params(
            &format!("{API_BASE}/{model}:generateContent"),
            &[("key", config.credential.trim())],
        )
        .map_err(|err| GenerateError::Configuration(format!("invalid Gemini URL: {err}")))?;
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": config.temperature,
                "maxOutputTokens": config.max_tokens,
            },
        });
        Ok(HttpRequest::new(url.as_str(), body))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        let text: String = body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }
}
