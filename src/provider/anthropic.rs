use serde_json::{Value, json};

use super::{ProviderAdapter, ProviderConfig, ProviderKind, SYSTEM_INSTRUCTION};
use crate::error::Result;
use crate::executor::HttpRequest;

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn default_model(&self) -> &'static str {
        "claude-3-5-sonnet-latest"
    }

    fn accepts_model(&self, model: &str) -> bool {
        model.starts_with("claude-")
    }

    fn build_request(&self, prompt: &str, config: &ProviderConfig) -> Result<HttpRequest> {
        let body = json!({
            "model": self.resolve_model(&config.model),
            "system": SYSTEM_INSTRUCTION,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature.clamp(0.0, 1.0),
        });
        Ok(HttpRequest::new(ENDPOINT, body)
            .header("x-api-key", config.credential.trim())
            .header("anthropic-version", API_VERSION))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        let text: String = body
            .get("content")?
            .as_array()?
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }
}
