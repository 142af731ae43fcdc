use serde_json::{Value, json};

use super::{ProviderAdapter, ProviderConfig, ProviderKind, SYSTEM_INSTRUCTION, is_cloud_model};
use crate::error::Result;
use crate::executor::HttpRequest;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const GENERATE_PATH: &str = "/api/generate";

pub struct OllamaAdapter;

impl OllamaAdapter {
    fn endpoint(config: &ProviderConfig) -> String {
        let base = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        if base.ends_with(GENERATE_PATH) {
            base.to_string()
        } else {
            format!("{base}{GENERATE_PATH}")
        }
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn default_model(&self) -> &'static str {
        "llama3.1"
    }

    fn accepts_model(&self, model: &str) -> bool {
        !model.is_empty() && !is_cloud_model(model)
    }

    fn build_request(&self, prompt: &str, config: &ProviderConfig) -> Result<HttpRequest> {
        let body = json!({
            "model": self.resolve_model(&config.model),
            "system": SYSTEM_INSTRUCTION,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
            },
        });
        Ok(HttpRequest::new(Self::endpoint(config), body))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("response")?.as_str().map(str::to_string)
    }

    fn error_message(&self, body: &Value) -> Option<String> {
        body.get("error")?.as_str().map(str::to_string)
    }
}
