mod anthropic;
mod gemini;
mod ollama;
mod openai;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GenerateError, Result};
use crate::executor::{HttpRequest, Transport, status_error};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

pub const SYSTEM_INSTRUCTION: &str = "You are an expert SVG code generator. You only respond with valid, clean SVG code without any explanation or markdown formatting. Never include ```svg or ``` markers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" | "local" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Stable identifier used as the credential store key.
    pub fn id(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
            Self::Ollama => "Ollama",
        }
    }

    pub fn requires_credential(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub credential: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub seed: Option<i64>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, credential: impl Into<String>) -> Self {
        Self {
            kind,
            credential: credential.into(),
            endpoint: None,
            model: String::new(),
            temperature: 0.7,
            max_tokens: 2000,
            seed: None,
        }
    }

    /// Fails when a cloud provider has no usable key.
    pub fn validate(&self) -> Result<()> {
        if self.kind.requires_credential() && is_placeholder_credential(&self.credential) {
            return Err(GenerateError::Configuration(format!(
                "please provide a valid {} API key",
                self.kind.display_name()
            )));
        }
        Ok(())
    }
}

pub fn is_placeholder_credential(credential: &str) -> bool {
    let trimmed = credential.trim();
    trimmed.is_empty()
        || trimmed.ends_with("...")
        || trimmed.chars().all(|c| c == '*' || c == 'x' || c == 'X')
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "your-api-key" | "your_api_key" | "api-key" | "changeme"
        )
}

pub trait ProviderAdapter {
    fn kind(&self) -> ProviderKind;

    fn default_model(&self) -> &'static str;

    /// Whether `model` belongs to this provider's model family.
    fn accepts_model(&self, model: &str) -> bool;

    fn build_request(&self, prompt: &str, config: &ProviderConfig) -> Result<HttpRequest>;

    fn extract_text(&self, body: &Value) -> Option<String>;

    fn error_message(&self, body: &Value) -> Option<String> {
        body.get("error")?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }

    fn resolve_model(&self, model: &str) -> String {
        let model = model.trim();
        if self.accepts_model(model) {
            model.to_string()
        } else {
            self.default_model().to_string()
        }
    }

    /// One request/response exchange, without retries.
    fn send(
        &self,
        transport: &dyn Transport,
        prompt: &str,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<String> {
        let request = self.build_request(prompt, config)?;
        let response = transport.post_json(&request, timeout)?;
        if !response.is_success() {
            return Err(status_error(self, &response));
        }
        let body: Value = serde_json::from_str(&response.body).map_err(|err| {
            GenerateError::Transport(format!(
                "{} sent an invalid JSON response: {err}",
                self.kind().display_name()
            ))
        })?;
        self.extract_text(&body)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerateError::EmptyResponse {
                provider: self.kind().display_name(),
            })
    }
}

pub fn adapter_for(kind: ProviderKind) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiAdapter),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter),
        ProviderKind::Gemini => Box::new(GeminiAdapter),
        ProviderKind::Ollama => Box::new(OllamaAdapter),
    }
}

fn is_cloud_model(model: &str) -> bool {
    OpenAiAdapter.accepts_model(model)
        || AnthropicAdapter.accepts_model(model)
        || GeminiAdapter.accepts_model(model)
}
