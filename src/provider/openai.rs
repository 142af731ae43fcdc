use serde_json::{Value, json};

use super::{ProviderAdapter, ProviderConfig, ProviderKind, SYSTEM_INSTRUCTION};
use crate::error::Result;
use crate::executor::HttpRequest;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const MODEL_PREFIXES: [&str; 5] = ["gpt-", "chatgpt-", "o1", "o3", "o4"];

pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o"
    }

    fn accepts_model(&self, model: &str) -> bool {
        MODEL_PREFIXES.iter().any(|prefix| model.starts_with(prefix))
    }

    fn build_request(&self, prompt: &str, config: &ProviderConfig) -> Result<HttpRequest> {
        let mut body = json!({
            "model": self.resolve_model(&config.model),
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTION },
                { "role": "user", "content": prompt },
            ],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });
        if let Some(seed) = config.seed.filter(|seed| *seed >= 0) {
            body["seed"] = json!(seed);
        }
        Ok(HttpRequest::new(ENDPOINT, body)
            .header("Authorization", format!("Bearer {}", config.credential.trim())))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
        config.model = "gpt-4-turbo".to_string();
        config
    }

    #[test]
    fn builds_chat_completion_request() {
        let request = OpenAiAdapter.build_request("draw a cat", &config()).unwrap();
        assert_eq!(request.url, ENDPOINT);
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer sk-test".to_string())));
        assert_eq!(request.body["model"], "gpt-4-turbo");
        assert_eq!(request.body["messages"][0]["role"], "system");
        assert_eq!(request.body["messages"][1]["content"], "draw a cat");
        assert_eq!(request.body["max_tokens"], 2000);
        assert!(request.body.get("seed").is_none());
    }

    #[test]
    fn seed_only_sent_when_non_negative() {
        let mut config = config();
        config.seed = Some(-1);
        let request = OpenAiAdapter.build_request("x", &config).unwrap();
        assert!(request.body.get("seed").is_none());

        config.seed = Some(42);
        let request = OpenAiAdapter.build_request("x", &config).unwrap();
        assert_eq!(request.body["seed"], 42);
    }

    #[test]
    fn extracts_first_choice() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "<svg/>"}}]});
        assert_eq!(OpenAiAdapter.extract_text(&body).as_deref(), Some("<svg/>"));
        assert_eq!(OpenAiAdapter.extract_text(&json!({"choices": []})), None);
    }
}
