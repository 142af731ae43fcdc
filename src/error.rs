use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerateError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    HttpStatus { status: u16, message: String },

    #[error("{provider} returned no SVG text")]
    EmptyResponse { provider: &'static str },

    #[error("failed to parse SVG code: {message}\n\nReceived code:\n{excerpt}")]
    FragmentParse { message: String, excerpt: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("document error: {0}")]
    Document(String),
}

impl GenerateError {
    /// Whether the failure comes from one network attempt and may succeed on the next.
    pub fn is_attempt_failure(&self) -> bool {
        matches!(
            self,
            GenerateError::Transport(_)
                | GenerateError::HttpStatus { .. }
                | GenerateError::EmptyResponse { .. }
        )
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
