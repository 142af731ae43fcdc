use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::merge::Placement;
use crate::pipeline::PipelineOptions;
use crate::provider::{ProviderConfig, ProviderKind};
use crate::request::{ColorScheme, Complexity, GenerationRequest, Preset, StrokeStyle, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

impl SizePreset {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Some(Self::Small),
            "medium" | "m" => Some(Self::Medium),
            "large" | "l" => Some(Self::Large),
            "xlarge" | "x-large" | "xl" => Some(Self::XLarge),
            _ => None,
        }
    }

    pub fn base(self) -> u32 {
        match self {
            Self::Small => 200,
            Self::Medium => 400,
            Self::Large => 600,
            Self::XLarge => 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
    Wide,
    Tall,
}

impl AspectRatio {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "square" | "1:1" => Some(Self::Square),
            "landscape" | "4:3" => Some(Self::Landscape),
            "portrait" | "3:4" => Some(Self::Portrait),
            "wide" | "16:9" => Some(Self::Wide),
            "tall" | "9:16" => Some(Self::Tall),
            _ => None,
        }
    }

    /// Width and height for a target whose longer side is `base`.
    pub fn apply(self, base: u32) -> (u32, u32) {
        let scaled = |num: u32, den: u32| (u64::from(base) * u64::from(num) / u64::from(den)) as u32;
        match self {
            Self::Square => (base, base),
            Self::Landscape => (base, scaled(3, 4)),
            Self::Portrait => (scaled(3, 4), base),
            Self::Wide => (base, scaled(9, 16)),
            Self::Tall => (scaled(9, 16), base),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub seed: Option<i64>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_key: None,
            endpoint: None,
            model: String::new(),
            temperature: 0.7,
            max_tokens: 2000,
            seed: None,
        }
    }
}

impl ProviderSettings {
    pub fn to_provider_config(&self, credential: String) -> ProviderConfig {
        ProviderConfig {
            kind: self.kind,
            credential,
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            // Negative seeds mean "no seed".
            seed: self.seed.filter(|seed| *seed >= 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub preset: Preset,
    pub style: Style,
    pub colors: ColorScheme,
    pub complexity: Complexity,
    pub stroke: StrokeStyle,
    pub size: SizePreset,
    pub aspect: AspectRatio,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gradients: bool,
    pub animation: bool,
    pub optimize_paths: bool,
    pub accessibility: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            preset: Preset::None,
            style: Style::None,
            colors: ColorScheme::Any,
            complexity: Complexity::Any,
            stroke: StrokeStyle::Any,
            size: SizePreset::Medium,
            aspect: AspectRatio::Square,
            width: None,
            height: None,
            gradients: false,
            animation: false,
            optimize_paths: true,
            accessibility: true,
        }
    }
}

impl GenerationSettings {
    /// Explicit dimensions win over the named size; a single explicit side keeps the other from the preset.
    pub fn dimensions(&self) -> (u32, u32) {
        let (width, height) = self.aspect.apply(self.size.base());
        (
            self.width.filter(|w| *w > 0).unwrap_or(width),
            self.height.filter(|h| *h > 0).unwrap_or(height),
        )
    }

    pub fn to_request(&self, intent: &str) -> GenerationRequest {
        let (width, height) = self.dimensions();
        let mut request = GenerationRequest::new(intent, width, height);
        request.preset = self.preset;
        request.style = self.style;
        request.colors = self.colors;
        request.complexity = self.complexity;
        request.stroke = self.stroke;
        request.gradients = self.gradients;
        request.animation = self.animation;
        request.optimize_paths = self.optimize_paths;
        request.accessibility = self.accessibility;
        request
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub placement: Placement,
    pub group: bool,
    pub group_name: Option<String>,
    pub variations: usize,
    pub retries: u32,
    pub timeout_secs: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            placement: Placement::Center,
            group: true,
            group_name: None,
            variations: 1,
            retries: 2,
            timeout_secs: 60,
        }
    }
}

impl OutputSettings {
    pub fn to_pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            placement: self.placement,
            group: self.group,
            group_name: self.group_name.clone(),
            variations: self.variations,
            retries: self.retries,
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderSettings,
    pub generation: GenerationSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderFile {
    provider: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    seed: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(flatten)]
    provider: ProviderFile,
    preset: Option<String>,
    style: Option<String>,
    color_scheme: Option<String>,
    complexity: Option<String>,
    stroke_style: Option<String>,
    size: Option<String>,
    aspect_ratio: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    include_gradients: Option<bool>,
    include_animation: Option<bool>,
    optimize_paths: Option<bool>,
    add_accessibility: Option<bool>,
    placement: Option<String>,
    add_group: Option<bool>,
    group_name: Option<String>,
    variations: Option<usize>,
    retries: Option<u32>,
    timeout: Option<u64>,
}

fn parse_token<T>(
    field: &str,
    value: Option<String>,
    parse: impl Fn(&str) -> Option<T>,
) -> anyhow::Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(token) => parse(&token)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("unknown {field} '{token}' in config file")),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(json_err) => json5::from_str(&contents).map_err(|_| {
            anyhow::anyhow!("failed to parse config {}: {json_err}", path.display())
        })?,
    };

    let provider = parsed.provider;
    if let Some(v) = parse_token("provider", provider.provider, ProviderKind::from_token)? {
        config.provider.kind = v;
    }
    if provider.api_key.is_some() {
        config.provider.api_key = provider.api_key;
    }
    if provider.endpoint.is_some() {
        config.provider.endpoint = provider.endpoint;
    }
    if let Some(v) = provider.model {
        config.provider.model = v;
    }
    if let Some(v) = provider.temperature {
        config.provider.temperature = v;
    }
    if let Some(v) = provider.max_tokens {
        config.provider.max_tokens = v;
    }
    if provider.seed.is_some() {
        config.provider.seed = provider.seed;
    }

    let generation = &mut config.generation;
    if let Some(v) = parse_token("preset", parsed.preset, Preset::from_token)? {
        generation.preset = v;
    }
    if let Some(v) = parse_token("style", parsed.style, Style::from_token)? {
        generation.style = v;
    }
    if let Some(v) = parse_token("color scheme", parsed.color_scheme, ColorScheme::from_token)? {
        generation.colors = v;
    }
    if let Some(v) = parse_token("complexity", parsed.complexity, Complexity::from_token)? {
        generation.complexity = v;
    }
    if let Some(v) = parse_token("stroke style", parsed.stroke_style, StrokeStyle::from_token)? {
        generation.stroke = v;
    }
    if let Some(v) = parse_token("size", parsed.size, SizePreset::from_token)? {
        generation.size = v;
    }
    if let Some(v) = parse_token("aspect ratio", parsed.aspect_ratio, AspectRatio::from_token)? {
        generation.aspect = v;
    }
    if parsed.width.is_some() {
        generation.width = parsed.width;
    }
    if parsed.height.is_some() {
        generation.height = parsed.height;
    }
    if let Some(v) = parsed.include_gradients {
        generation.gradients = v;
    }
    if let Some(v) = parsed.include_animation {
        generation.animation = v;
    }
    if let Some(v) = parsed.optimize_paths {
        generation.optimize_paths = v;
    }
    if let Some(v) = parsed.add_accessibility {
        generation.accessibility = v;
    }

    let output = &mut config.output;
    if let Some(v) = parse_token("placement", parsed.placement, Placement::from_token)? {
        output.placement = v;
    }
    if let Some(v) = parsed.add_group {
        output.group = v;
    }
    if parsed.group_name.is_some() {
        output.group_name = parsed.group_name;
    }
    if let Some(v) = parsed.variations {
        output.variations = v;
    }
    if let Some(v) = parsed.retries {
        output.retries = v;
    }
    if let Some(v) = parsed.timeout {
        output.timeout_secs = v;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn named_sizes_and_aspects() {
        assert_eq!(AspectRatio::Square.apply(SizePreset::Small.base()), (200, 200));
        assert_eq!(AspectRatio::Landscape.apply(400), (400, 300));
        assert_eq!(AspectRatio::Portrait.apply(400), (300, 400));
        assert_eq!(AspectRatio::Wide.apply(800), (800, 450));
        assert_eq!(AspectRatio::Tall.apply(800), (450, 800));
    }

    #[test]
    fn explicit_dimensions_override_named_size() {
        let settings = GenerationSettings {
            size: SizePreset::Large,
            width: Some(320),
            ..GenerationSettings::default()
        };
        assert_eq!(settings.dimensions(), (320, 600));
    }

    #[test]
    fn negative_seed_means_none() {
        let settings = ProviderSettings {
            seed: Some(-1),
            ..ProviderSettings::default()
        };
        assert_eq!(settings.to_provider_config("k".into()).seed, None);
        let settings = ProviderSettings {
            seed: Some(7),
            ..ProviderSettings::default()
        };
        assert_eq!(settings.to_provider_config("k".into()).seed, Some(7));
    }

    #[test]
    fn missing_path_yields_defaults() {
        assert_eq!(load_config(None).unwrap(), Config::default());
    }

    #[test]
    fn loads_camel_case_file() {
        let file = write_config(
            r#"{"provider": "anthropic", "model": "claude-3-haiku-20240307", "style": "flat",
                "colorScheme": "pastel", "size": "small", "aspectRatio": "wide",
                "variations": 3, "addGroup": false, "placement": "origin", "timeout": 15}"#,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert_eq!(config.provider.model, "claude-3-haiku-20240307");
        assert_eq!(config.generation.style, Style::Flat);
        assert_eq!(config.generation.colors, ColorScheme::Pastel);
        assert_eq!(config.generation.dimensions(), (200, 112));
        assert_eq!(config.output.variations, 3);
        assert!(!config.output.group);
        assert_eq!(config.output.placement, Placement::Origin);
        assert_eq!(config.output.to_pipeline_options().timeout, Duration::from_secs(15));
    }

    #[test]
    fn accepts_json5_and_rejects_unknown_tokens() {
        let file = write_config("{ // local model\n provider: 'ollama', endpoint: 'http://gpu-box:11434/api/generate', }");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert!(config.provider.endpoint.is_some());

        let bad = write_config(r#"{"style": "baroque"}"#);
        let err = load_config(Some(bad.path())).unwrap_err();
        assert!(err.to_string().contains("baroque"));
    }
}
