use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    None,
    Icon,
    Illustration,
    Diagram,
    Pattern,
    Logo,
    Flowchart,
    Infographic,
}

impl Preset {
    pub const ALL: [Preset; 8] = [
        Preset::None,
        Preset::Icon,
        Preset::Illustration,
        Preset::Diagram,
        Preset::Pattern,
        Preset::Logo,
        Preset::Flowchart,
        Preset::Infographic,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "icon" => Some(Self::Icon),
            "illustration" => Some(Self::Illustration),
            "diagram" => Some(Self::Diagram),
            "pattern" => Some(Self::Pattern),
            "logo" => Some(Self::Logo),
            "flowchart" => Some(Self::Flowchart),
            "infographic" => Some(Self::Infographic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    None,
    Minimal,
    Detailed,
    Flat,
    Outline,
    Filled,
    Geometric,
    Organic,
}

impl Style {
    pub const ALL: [Style; 8] = [
        Style::None,
        Style::Minimal,
        Style::Detailed,
        Style::Flat,
        Style::Outline,
        Style::Filled,
        Style::Geometric,
        Style::Organic,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "minimal" => Some(Self::Minimal),
            "detailed" => Some(Self::Detailed),
            "flat" => Some(Self::Flat),
            "outline" => Some(Self::Outline),
            "filled" => Some(Self::Filled),
            "geometric" => Some(Self::Geometric),
            "organic" => Some(Self::Organic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Detailed => "detailed",
            Self::Flat => "flat",
            Self::Outline => "outline",
            Self::Filled => "filled",
            Self::Geometric => "geometric",
            Self::Organic => "organic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Any,
    Monochrome,
    Warm,
    Cool,
    Pastel,
    Vibrant,
    Grayscale,
}

impl ColorScheme {
    pub const ALL: [ColorScheme; 7] = [
        ColorScheme::Any,
        ColorScheme::Monochrome,
        ColorScheme::Warm,
        ColorScheme::Cool,
        ColorScheme::Pastel,
        ColorScheme::Vibrant,
        ColorScheme::Grayscale,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "any" | "" => Some(Self::Any),
            "monochrome" => Some(Self::Monochrome),
            "warm" => Some(Self::Warm),
            "cool" => Some(Self::Cool),
            "pastel" => Some(Self::Pastel),
            "vibrant" => Some(Self::Vibrant),
            "grayscale" | "greyscale" => Some(Self::Grayscale),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Monochrome => "monochrome",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Pastel => "pastel",
            Self::Vibrant => "vibrant",
            Self::Grayscale => "grayscale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Any,
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub const ALL: [Complexity; 4] = [
        Complexity::Any,
        Complexity::Simple,
        Complexity::Moderate,
        Complexity::Complex,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "any" | "" => Some(Self::Any),
            "simple" => Some(Self::Simple),
            "moderate" | "medium" => Some(Self::Moderate),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Any,
    Thin,
    Medium,
    Thick,
    Varied,
}

impl StrokeStyle {
    pub const ALL: [StrokeStyle; 5] = [
        StrokeStyle::Any,
        StrokeStyle::Thin,
        StrokeStyle::Medium,
        StrokeStyle::Thick,
        StrokeStyle::Varied,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "any" | "" => Some(Self::Any),
            "thin" => Some(Self::Thin),
            "medium" => Some(Self::Medium),
            "thick" => Some(Self::Thick),
            "varied" => Some(Self::Varied),
            _ => None,
        }
    }
}

/// Summary of one element the user had selected before generating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextElement {
    pub tag: String,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub size: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub intent: String,
    pub width: u32,
    pub height: u32,
    pub preset: Preset,
    pub style: Style,
    pub colors: ColorScheme,
    pub complexity: Complexity,
    pub stroke: StrokeStyle,
    pub gradients: bool,
    pub animation: bool,
    pub optimize_paths: bool,
    pub accessibility: bool,
    pub context: Vec<ContextElement>,
    pub variation: usize,
    pub variation_count: usize,
}

impl GenerationRequest {
    pub fn new(intent: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            intent: intent.into(),
            width: width.max(1),
            height: height.max(1),
            preset: Preset::None,
            style: Style::None,
            colors: ColorScheme::Any,
            complexity: Complexity::Any,
            stroke: StrokeStyle::Any,
            gradients: false,
            animation: false,
            optimize_paths: false,
            accessibility: false,
            context: Vec::new(),
            variation: 0,
            variation_count: 1,
        }
    }

    pub fn for_variation(&self, index: usize, count: usize) -> Self {
        Self {
            variation: index,
            variation_count: count.max(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!(Style::from_token("Minimal"), Some(Style::Minimal));
        assert_eq!(ColorScheme::from_token("greyscale"), Some(ColorScheme::Grayscale));
        assert_eq!(Preset::from_token("none"), Some(Preset::None));
        assert_eq!(StrokeStyle::from_token("wobbly"), None);
    }

    #[test]
    fn variation_copy_keeps_everything_else() {
        let mut base = GenerationRequest::new("a red circle", 200, 200);
        base.style = Style::Minimal;
        let second = base.for_variation(1, 3);
        assert_eq!(second.variation, 1);
        assert_eq!(second.variation_count, 3);
        assert_eq!(second.style, Style::Minimal);
        assert_eq!(second.intent, "a red circle");
    }
}
