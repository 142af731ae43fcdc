use crate::request::{
    ColorScheme, Complexity, ContextElement, GenerationRequest, Preset, StrokeStyle, Style,
};

const BASE_ELEMENTS: &str = "path, rect, circle, ellipse, line, polyline, polygon, text, tspan, g, defs, use";
const GRADIENT_ELEMENTS: &str = "linearGradient, radialGradient, stop";
const ANIMATION_ELEMENTS: &str = "animate, animateTransform, animateMotion, set";

pub fn preset_sentence(preset: Preset) -> Option<&'static str> {
    match preset {
        Preset::None => None,
        Preset::Icon => Some(
            "Design a simple, recognizable icon that reads clearly at small sizes.",
        ),
        Preset::Illustration => Some(
            "Create a rich illustration with a clear focal point and supporting detail.",
        ),
        Preset::Diagram => Some(
            "Draw a clean technical diagram with labeled parts and clear connections.",
        ),
        Preset::Pattern => Some(
            "Create a seamless, repeating decorative pattern that tiles across the canvas.",
        ),
        Preset::Logo => Some(
            "Design a distinctive, memorable logo mark suitable for branding.",
        ),
        Preset::Flowchart => Some(
            "Draw a flowchart with boxes for steps, diamonds for decisions and arrows for flow.",
        ),
        Preset::Infographic => Some(
            "Create an infographic that presents information visually with icons, numbers and short labels.",
        ),
    }
}

pub fn style_sentence(style: Style) -> Option<&'static str> {
    match style {
        Style::None => None,
        Style::Minimal => Some("Use a minimal, clean design with simple shapes"),
        Style::Detailed => Some("Include detailed elements and fine ornamentation"),
        Style::Flat => Some("Use flat design principles with solid colors"),
        Style::Outline => Some("Use only outlines/strokes, no fills"),
        Style::Filled => Some("Use filled shapes with no or minimal strokes"),
        Style::Geometric => Some("Use geometric shapes and patterns"),
        Style::Organic => Some("Use organic, natural flowing shapes"),
    }
}

pub fn color_sentence(colors: ColorScheme) -> Option<&'static str> {
    match colors {
        ColorScheme::Any => None,
        ColorScheme::Monochrome => Some("Use only one color in different shades"),
        ColorScheme::Warm => Some("Use warm colors (reds, oranges, yellows)"),
        ColorScheme::Cool => Some("Use cool colors (blues, greens, purples)"),
        ColorScheme::Pastel => Some("Use soft pastel colors"),
        ColorScheme::Vibrant => Some("Use bright, vibrant colors"),
        ColorScheme::Grayscale => Some("Use only black, white, and gray"),
    }
}

pub fn complexity_sentence(complexity: Complexity) -> Option<&'static str> {
    match complexity {
        Complexity::Any => None,
        Complexity::Simple => Some("Keep it simple: fewer than 10 shapes"),
        Complexity::Moderate => Some("Aim for moderate complexity: roughly 10 to 30 shapes"),
        Complexity::Complex => Some("Make it complex and layered: 30 or more shapes are fine"),
    }
}

pub fn stroke_sentence(stroke: StrokeStyle) -> Option<&'static str> {
    match stroke {
        StrokeStyle::Any => None,
        StrokeStyle::Thin => Some("Use thin strokes of about 1px"),
        StrokeStyle::Medium => Some("Use medium strokes of about 2-3px"),
        StrokeStyle::Thick => Some("Use thick, bold strokes of 4px or more"),
        StrokeStyle::Varied => Some("Vary stroke widths to create depth and emphasis"),
    }
}

const GRADIENT_SENTENCE: &str =
    "Use linearGradient or radialGradient fills defined inside <defs> where they improve the design";
const ANIMATION_SENTENCE: &str =
    "Add subtle SMIL animation (animate, animateTransform) that loops smoothly";
const OPTIMIZE_SENTENCE: &str =
    "Optimize paths: use as few path commands as possible and round coordinates to at most 1 decimal place";
const ACCESSIBILITY_SENTENCE: &str =
    "Include a <title> and a <desc> element as the first children of <svg> describing the graphic";

/// Build the text prompt for one variation. Pure: equal requests give equal text.
pub fn compose(request: &GenerationRequest) -> String {
    let width = request.width;
    let height = request.height;
    let mut parts: Vec<String> = Vec::new();

    if let Some(sentence) = preset_sentence(request.preset) {
        parts.push(sentence.to_string());
    }
    parts.push(format!("Generate SVG code for: {}", request.intent.trim()));
    parts.push(format!("\nSize: {width}x{height}px"));

    if !request.context.is_empty() {
        parts.push(
            "\nThe drawing already contains these selected elements; make the result fit with them:"
                .to_string(),
        );
        for element in &request.context {
            parts.push(context_line(element));
        }
    }

    let mut directives = Vec::new();
    if let Some(sentence) = complexity_sentence(request.complexity) {
        directives.push(format!("Complexity: {sentence}"));
    }
    if let Some(sentence) = style_sentence(request.style) {
        directives.push(format!("Style: {sentence}"));
    }
    if let Some(sentence) = color_sentence(request.colors) {
        directives.push(format!("Colors: {sentence}"));
    }
    if let Some(sentence) = stroke_sentence(request.stroke) {
        directives.push(format!("Strokes: {sentence}"));
    }
    if request.gradients {
        directives.push(format!("Gradients: {GRADIENT_SENTENCE}"));
    }
    if request.animation {
        directives.push(format!("Animation: {ANIMATION_SENTENCE}"));
    }
    if !directives.is_empty() {
        parts.push(String::new());
        parts.extend(directives);
    }

    let mut elements = BASE_ELEMENTS.to_string();
    if request.gradients {
        elements.push_str(", ");
        elements.push_str(GRADIENT_ELEMENTS);
    }
    if request.animation {
        elements.push_str(", ");
        elements.push_str(ANIMATION_ELEMENTS);
    }

    let mut rules = vec![
        "Return ONLY valid SVG code, nothing else".to_string(),
        "Do not include <?xml?> declaration or <!DOCTYPE>".to_string(),
        "Start with <svg> tag and end with </svg>".to_string(),
        format!(
            "Declare xmlns=\"http://www.w3.org/2000/svg\" and set viewBox=\"0 0 {width} {height}\""
        ),
        "Use absolute positioning within the viewBox".to_string(),
        "Ensure all elements are properly closed".to_string(),
        format!("Use valid SVG elements only ({elements})"),
        "Do not use any external resources or images".to_string(),
        "Keep the SVG clean and well-structured".to_string(),
    ];
    if request.optimize_paths {
        rules.push(OPTIMIZE_SENTENCE.to_string());
    }
    if request.accessibility {
        rules.push(ACCESSIBILITY_SENTENCE.to_string());
    }

    parts.push("\nIMPORTANT INSTRUCTIONS:".to_string());
    for (idx, rule) in rules.iter().enumerate() {
        parts.push(format!("{}. {}", idx + 1, rule));
    }

    if request.variation_count > 1 {
        parts.push(format!(
            "\nThis is variation {} of {}. Produce a unique interpretation that differs in composition, layout and details from the other variations.",
            request.variation + 1,
            request.variation_count
        ));
    }

    parts.join("\n")
}

fn context_line(element: &ContextElement) -> String {
    let mut line = format!("- <{}>", element.tag);
    let mut details = Vec::new();
    if let Some(fill) = &element.fill {
        details.push(format!("fill {fill}"));
    }
    if let Some(stroke) = &element.stroke {
        details.push(format!("stroke {stroke}"));
    }
    if let Some(size) = &element.size {
        details.push(format!("size {size}"));
    }
    if let Some(text) = &element.text {
        details.push(format!("text \"{text}\""));
    }
    if !details.is_empty() {
        line.push(' ');
        line.push_str(&details.join(", "));
    }
    line
}
