use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use svg_llm::executor::{HttpRequest, HttpResponse, Transport};
use svg_llm::request::Style;
use svg_llm::{
    GenerateError, GenerationRequest, HostDocument, Pipeline, PipelineOptions, Placement,
    ProviderConfig, ProviderKind, Result, SvgDocument, repair, sanitize,
};

fn fixture(path: &str) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    std::fs::read_to_string(root.join(path)).expect("fixture read failed")
}

/// Replays canned responses and records every request it sees.
struct StubTransport {
    replies: RefCell<VecDeque<Result<HttpResponse>>>,
    seen: RefCell<Vec<HttpRequest>>,
}

impl StubTransport {
    fn new(replies: Vec<Result<HttpResponse>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl Transport for StubTransport {
    fn post_json(&self, request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse> {
        self.seen.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(GenerateError::Transport("connection refused".into())))
    }
}

fn reply(kind: ProviderKind, text: &str) -> Result<HttpResponse> {
    let body = match kind {
        ProviderKind::OpenAi => json!({"choices": [{"message": {"role": "assistant", "content": text}}]}),
        ProviderKind::Anthropic => json!({"content": [{"type": "text", "text": text}]}),
        ProviderKind::Gemini => json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}),
        ProviderKind::Ollama => json!({"model": "llama3.1", "response": text, "done": true}),
    };
    Ok(HttpResponse {
        status: 200,
        reason: "OK".into(),
        body: body.to_string(),
    })
}

fn server_error() -> Result<HttpResponse> {
    Ok(HttpResponse {
        status: 500,
        reason: "Internal Server Error".into(),
        body: json!({"error": {"message": "The server had an error"}}).to_string(),
    })
}

fn options(variations: usize) -> PipelineOptions {
    PipelineOptions {
        variations,
        retries: 1,
        timeout: Duration::from_secs(5),
        ..PipelineOptions::default()
    }
}

#[test]
fn red_circle_scenario() {
    let raw = fixture("replies/fenced_circle.txt");
    assert_eq!(
        repair(&sanitize(&raw), 200, 200),
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><circle r="50" fill="red"/></svg>"#
    );

    let transport = StubTransport::new(vec![reply(ProviderKind::OpenAi, &raw)]);
    let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-proj-123");
    let pipeline = Pipeline::new(config, options(1), &transport);
    let mut host = SvgDocument::blank(1000, 1000);
    let mut request = GenerationRequest::new("a red circle", 200, 200);
    request.style = Style::Minimal;

    let report = pipeline.run(&mut host, &request).unwrap();
    assert_eq!(report.model, "gpt-4o");
    let merged = report.succeeded().next().unwrap();
    assert_eq!(merged.position, (400.0, 400.0));
    assert!(merged.warnings.is_empty());

    let seen = transport.seen.borrow();
    let prompt = seen[0].body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Generate SVG code for: a red circle"));
    assert!(prompt.contains("Size: 200x200px"));

    let group = host.root().find_by_id("ai-generated-1").unwrap();
    assert_eq!(group.get("transform"), Some("translate(400, 400)"));
    let circle = group.elements().find(|e| e.tag == "circle").unwrap();
    assert_eq!(circle.get("fill"), Some("red"));
}

#[test]
fn chatty_reply_merges_into_inkscape_layer_beside_selection() {
    let transport = StubTransport::new(vec![reply(
        ProviderKind::Anthropic,
        &fixture("replies/chatty_gradient.txt"),
    )]);
    let config = ProviderConfig::new(ProviderKind::Anthropic, "sk-ant-api03-abc");
    let pipeline = Pipeline::new(
        config,
        PipelineOptions {
            placement: Placement::BesideSelection,
            ..options(1)
        },
        &transport,
    );

    let mut host = SvgDocument::parse(&fixture("host/drawing.svg")).unwrap();
    assert!(host.select(&["card".to_string()]).is_empty());
    let mut request = GenerationRequest::new("a sunset over hills", 400, 300);
    request.context = host.describe_selection();

    let report = pipeline.run(&mut host, &request).unwrap();
    let merged = report.succeeded().next().unwrap();
    assert!(merged.warnings.is_empty(), "{:?}", merged.warnings);
    assert_eq!(merged.definitions, 2);
    assert_eq!(merged.position, (320.0, 120.0));

    let body = transport.seen.borrow()[0].body.to_string();
    assert!(body.contains("#3366cc"), "selection context missing from prompt");

    // The host already owns a gradient called "sky".
    let defs = host.defs().unwrap();
    assert!(defs.find_by_id("sky").is_some());
    assert!(defs.find_by_id("sky-1").is_some());
    assert!(defs.find_by_id("sun").is_some());

    let layer = host.current_layer();
    assert_eq!(layer.id(), Some("layer2"));
    let group = layer.find_by_id(&merged.node_ids[0]).unwrap();
    let backdrop = group.elements().find(|e| e.tag == "rect").unwrap();
    assert_eq!(backdrop.get("fill"), Some("url(#sky-1)"));
    let circle = group.elements().find(|e| e.tag == "circle").unwrap();
    assert_eq!(circle.get("fill"), Some("url(#sun)"));
}

#[test]
fn failed_variation_does_not_stop_the_others() {
    let svg = "<svg><rect width=\"10\" height=\"10\"/></svg>";
    let transport = StubTransport::new(vec![
        reply(ProviderKind::OpenAi, svg),
        server_error(),
        server_error(),
        reply(ProviderKind::OpenAi, svg),
    ]);
    let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-proj-123");
    let pipeline = Pipeline::new(config, options(3), &transport);
    let mut host = SvgDocument::blank(1000, 1000);

    let report = pipeline
        .run(&mut host, &GenerationRequest::new("a small square", 100, 100))
        .unwrap();
    assert_eq!(transport.calls(), 4);
    assert_eq!(report.outcomes.len(), 3);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, 1);
    assert_eq!(
        failures[0].1,
        &GenerateError::HttpStatus {
            status: 500,
            message: "The server had an error".into()
        }
    );

    let positions: Vec<(f64, f64)> = report.succeeded().map(|m| m.position).collect();
    assert_eq!(positions, vec![(450.0, 450.0), (450.0 + 2.0 * 120.0, 450.0)]);
    assert_eq!(host.current_layer().elements().count(), 2);
}

#[test]
fn malformed_fragment_fails_only_its_variation() {
    let transport = StubTransport::new(vec![
        reply(ProviderKind::Ollama, "<svg><g><rect></g></svg>"),
        reply(ProviderKind::Ollama, "<svg><ellipse rx=\"3\" ry=\"2\"/></svg>"),
    ]);
    let config = ProviderConfig::new(ProviderKind::Ollama, "");
    let pipeline = Pipeline::new(config, options(2), &transport);
    let mut host = SvgDocument::blank(800, 600);

    let report = pipeline
        .run(&mut host, &GenerationRequest::new("an ellipse", 50, 50))
        .unwrap();
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    match failures[0].1 {
        GenerateError::FragmentParse { excerpt, .. } => assert!(excerpt.contains("<rect>")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(host.current_layer().elements().count(), 1);
    assert_eq!(transport.calls(), 2);
}

#[test]
fn placeholder_credential_aborts_before_network() {
    let transport = StubTransport::new(vec![]);
    let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-...");
    let pipeline = Pipeline::new(config, options(2), &transport);
    let mut host = SvgDocument::blank(100, 100);
    let err = pipeline
        .run(&mut host, &GenerationRequest::new("a tree", 100, 100))
        .unwrap_err();
    assert!(matches!(err, GenerateError::Configuration(_)));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn empty_intent_aborts_before_network() {
    let transport = StubTransport::new(vec![]);
    let config = ProviderConfig::new(ProviderKind::Gemini, "AIzaSyExample");
    let pipeline = Pipeline::new(config, options(1), &transport);
    let mut host = SvgDocument::blank(100, 100);
    let err = pipeline
        .run(&mut host, &GenerationRequest::new("   ", 100, 100))
        .unwrap_err();
    assert!(matches!(err, GenerateError::Validation(_)));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn empty_gemini_reply_is_retried_then_reported() {
    let empty = Ok(HttpResponse {
        status: 200,
        reason: "OK".into(),
        body: json!({"candidates": []}).to_string(),
    });
    let transport = StubTransport::new(vec![empty.clone(), empty]);
    let config = ProviderConfig::new(ProviderKind::Gemini, "AIzaSyExample");
    let pipeline = Pipeline::new(config, options(1), &transport);
    let mut host = SvgDocument::blank(100, 100);

    let report = pipeline
        .run(&mut host, &GenerationRequest::new("a leaf", 64, 64))
        .unwrap();
    assert!(report.all_failed());
    assert!(matches!(
        report.failures().next().unwrap().1,
        GenerateError::EmptyResponse { .. }
    ));
    assert_eq!(transport.calls(), 2);
    let url = &transport.seen.borrow()[0].url;
    assert!(url.contains(":generateContent?key=AIzaSyExample"), "{url}");
}

#[test]
fn ollama_uses_custom_endpoint_without_key() {
    let transport = StubTransport::new(vec![reply(
        ProviderKind::Ollama,
        &fixture("replies/truncated.txt"),
    )]);
    let mut config = ProviderConfig::new(ProviderKind::Ollama, "");
    config.endpoint = Some("http://gpu-box:11434/".into());
    config.model = "qwen2.5-coder".into();
    let pipeline = Pipeline::new(config, options(1), &transport);
    let mut host = SvgDocument::blank(500, 500);

    let report = pipeline
        .run(&mut host, &GenerationRequest::new("a cross", 100, 100))
        .unwrap();
    assert_eq!(report.model, "qwen2.5-coder");
    assert_eq!(transport.seen.borrow()[0].url, "http://gpu-box:11434/api/generate");

    // The reply was cut off mid-tag; only the complete path survives repair.
    let merged = report.succeeded().next().unwrap();
    let group = host.root().find_by_id(&merged.node_ids[0]).unwrap();
    let strokes = group.elements().find(|e| e.tag == "g").unwrap();
    assert_eq!(strokes.elements().count(), 1);
}

#[test]
fn untrusted_markup_is_filtered() {
    let transport = StubTransport::new(vec![reply(
        ProviderKind::OpenAi,
        &fixture("replies/inkscape_export.txt"),
    )]);
    let config = ProviderConfig::new(ProviderKind::OpenAi, "sk-proj-123");
    let pipeline = Pipeline::new(
        config,
        PipelineOptions {
            group_name: Some("badge".into()),
            ..options(1)
        },
        &transport,
    );
    let mut host = SvgDocument::blank(300, 300);

    let report = pipeline
        .run(&mut host, &GenerationRequest::new("a button icon", 120, 120))
        .unwrap();
    let merged = report.succeeded().next().unwrap();
    assert_eq!(merged.node_ids, vec!["badge".to_string()]);

    let skipped: Vec<&str> = merged.warnings.iter().map(|w| w.tag.as_str()).collect();
    assert_eq!(skipped, vec!["namedview", "foreignObject", "script"]);

    let icon = host.root().find_by_id("icon").unwrap();
    assert_eq!(icon.get("label"), Some("Icon"));
    let tags: Vec<&str> = icon.elements().map(|e| e.tag.as_str()).collect();
    assert_eq!(tags, vec!["rect", "text", "sparkle"]);
    let button = icon.elements().next().unwrap();
    assert!(button.get("onclick").is_none());
    let label = icon.elements().find(|e| e.tag == "text").unwrap();
    assert_eq!(label.text_content(), "Go now");

    let serialized = host.to_svg_string();
    assert!(!serialized.contains("pwned"));
    let reparsed = SvgDocument::parse(&serialized).unwrap();
    assert!(reparsed.contains_id("badge"));
}
