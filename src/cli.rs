use crate::config::{AspectRatio, Config, SizePreset, load_config};
use crate::document::SvgDocument;
use crate::executor::ReqwestTransport;
use crate::merge::Placement;
use crate::pipeline::Pipeline;
use crate::provider::{ProviderKind, is_placeholder_credential};
use crate::request::{ColorScheme, Complexity, Preset, StrokeStyle, Style};
use crate::store::{CredentialStore, HistoryLog, JsonFileStore, KeyValueStore};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

const BLANK_CANVAS: u32 = 1000;

#[derive(Parser, Debug)]
#[command(name = "svgllm", version, about = "Generate SVG artwork with an LLM and merge it into a drawing")]
pub struct Args {
    /// What to draw
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Provider: openai, anthropic, gemini or ollama
    #[arg(short = 'p', long, value_parser = token_parser("provider", ProviderKind::from_token))]
    pub provider: Option<ProviderKind>,

    #[arg(short = 'k', long = "api-key")]
    pub api_key: Option<String>,

    /// Custom Ollama endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(short = 'm', long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,

    #[arg(long, value_parser = token_parser("preset", Preset::from_token))]
    pub preset: Option<Preset>,

    #[arg(long, value_parser = token_parser("style", Style::from_token))]
    pub style: Option<Style>,

    #[arg(long, value_parser = token_parser("color scheme", ColorScheme::from_token))]
    pub colors: Option<ColorScheme>,

    #[arg(long, value_parser = token_parser("complexity", Complexity::from_token))]
    pub complexity: Option<Complexity>,

    #[arg(long, value_parser = token_parser("stroke style", StrokeStyle::from_token))]
    pub stroke: Option<StrokeStyle>,

    /// Named size: small, medium, large or xlarge
    #[arg(short = 's', long, value_parser = token_parser("size", SizePreset::from_token))]
    pub size: Option<SizePreset>,

    /// Aspect ratio: square, landscape, portrait, wide or tall
    #[arg(short = 'a', long, value_parser = token_parser("aspect ratio", AspectRatio::from_token))]
    pub aspect: Option<AspectRatio>,

    #[arg(short = 'w', long)]
    pub width: Option<u32>,

    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Attach nodes directly instead of wrapping them in a group
    #[arg(long = "no-group")]
    pub no_group: bool,

    #[arg(long = "group-name")]
    pub group_name: Option<String>,

    /// origin, center or beside-selection
    #[arg(long, value_parser = token_parser("placement", Placement::from_token))]
    pub placement: Option<Placement>,

    #[arg(long = "no-accessibility")]
    pub no_accessibility: bool,

    #[arg(long)]
    pub gradients: bool,

    #[arg(long)]
    pub animation: bool,

    #[arg(long = "no-optimize-paths")]
    pub no_optimize_paths: bool,

    /// Number of variations (1-4)
    #[arg(short = 'n', long)]
    pub variations: Option<usize>,

    /// Sampling seed; negative means none
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    #[arg(long)]
    pub retries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// SVG document to add the artwork to, or '-' for stdin
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Ids of elements to use as context
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Directory holding keys.json and history.json
    #[arg(long = "store-dir")]
    pub store_dir: Option<PathBuf>,

    /// Remember the API key for this provider
    #[arg(long = "save-key")]
    pub save_key: bool,

    /// Print recent prompts and exit
    #[arg(long)]
    pub history: bool,

    /// Config JSON file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn token_parser<T>(
    what: &'static str,
    parse: fn(&str) -> Option<T>,
) -> impl Fn(&str) -> std::result::Result<T, String> + Clone + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    move |token| parse(token).ok_or_else(|| format!("unknown {what} '{token}'"))
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let store_dir = resolve_store_dir(args.store_dir.as_deref());
    if args.history {
        return print_history(&store_dir);
    }

    let prompt = args
        .prompt
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no prompt given; describe what to draw"))?;

    let credentials = CredentialStore::new(JsonFileStore::new(store_dir.join("keys.json")));
    let kind = config.provider.kind;
    if args.save_key {
        match config.provider.api_key.as_deref() {
            Some(key) if !is_placeholder_credential(key) => {
                credentials.set(kind, key)?;
                tracing::info!(provider = kind.id(), "saved API key");
            }
            _ => anyhow::bail!("--save-key needs a real key from --api-key or the config file"),
        }
    }
    let credential = resolve_credential(&config, &credentials)?;

    let mut document = read_document(args.input.as_deref())?;
    let unknown = document.select(&args.select);
    for id in &unknown {
        tracing::warn!(id = %id, "selected element not found");
    }

    let mut request = config.generation.to_request(&prompt);
    request.context = document.describe_selection();

    let transport = ReqwestTransport::new()?;
    let history_store: Box<dyn KeyValueStore> = Box::new(JsonFileStore::new(store_dir.join("history.json")));
    let pipeline = Pipeline::new(
        config.provider.to_provider_config(credential),
        config.output.to_pipeline_options(),
        &transport,
    )
    .with_history(HistoryLog::new(history_store));

    let report = pipeline.run(&mut document, &request)?;
    for (index, err) in report.failures() {
        eprintln!("variation {} failed: {err}", index + 1);
    }
    if report.all_failed() {
        anyhow::bail!("no SVG could be generated");
    }
    let warnings: usize = report.succeeded().map(|merged| merged.warnings.len()).sum();
    if warnings > 0 {
        eprintln!("{warnings} element(s) could not be imported; run with --verbose for details");
    }

    write_document(&document, args.output.as_deref())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) {
    let provider = &mut config.provider;
    if let Some(v) = args.provider {
        provider.kind = v;
    }
    if args.api_key.is_some() {
        provider.api_key = args.api_key.clone();
    }
    if args.endpoint.is_some() {
        provider.endpoint = args.endpoint.clone();
    }
    if let Some(v) = &args.model {
        provider.model = v.clone();
    }
    if let Some(v) = args.temperature {
        provider.temperature = v;
    }
    if let Some(v) = args.max_tokens {
        provider.max_tokens = v;
    }
    if args.seed.is_some() {
        provider.seed = args.seed;
    }

    let generation = &mut config.generation;
    if let Some(v) = args.preset {
        generation.preset = v;
    }
    if let Some(v) = args.style {
        generation.style = v;
    }
    if let Some(v) = args.colors {
        generation.colors = v;
    }
    if let Some(v) = args.complexity {
        generation.complexity = v;
    }
    if let Some(v) = args.stroke {
        generation.stroke = v;
    }
    if let Some(v) = args.size {
        generation.size = v;
    }
    if let Some(v) = args.aspect {
        generation.aspect = v;
    }
    if args.width.is_some() {
        generation.width = args.width;
    }
    if args.height.is_some() {
        generation.height = args.height;
    }
    generation.gradients |= args.gradients;
    generation.animation |= args.animation;
    if args.no_optimize_paths {
        generation.optimize_paths = false;
    }
    if args.no_accessibility {
        generation.accessibility = false;
    }

    let output = &mut config.output;
    if let Some(v) = args.placement {
        output.placement = v;
    }
    if args.no_group {
        output.group = false;
    }
    if args.group_name.is_some() {
        output.group_name = args.group_name.clone();
    }
    if let Some(v) = args.variations {
        output.variations = v;
    }
    if let Some(v) = args.retries {
        output.retries = v;
    }
    if let Some(v) = args.timeout {
        output.timeout_secs = v;
    }
}

fn resolve_store_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    dirs::config_dir()
        .map(|dir| dir.join("svg-llm"))
        .unwrap_or_else(|| PathBuf::from(".svg-llm"))
}

fn env_key_name(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Gemini => "GEMINI_API_KEY",
        ProviderKind::Ollama => "OLLAMA_API_KEY",
    }
}

/// Flag or config file first, then the saved key, then the provider's environment variable.
fn resolve_credential<S: KeyValueStore>(
    config: &Config,
    credentials: &CredentialStore<S>,
) -> Result<String> {
    let kind = config.provider.kind;
    if let Some(key) = config.provider.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    if let Some(key) = credentials.get(kind)? {
        return Ok(key);
    }
    Ok(std::env::var(env_key_name(kind)).unwrap_or_default())
}

fn read_document(path: Option<&Path>) -> Result<SvgDocument> {
    let Some(path) = path else {
        return Ok(SvgDocument::blank(BLANK_CANVAS, BLANK_CANVAS));
    };
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(SvgDocument::parse(&text)?)
}

fn write_document(document: &SvgDocument, output: Option<&Path>) -> Result<()> {
    let svg = document.to_svg_string();
    match output {
        Some(path) => std::fs::write(path, svg)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(svg.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn print_history(store_dir: &Path) -> Result<()> {
    let history = HistoryLog::new(JsonFileStore::new(store_dir.join("history.json")));
    for entry in history.entries()? {
        println!(
            "{}  {:<9} {:<24} {}x{}  {}",
            entry.timestamp, entry.provider, entry.model, entry.width, entry.height, entry.prompt
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("svgllm").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "a fox",
            "-p",
            "gemini",
            "--style",
            "flat",
            "--size",
            "large",
            "--aspect",
            "wide",
            "--no-group",
            "--seed",
            "-1",
            "-n",
            "3",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.provider.kind, ProviderKind::Gemini);
        assert_eq!(config.generation.style, Style::Flat);
        assert_eq!(config.generation.dimensions(), (600, 337));
        assert!(!config.output.group);
        assert_eq!(config.output.variations, 3);
        assert_eq!(config.provider.to_provider_config(String::new()).seed, None);
    }

    #[test]
    fn rejects_unknown_tokens() {
        let err = Args::try_parse_from(["svgllm", "x", "--colors", "neon"]).unwrap_err();
        assert!(err.to_string().contains("unknown color scheme 'neon'"));
    }

    #[test]
    fn select_splits_on_commas() {
        let args = parse(&["a fox", "--select", "a,b", "--select", "c"]);
        assert_eq!(args.select, vec!["a", "b", "c"]);
    }

    #[test]
    fn explicit_key_beats_saved_key() {
        let credentials = CredentialStore::new(MemoryStore::new());
        credentials.set(ProviderKind::OpenAi, "sk-saved").unwrap();
        let mut config = Config::default();
        assert_eq!(resolve_credential(&config, &credentials).unwrap(), "sk-saved");
        config.provider.api_key = Some("sk-flag".into());
        assert_eq!(resolve_credential(&config, &credentials).unwrap(), "sk-flag");
    }
}
