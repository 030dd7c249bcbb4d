//! Transmute - mutate/stabilize text pipeline
//!
//! CLI entry point: `transmute run` for the N-cycle transmutation and
//! `transmute refactor` for single-shot analyze → apply.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use transmute::cli::{render_refactor_report, render_run_summary, CliObserver, RunDisplay};
use transmute::config::{ProviderKind, TransmuteConfig};
use transmute::log::{HistoryLog, ProgressWriter};
use transmute::pipeline::{CancelFlag, Phase, PromptSet, RefactorPipeline, RunSummary, TransmutePipeline};
use transmute::provider::build_provider;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "transmute.toml";

/// Mutate/stabilize text transmutation over pluggable generative backends
///
/// Drives a text through cycles of high-temperature mutation and
/// low-temperature stabilization anchored on the original, scoring every
/// cycle.
#[derive(Parser, Debug)]
#[command(name = "transmute", version, about)]
struct Cli {
    /// Path to transmute.toml (defaults to ./transmute.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend to use, overriding the config file
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderKind>,

    /// Model name, overriding the config file
    #[arg(long, global = true)]
    model: Option<String>,

    /// Debug-level diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the mutate/stabilize transmutation
    Run(RunArgs),
    /// Analyze code and apply a refactor plan
    Refactor(RefactorArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Source text file, or `-` for stdin
    #[arg(long, short)]
    input: PathBuf,

    /// Write the final text here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Directory for history.jsonl and progress.json
    #[arg(long, default_value = ".transmute")]
    log_dir: PathBuf,

    /// Skip writing the log directory
    #[arg(long)]
    no_log: bool,

    /// Number of cycles
    #[arg(long)]
    cycles: Option<u32>,

    /// Mutation temperature
    #[arg(long)]
    mutate_temp: Option<f32>,

    /// Stabilization temperature
    #[arg(long)]
    stabilize_temp: Option<f32>,
}

#[derive(Args, Debug)]
struct RefactorArgs {
    /// Code file, or `-` for stdin
    #[arg(long, short)]
    input: PathBuf,

    /// Language of the code
    #[arg(long, short)]
    language: String,

    /// Refactor goal (repeatable)
    #[arg(long = "goal", short)]
    goals: Vec<String>,

    /// Write the optimized code here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file (explicit, or `./transmute.toml` if it exists) and
/// apply the CLI overrides.
fn load_config(cli: &Cli) -> Result<TransmuteConfig> {
    let mut config = match &cli.config {
        Some(path) => TransmuteConfig::from_path(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => TransmuteConfig::from_path(DEFAULT_CONFIG)?,
        None => TransmuteConfig::default(),
    };

    apply_overrides(&mut config, cli);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut TransmuteConfig, cli: &Cli) {
    if let Some(kind) = cli.provider {
        if kind != config.provider.kind {
            // A model name from the file belongs to the other backend
            config.provider.model = None;
        }
        config.provider.kind = kind;
    }
    if let Some(model) = &cli.model {
        config.provider.model = Some(model.clone());
    }

    if let Command::Run(args) = &cli.command {
        if let Some(cycles) = args.cycles {
            config.pipeline.cycles = cycles;
        }
        if let Some(temp) = args.mutate_temp {
            config.pipeline.mutate_temperature = temp;
        }
        if let Some(temp) = args.stabilize_temp {
            config.pipeline.stabilize_temperature = temp;
        }
    }
}

async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        tokio::io::stdin()
            .read_to_string(&mut content)
            .await
            .context("Failed to read stdin")?;
        return Ok(content);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file: {}", path.display()))
}

async fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write output file: {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Flip `flag` on the first Ctrl-C.
fn cancel_on_ctrl_c(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current call...");
            flag.cancel();
        }
    });
}

async fn run(config: &TransmuteConfig, args: &RunArgs) -> Result<Phase> {
    let source = read_input(&args.input).await?;
    let provider = build_provider(&config.provider).context("Failed to initialize provider")?;
    debug!(provider = provider.name(), model = config.provider.model_name(), "provider ready");

    let display = RunDisplay::new(provider.name());
    display.print_header(config.pipeline.cycles);

    let mut observer = CliObserver::new(display);
    if !args.no_log {
        observer = observer.with_logs(
            HistoryLog::new(&args.log_dir).context("Failed to initialize history log")?,
            ProgressWriter::new(&args.log_dir).context("Failed to initialize progress file")?,
        );
    }

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());

    let pipeline = TransmutePipeline::from_config(Arc::clone(&provider), config);
    let state = pipeline
        .run(&source, &mut observer, || cancel.is_cancelled())
        .await;

    if let Some(summary) = RunSummary::from_history(&state.history) {
        render_run_summary(&summary);
    }

    if state.phase == Phase::Error {
        warn!(completed = state.history.len(), "run ended in error, no output written");
    } else {
        write_output(args.output.as_deref(), &state.current_text).await?;
    }

    Ok(state.phase)
}

async fn refactor(config: &TransmuteConfig, args: &RefactorArgs) -> Result<()> {
    let code = read_input(&args.input).await?;
    let provider = build_provider(&config.provider).context("Failed to initialize provider")?;

    let pipeline =
        RefactorPipeline::new(provider).with_prompts(PromptSet::with_overrides(&config.prompts));
    let report = pipeline
        .optimize(&code, &args.language, &args.goals)
        .await
        .context("Refactor failed")?;

    render_refactor_report(&report);
    write_output(args.output.as_deref(), &report.optimized_code).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Run(args) => {
            if run(&config, args).await? == Phase::Error {
                std::process::exit(1);
            }
        }
        Command::Refactor(args) => refactor(&config, args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = parse(&[
            "transmute", "run", "--input", "in.txt", "--cycles", "5", "--mutate-temp", "1.5",
            "--provider", "ollama",
        ]);

        assert_eq!(cli.provider, Some(ProviderKind::Ollama));
        let Command::Run(args) = &cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input, PathBuf::from("in.txt"));
        assert_eq!(args.cycles, Some(5));
        assert_eq!(args.log_dir, PathBuf::from(".transmute"));
    }

    #[test]
    fn test_parse_refactor_with_repeated_goals() {
        let cli = parse(&[
            "transmute", "refactor", "-i", "-", "--language", "rust", "--goal", "flatten",
            "--goal", "rename",
        ]);
        let Command::Refactor(args) = &cli.command else {
            panic!("expected refactor");
        };
        assert_eq!(args.input, PathBuf::from("-"));
        assert_eq!(args.goals, vec!["flatten", "rename"]);
    }

    #[test]
    fn test_parse_claude_code_provider_name() {
        let cli = parse(&["transmute", "--provider", "claude-code", "run", "-i", "x"]);
        assert_eq!(cli.provider, Some(ProviderKind::ClaudeCode));
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["transmute", "run"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = parse(&[
            "transmute", "run", "-i", "x", "--cycles", "7", "--stabilize-temp", "0.1", "--model",
            "local-model",
        ]);
        let mut config = TransmuteConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(config.pipeline.cycles, 7);
        assert!((config.pipeline.stabilize_temperature - 0.1).abs() < f32::EPSILON);
        assert!((config.pipeline.mutate_temperature - 1.2).abs() < f32::EPSILON);
        assert_eq!(config.provider.model_name(), "local-model");
    }

    #[test]
    fn test_switching_provider_drops_file_model() {
        let mut config = TransmuteConfig::parse("[provider]\nkind = \"openai\"\nmodel = \"gpt-4o\"\n").unwrap();
        let cli = parse(&["transmute", "--provider", "gemini", "run", "-i", "x"]);
        apply_overrides(&mut config, &cli);

        assert_eq!(config.provider.kind, ProviderKind::Gemini);
        assert_eq!(config.provider.model_name(), "gemini-2.0-flash");
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "[pipeline]\ncycles = 2\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let cli = parse(&["transmute", "--config", path_arg.as_str(), "run", "-i", "x"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.pipeline.cycles, 2);
    }

    #[test]
    fn test_load_config_rejects_invalid_override() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let cli = parse(&["transmute", "--config", path_arg.as_str(), "run", "-i", "x", "--cycles", "0"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let cli = parse(&["transmute", "--config", "/nonexistent/transmute.toml", "run", "-i", "x"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[tokio::test]
    async fn test_read_input_and_write_output_files() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.txt");
        std::fs::write(&input, "hello\nworld").unwrap();

        let content = read_input(&input).await.unwrap();
        assert_eq!(content, "hello\nworld");

        let output = tmp.path().join("out.txt");
        write_output(Some(&output), "result").await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "result");
    }

    #[tokio::test]
    async fn test_read_missing_input_fails() {
        let err = read_input(Path::new("/nonexistent/input.txt")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read input file"));
    }
}
