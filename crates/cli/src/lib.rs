use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use nucleus_dsl::{Bindings, Interpreter};
use nucleus_engine::{
    AnalysisResult, AnalyzeError, Engine, NucleusConfig, ProviderError, TurnAction,
    MAX_TURNS_REACHED,
};
use nucleus_graph::ImpactedFile;
use nucleus_protocol::{serialize_json_pretty, BudgetTruncation, ErrorEnvelope, ToolResponse};
use nucleus_snapshot::{ContextWindow, DocumentStats, SearchOptions, SearchPage, SnapshotError};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

mod config;
mod openai;

pub use openai::OpenAiProvider;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "nucleus")]
#[command(about = "Ask questions about codebase snapshots too large for one prompt", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config dir>/nucleus/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question through a multi-turn session with a model
    Analyze(AnalyzeArgs),

    /// Run Nucleus commands in one session without a model
    Eval(EvalArgs),

    /// Regex search over the snapshot lines
    Search(SearchArgs),

    /// Show lines around a file-relative line number
    Context(ContextArgs),

    /// Files a file imports
    Imports(FileArgs),

    /// Files importing a file
    Importers(FileArgs),

    /// Files exporting a symbol
    Exporters(SymbolArgs),

    /// Import cycles
    Cycles(SnapshotArgs),

    /// Files transitively affected by a change to a file
    Impact(ImpactArgs),

    /// Line, char and file counts
    Stats(SnapshotArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Snapshot file
    snapshot: PathBuf,

    /// Natural-language question
    query: String,

    /// Turn ceiling (the selected template may allow fewer)
    #[arg(long)]
    max_turns: Option<usize>,

    /// Per-call provider timeout in milliseconds (0 disables)
    #[arg(long)]
    turn_timeout_ms: Option<u64>,

    /// Model id
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EvalArgs {
    snapshot: PathBuf,

    /// Commands run in order; results are bound as _1, _2, ...
    #[arg(required = true)]
    commands: Vec<String>,

    /// Cap on matches returned by one grep
    #[arg(long)]
    max_grep_matches: Option<usize>,
}

#[derive(Args)]
struct SearchArgs {
    snapshot: PathBuf,

    pattern: String,

    #[arg(short = 'i', long)]
    ignore_case: bool,

    #[arg(long, default_value_t = 100)]
    max_results: usize,

    #[arg(long, default_value_t = 0)]
    offset: usize,
}

#[derive(Args)]
struct ContextArgs {
    snapshot: PathBuf,

    /// File path as listed in the snapshot
    file: String,

    /// 1-based line within the file
    line: usize,

    #[arg(long, default_value_t = 5)]
    before: usize,

    #[arg(long, default_value_t = 5)]
    after: usize,
}

#[derive(Args)]
struct FileArgs {
    snapshot: PathBuf,
    file: String,
}

#[derive(Args)]
struct SymbolArgs {
    snapshot: PathBuf,
    symbol: String,
}

#[derive(Args)]
struct SnapshotArgs {
    snapshot: PathBuf,
}

#[derive(Args)]
struct ImpactArgs {
    snapshot: PathBuf,
    file: String,

    #[arg(long, default_value_t = 3)]
    depth: usize,
}

#[derive(Serialize)]
struct EvalStep {
    turn: usize,
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct FileLinks {
    file: String,
    files: Vec<String>,
}

#[derive(Serialize)]
struct SymbolOutput {
    symbol: String,
    files: Vec<String>,
}

#[derive(Serialize)]
struct CyclesOutput {
    cycles: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct ImpactOutput {
    file: String,
    depth: usize,
    impacted: Vec<ImpactedFile>,
}

#[derive(Serialize)]
struct FileEntry {
    path: String,
    start: usize,
    end: usize,
}

#[derive(Serialize)]
struct StatsOutput {
    path: String,
    #[serde(flatten)]
    stats: DocumentStats,
    file_ranges: Vec<FileEntry>,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Everything except text-mode analyze writes JSON to stdout
    let json_output = match &cli.command {
        Commands::Analyze(args) => args.json,
        _ => true,
    };
    if json_output && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze(args) => run_analyze(args, config, cli.verbose).await,
        Commands::Eval(args) => emit(run_eval(args, config).await),
        Commands::Search(args) => emit(run_search(args, config).await),
        Commands::Context(args) => emit(run_context(args, config).await),
        Commands::Imports(args) => emit(run_imports(args, config).await),
        Commands::Importers(args) => emit(run_importers(args, config).await),
        Commands::Exporters(args) => emit(run_exporters(args, config).await),
        Commands::Cycles(args) => emit(run_cycles(args, config).await),
        Commands::Impact(args) => emit(run_impact(args, config).await),
        Commands::Stats(args) => emit(run_stats(args, config).await),
    }
}

/// Write a JSON envelope for either outcome; errors still fail the process.
fn emit<T: Serialize>(outcome: Result<ToolResponse<T>>) -> Result<()> {
    match outcome {
        Ok(response) => print_stdout(&serialize_json_pretty(&response)?),
        Err(err) => {
            let response = ToolResponse::<()>::error(classify_error(&err));
            print_stdout(&serialize_json_pretty(&response)?)?;
            Err(err)
        }
    }
}

fn classify_snapshot_error(err: &SnapshotError) -> ErrorEnvelope {
    match err {
        SnapshotError::FileNotFound(_) => ErrorEnvelope::new("not_found", err.to_string())
            .with_hint("Run `nucleus stats <snapshot>` to list the files it contains"),
        SnapshotError::InvalidPattern(_) => ErrorEnvelope::new("invalid_pattern", err.to_string()),
        SnapshotError::IoError(_) => ErrorEnvelope::new("io", err.to_string()),
        _ => ErrorEnvelope::new("snapshot", err.to_string()),
    }
}

fn classify_provider_error(err: &ProviderError) -> ErrorEnvelope {
    let envelope = ErrorEnvelope::new(format!("provider_{}", err.category()), err.to_string());
    match err {
        ProviderError::Auth { .. } => {
            envelope.with_hint("Set the variable named by provider.api_key_env")
        }
        ProviderError::Timeout { .. } => envelope.with_hint("Raise --turn-timeout-ms"),
        _ => envelope,
    }
}

fn classify_error(err: &anyhow::Error) -> ErrorEnvelope {
    if let Some(err) = err.downcast_ref::<SnapshotError>() {
        return classify_snapshot_error(err);
    }
    if let Some(err) = err.downcast_ref::<AnalyzeError>() {
        return match err {
            AnalyzeError::Document(inner) => classify_snapshot_error(inner),
            AnalyzeError::Provider(inner) => classify_provider_error(inner),
        };
    }
    ErrorEnvelope::new("internal", format!("{err:#}"))
}

async fn run_analyze(args: AnalyzeArgs, mut config: NucleusConfig, verbose: bool) -> Result<()> {
    if let Some(max_turns) = args.max_turns {
        config.engine.max_turns = max_turns;
    }
    if let Some(timeout) = args.turn_timeout_ms {
        config.engine.turn_timeout_ms = timeout;
    }
    if let Some(model) = args.model {
        config.provider.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.provider.base_url = base_url;
    }

    let engine = Engine::new(config.engine.clone());
    let provider = OpenAiProvider::new(config.provider.clone())?;
    let mut options = engine.analyze_options();
    options.verbose = verbose;
    if !args.json {
        options = options.with_progress(|turn, command, _| eprintln!("[turn {turn}] {command}"));
    }

    let outcome = engine
        .analyze(&provider, &args.snapshot, &args.query, &options)
        .await;

    if args.json {
        let response = outcome.map(|result| {
            let failed = !result.success;
            let clipped = result.history.iter().any(|record| {
                matches!(record.action, TurnAction::Command { truncated: true, .. })
            });
            let mut response = ToolResponse::ok(result);
            if clipped {
                response = response.truncated(BudgetTruncation::MaxChars);
            }
            if failed {
                response = response.truncated(BudgetTruncation::MaxTurns);
            }
            response
        });
        return emit(response.map_err(anyhow::Error::from));
    }

    let result: AnalysisResult = outcome?;
    if result.success {
        print_stdout(&result.answer)
    } else {
        anyhow::bail!(
            "{} after {} turn(s)",
            result.error.as_deref().unwrap_or(MAX_TURNS_REACHED),
            result.turns
        )
    }
}

async fn run_eval(args: EvalArgs, mut config: NucleusConfig) -> Result<ToolResponse<Vec<EvalStep>>> {
    if let Some(max) = args.max_grep_matches {
        config.engine.max_grep_matches = max;
    }
    let engine = Engine::new(config.engine.clone());
    let document = engine.load(&args.snapshot).await?;
    let interpreter =
        Interpreter::new(&document).with_max_matches(config.engine.max_grep_matches);

    let mut bindings = Bindings::new();
    let mut steps = Vec::with_capacity(args.commands.len());
    for (idx, command) in args.commands.into_iter().enumerate() {
        let turn = idx + 1;
        let step = match interpreter.execute(&command, &bindings) {
            Ok(value) => {
                let json = serde_json::to_value(&value).context("Failed to serialize result")?;
                bindings.record_result(turn, value);
                EvalStep {
                    turn,
                    command,
                    result: Some(json),
                    error: None,
                }
            }
            Err(err) => EvalStep {
                turn,
                command,
                result: None,
                error: Some(err.to_string()),
            },
        };
        steps.push(step);
    }
    Ok(ToolResponse::ok(steps))
}

async fn run_search(args: SearchArgs, config: NucleusConfig) -> Result<ToolResponse<SearchPage>> {
    let engine = Engine::new(config.engine);
    let document = engine.load(&args.snapshot).await?;
    let options = SearchOptions {
        case_insensitive: args.ignore_case,
        max_results: args.max_results,
        offset: args.offset,
    };
    let page = nucleus_snapshot::search_document(&document, &args.pattern, &options)?;
    let response = if page.has_more {
        ToolResponse::ok(page).truncated(BudgetTruncation::MaxMatches)
    } else {
        ToolResponse::ok(page)
    };
    Ok(response)
}

async fn run_context(
    args: ContextArgs,
    config: NucleusConfig,
) -> Result<ToolResponse<ContextWindow>> {
    let engine = Engine::new(config.engine);
    let document = engine.load(&args.snapshot).await?;
    let window =
        nucleus_snapshot::context_window(&document, &args.file, args.line, args.before, args.after)?;
    Ok(ToolResponse::ok(window))
}

async fn run_imports(args: FileArgs, config: NucleusConfig) -> Result<ToolResponse<FileLinks>> {
    let queries = Engine::new(config.engine).structural(&args.snapshot).await?;
    let files = queries.file_imports(&args.file);
    Ok(ToolResponse::ok(FileLinks {
        file: args.file,
        files,
    }))
}

async fn run_importers(args: FileArgs, config: NucleusConfig) -> Result<ToolResponse<FileLinks>> {
    let queries = Engine::new(config.engine).structural(&args.snapshot).await?;
    let files = queries.importers(&args.file);
    Ok(ToolResponse::ok(FileLinks {
        file: args.file,
        files,
    }))
}

async fn run_exporters(
    args: SymbolArgs,
    config: NucleusConfig,
) -> Result<ToolResponse<SymbolOutput>> {
    let queries = Engine::new(config.engine).structural(&args.snapshot).await?;
    let files = queries.exporters(&args.symbol);
    Ok(ToolResponse::ok(SymbolOutput {
        symbol: args.symbol,
        files,
    }))
}

async fn run_cycles(args: SnapshotArgs, config: NucleusConfig) -> Result<ToolResponse<CyclesOutput>> {
    let queries = Engine::new(config.engine).structural(&args.snapshot).await?;
    Ok(ToolResponse::ok(CyclesOutput {
        cycles: queries.cycles(),
    }))
}

async fn run_impact(args: ImpactArgs, config: NucleusConfig) -> Result<ToolResponse<ImpactOutput>> {
    let queries = Engine::new(config.engine).structural(&args.snapshot).await?;
    let impacted = queries.impact(&args.file, args.depth);
    Ok(ToolResponse::ok(ImpactOutput {
        file: args.file,
        depth: args.depth,
        impacted,
    }))
}

async fn run_stats(args: SnapshotArgs, config: NucleusConfig) -> Result<ToolResponse<StatsOutput>> {
    let engine = Engine::new(config.engine);
    let document = engine.load(&args.snapshot).await?;
    let file_ranges = document
        .files()
        .map(|(path, range)| FileEntry {
            path: path.to_string(),
            start: range.start,
            end: range.end,
        })
        .collect();
    Ok(ToolResponse::ok(StatsOutput {
        path: document.path().display().to_string(),
        stats: document.stats(),
        file_ranges,
    }))
}
