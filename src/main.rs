use anyhow::Context;
use clap::Parser;
use docsmith::{
    Config, Error, FileFilterConfig, OpenAiClient, Pipeline, Survey, TokenizerKind,
    API_BASE_VAR, API_KEY_VAR, DEFAULT_API_BASE, DEFAULT_MODEL, MODEL_VAR,
};
use inquire::{Confirm, InquireError, Text};
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn, Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

#[derive(Parser, Debug)]
#[command(
    name = "docsmith",
    version,
    author,
    about = "Generate a README and requirements.txt for a Python project with an LLM",
    long_about = "Generate a README and requirements.txt for a Python project with an LLM.\n\n\
    The tool scans a folder for Python files, extracts third-party imports, estimates \
    the token cost and asks for confirmation before summarizing each file with a chat \
    model. Summaries are cached by content hash, so re-running on an unchanged project \
    makes no per-file requests.\n\n\
    USAGE EXAMPLES:\n  \
      # Pick the folder interactively\n  \
      docsmith\n\n  \
      # Document a project without the confirmation prompt\n  \
      docsmith ./my-project --yes\n\n  \
      # Only show what would be analyzed and what it would cost\n  \
      docsmith ./my-project --dry-run --tokenizer simple"
)]
struct Cli {
    /// Python project folder to document (asked for when omitted)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Directory under which the per-project output folder is created
    #[arg(short, long, default_value = "output", value_name = "DIR")]
    out: PathBuf,

    /// Chat model used for analysis and token counting
    #[arg(long, env = MODEL_VAR, default_value = DEFAULT_MODEL)]
    model: String,

    /// API credential
    #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Root URL of the chat-completion API
    #[arg(long, env = API_BASE_VAR, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Price in USD per 1000 tokens (defaults to the model's list price)
    #[arg(long, value_name = "USD")]
    price: Option<f64>,

    /// Tokenizer used for the cost estimate
    #[arg(long, value_enum, default_value = "tiktoken")]
    tokenizer: CliTokenizer,

    /// Glob pattern of files to skip (can be used multiple times)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Extra module name to treat as standard library (can be used multiple times)
    #[arg(long = "stdlib", value_name = "NAME")]
    stdlib: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Estimate only: write nothing and make no model requests
    #[arg(long)]
    dry_run: bool,

    /// Back up existing output files before overwriting them
    #[arg(long)]
    backup: bool,

    /// Drop cache records of files that no longer exist
    #[arg(long)]
    prune: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    Tiktoken,
    Simple,
    Enhanced,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::Tiktoken => Self::Tiktoken,
            CliTokenizer::Simple => Self::Simple,
            CliTokenizer::Enhanced => Self::Enhanced,
        }
    }
}

fn main() -> ExitCode {
    // .env must be loaded before clap reads the environment
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(cli.verbose, cli.quiet) {
        eprintln!("[ERROR] {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::Aborted)) => {
            info!("{e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let root = select_folder(cli.path)?;

    let mut builder = Config::builder()
        .root_dir(root)
        .output_root(cli.out)
        .model(cli.model)
        .api_key_opt(cli.api_key)
        .api_base(cli.api_base)
        .tokenizer(cli.tokenizer.into())
        .file_filter(FileFilterConfig::new().exclude_files(cli.exclude))
        .extra_stdlib(cli.stdlib)
        .dry_run(cli.dry_run)
        .backup_existing(cli.backup)
        .prune_cache(cli.prune)
        .show_progress(!cli.quiet);

    if let Some(price) = cli.price {
        builder = builder.price_per_1k_tokens(price);
    }

    let config = builder.build()?;

    if config.dry_run {
        let survey = Pipeline::offline(config)?.estimate_only()?;
        report_estimate(&survey);
        return Ok(());
    }

    let model = OpenAiClient::new(&config)?;
    let pipeline = Pipeline::new(config, Box::new(model)).context("Failed to create pipeline")?;

    let prepared = pipeline.prepare()?;
    report_estimate(&prepared.survey);
    info!("{} of {} files need a new summary", prepared.pending(), prepared.survey.files.len());

    if !cli.yes && !confirm("Proceed with the analysis?")? {
        return Err(Error::Aborted.into());
    }

    let stats = pipeline.analyze(prepared)?;
    info!(
        "Done in {:.2}s: {} analyzed, {} reused, {} failed",
        stats.duration.as_secs_f64(),
        stats.analyzed,
        stats.reused,
        stats.failed
    );

    Ok(())
}

/// Returns `path`, or asks for a folder when none was given.
fn select_folder(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }

    let answer = Text::new("Python project folder:")
        .with_help_message("path to the folder to document")
        .prompt()
        .map_err(prompt_error)?;

    let answer = answer.trim();
    if answer.is_empty() {
        anyhow::bail!("No folder selected");
    }

    Ok(PathBuf::from(answer))
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    Confirm::new(question)
        .with_default(true)
        .prompt()
        .map_err(prompt_error)
}

fn prompt_error(e: InquireError) -> anyhow::Error {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => Error::Aborted.into(),
        other => anyhow::Error::new(other).context("Prompt failed"),
    }
}

fn report_estimate(survey: &Survey) {
    let scan = &survey.scan_stats;
    if scan.errors > 0 {
        warn!("{} files could not be read", scan.errors);
    }
    debug!(
        "Scanned {} files: {} Python, {} skipped",
        scan.total_files, scan.source_files, scan.skipped_files
    );

    for (file, counted) in survey.files.iter().zip(&survey.estimate.per_file) {
        info!("  {} ({} tokens)", file.relative_path, counted.tokens);
    }
    info!("Total tokens: {}", survey.estimate.total_tokens);
    info!("Estimated cost: ${:.2}", survey.estimate.cost);
}

/// Renders events as `[LEVEL] message`.
struct LevelPrefix;

impl<S, N> FormatEvent<S, N> for LevelPrefix
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn setup_tracing(verbosity: u8, quiet: bool) -> anyhow::Result<()> {
    let default_directive = match (quiet, verbosity) {
        (true, _) => "docsmith=warn",
        (false, 0) => "docsmith=info",
        (false, 1) => "docsmith=debug",
        _ => "docsmith=trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(LevelPrefix))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}
