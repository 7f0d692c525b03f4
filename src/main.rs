use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use followup_tools::config::PipelineConfig;
use followup_tools::model::Endpoint;
use followup_tools::pipeline::{self, RunOptions};
use followup_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Process(args) => execute_process(args),
    }
}

fn execute_process(args: ProcessArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(ToolError::MissingInput(args.input));
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(output_dir) = args.output_dir {
        config.output.output_dir = output_dir;
    }

    let summary = pipeline::run(&RunOptions {
        input: args.input,
        endpoint: args.endpoint.into(),
        config,
        group_label: args.group_label,
        wide_only: args.wide_only,
    })?;

    println!(
        "processed {} patients ({} with events, {} skipped)",
        summary.total_patients, summary.patients_with_events, summary.skipped_patients
    );
    println!("workbook: {}", summary.workbook_path.display());
    println!("survival: {}", summary.survival_path.display());
    println!("summary:  {}", summary.summary_path.display());
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Process clinical follow-up workbooks into survival-analysis tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one follow-up workbook end to end.
    Process(ProcessArgs),
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Input .xlsx workbook with one sheet per follow-up time point.
    #[arg(long)]
    input: PathBuf,

    /// Survival endpoint to compute outcomes against.
    #[arg(long, value_enum, default_value_t = EndpointKind::Death)]
    endpoint: EndpointKind,

    /// Optional YAML configuration overriding the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the exported tables.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Cohort label used in output filenames (detected from the input
    /// filename when omitted).
    #[arg(long)]
    group_label: Option<String>,

    /// Emit only the wide per-patient sheet.
    #[arg(long)]
    wide_only: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EndpointKind {
    Death,
    Mace,
    Mi,
    Angina,
    HeartFailure,
    Revascularization,
    Hospitalization,
    AnyEvent,
}

impl From<EndpointKind> for Endpoint {
    fn from(kind: EndpointKind) -> Self {
        match kind {
            EndpointKind::Death => Endpoint::Death,
            EndpointKind::Mace => Endpoint::Mace,
            EndpointKind::Mi => Endpoint::Mi,
            EndpointKind::Angina => Endpoint::Angina,
            EndpointKind::HeartFailure => Endpoint::HeartFailure,
            EndpointKind::Revascularization => Endpoint::Revascularization,
            EndpointKind::Hospitalization => Endpoint::Hospitalization,
            EndpointKind::AnyEvent => Endpoint::AnyEvent,
        }
    }
}
