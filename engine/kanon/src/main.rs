use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use kanon_pipeline::{Pipeline, PipelineError};
use kanon_record::{AnonError, Record};
use log::LevelFilter;
use serde::Serialize;
use thiserror::Error;

pub mod report;
pub mod settings;
pub mod source;

use settings::Settings;
use source::SourceError;

const GENERALIZED_FILE: &str = "generalized.data";
const ANONYMIZED_FILE: &str = "anonymized.data";
const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "kanon",
    version,
    about = "Re-identification risk assessment and anonymization for tabular data",
    long_about = "kanon measures k-anonymity, l-diversity and t-closeness of a delimited\n\
        dataset, generalizes its quasi-identifiers, suppresses groups that stay\n\
        unsafe and audits the result.\n\n\
        EXAMPLES:\n\
        \n  kanon assess adult.data                   Measure the raw risk\n\
        \n  kanon run adult.data --out-dir out        Anonymize and write reports\n\
        \n  kanon audit out/anonymized.data --json    Audit an anonymized file\n\
        \n  kanon init-config > kanon.toml            Start from the reference settings"
)]
struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Measure k and unique profiles of a raw dataset
    Assess(InputArgs),
    /// Generalize, suppress and audit a dataset
    Run(RunArgs),
    /// Closeness audit and feasibility sweep of an anonymized dataset
    Audit(InputArgs),
    /// Print the reference settings as TOML
    InitConfig,
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Headerless comma-delimited data file
    input: PathBuf,

    /// Settings file (TOML); the reference settings when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Directory receiving the data files and report.json
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(AnonError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("{0}")]
    Analysis(AnonError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// 1 for privacy or data failures, 2 for usage and I/O problems.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Analysis(_) => 1,
            CliError::Pipeline(e) if e.stage != kanon_pipeline::Stage::Configure => 1,
            _ => 2,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

fn output_mode(json: bool) -> OutputMode {
    if json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}

fn emit<T, F>(mode: OutputMode, report: &T, render: F) -> Result<(), CliError>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match mode {
        OutputMode::Text => print!("{}", render(report)),
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn load(args: &InputArgs) -> Result<(Settings, Vec<Record>), CliError> {
    let settings = Settings::load(args.config.as_deref()).map_err(CliError::Config)?;
    let records = source::read_records(&args.input, &settings.columns)?;
    log::info!("read {} records from {}", records.len(), args.input.display());
    Ok((settings, records))
}

fn run_assess(args: &InputArgs) -> Result<(), CliError> {
    let (settings, records) = load(args)?;
    let summary = report::assess(&records, &settings.pipeline).map_err(CliError::Analysis)?;
    emit(output_mode(args.json), &summary, report::render_assess)
}

fn run_audit(args: &InputArgs) -> Result<(), CliError> {
    let (settings, records) = load(args)?;
    let summary = report::audit(&records, &settings.pipeline).map_err(CliError::Analysis)?;
    emit(output_mode(args.json), &summary, report::render_audit)
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| {
        CliError::Source(SourceError::Write {
            path: path.to_path_buf(),
            source,
        })
    })
}

fn run_pipeline(args: &RunArgs) -> Result<(), CliError> {
    let (settings, records) = load(&args.input)?;
    let pipeline = Pipeline::new(settings.pipeline)?;
    let outcome = pipeline.run(records)?;

    fs::create_dir_all(&args.out_dir).map_err(|source| {
        CliError::Source(SourceError::Write {
            path: args.out_dir.clone(),
            source,
        })
    })?;
    source::write_records(
        &args.out_dir.join(GENERALIZED_FILE),
        &outcome.generalized_records,
    )?;
    source::write_records(&args.out_dir.join(ANONYMIZED_FILE), &outcome.final_records)?;
    let json = serde_json::to_string_pretty(&outcome)?;
    write_file(&args.out_dir.join(REPORT_FILE), &json)?;
    log::info!("wrote results to {}", args.out_dir.display());

    emit(output_mode(args.input.json), &outcome, report::render_outcome)
}

fn run_init_config() -> Result<(), CliError> {
    let text = Settings::default().to_toml().map_err(CliError::Config)?;
    print!("{text}");
    Ok(())
}

fn run_cli() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Assess(args) => run_assess(args),
        Command::Run(args) => run_pipeline(args),
        Command::Audit(args) => run_audit(args),
        Command::InitConfig => run_init_config(),
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

fn main() {
    std::process::exit(run_cli());
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanon_pipeline::Stage;

    #[test]
    fn cli_parses_verbose_flag() {
        let cli = Cli::try_parse_from(["kanon", "-vvv", "init-config"]).unwrap();
        assert_eq!(cli.verbose, 3, "verbose count should be 3 for -vvv");
    }

    #[test]
    fn cli_parses_run_with_options() {
        let cli = Cli::try_parse_from([
            "kanon",
            "run",
            "adult.data",
            "--config",
            "kanon.toml",
            "--out-dir",
            "results",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.input.input, PathBuf::from("adult.data"));
                assert_eq!(args.input.config, Some(PathBuf::from("kanon.toml")));
                assert_eq!(args.out_dir, PathBuf::from("results"));
                assert!(args.input.json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn run_defaults_out_dir() {
        let cli = Cli::try_parse_from(["kanon", "run", "adult.data"]).unwrap();
        match cli.command {
            Command::Run(args) => assert_eq!(args.out_dir, PathBuf::from("out")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn assess_requires_an_input_file() {
        assert!(Cli::try_parse_from(["kanon", "assess"]).is_err());
    }

    #[test]
    fn exit_codes_separate_data_failures_from_usage_errors() {
        let failed = CliError::Pipeline(PipelineError {
            stage: Stage::Suppressed,
            source: AnonError::EmptyDataset,
        });
        assert_eq!(failed.exit_code(), 1);
        let misconfigured = CliError::Pipeline(PipelineError {
            stage: Stage::Configure,
            source: AnonError::configuration("min_l must be at least 1"),
        });
        assert_eq!(misconfigured.exit_code(), 2);
        assert_eq!(CliError::Analysis(AnonError::EmptyDataset).exit_code(), 1);
        assert_eq!(
            CliError::Config(AnonError::configuration("bad")).exit_code(),
            2
        );
    }
}
