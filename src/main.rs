//! heartrisk: Heart disease risk inference from the command line.
//!
//! Main entry point for the CLI.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use heartrisk::adapters::filesystem::FsArtifactStore;
use heartrisk::adapters::sanitize::SanitizingMakeWriter;
use heartrisk::config::{LogMode, Settings};
use heartrisk::domain::{Field, FieldDomain};
use heartrisk::{parse_record, Assessment, HeartRiskError, PatientRecord, RiskService};

#[derive(Debug, Parser)]
#[command(
    name = "heartrisk",
    version,
    about = "Heart disease risk prediction against frozen model artifacts",
    long_about = "heartrisk encodes a patient's clinical attributes with the training-time\n\
        label encoders, orders them by the training feature schema and runs the\n\
        trained classifier.\n\n\
        EXAMPLES:\n\
        \n  heartrisk predict --input patient.json      Predict from a JSON file\n\
        \n  echo '{\"sex\": \"Male\"}' | heartrisk predict --fill-defaults   Other fields take form defaults\n\
        \n  heartrisk inspect --artifacts models        Show the loaded artifacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Predict heart disease risk for one patient
    Predict(PredictArgs),

    /// List the input attributes and their accepted values
    Fields,

    /// Load the artifacts and print what they contain
    Inspect(ArtifactArgs),
}

#[derive(Debug, Args)]
struct ArtifactArgs {
    /// Artifact directory (overrides HEARTRISK_ARTIFACT_DIR)
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PredictArgs {
    /// JSON patient object; `-` or omitted reads stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(flatten)]
    artifacts: ArtifactArgs,

    /// Print a machine-readable JSON report
    #[arg(long)]
    json: bool,

    /// Give absent attributes their form defaults (unknown keys are rejected)
    #[arg(long)]
    fill_defaults: bool,
}

/// JSON report for `predict --json`.
#[derive(Serialize)]
struct Report<'a> {
    label: &'static str,
    verdict: &'static str,
    probability: f64,
    percentage: String,
    encoded: &'a heartrisk::EncodedRecord,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            report_error(&e.into());
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            report_error(&e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    // Stdout carries the prediction output, so logs never go there.
    let (writer, guard) = match settings.log_mode {
        LogMode::File => {
            if let Some(parent) = settings.log_file.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&settings.log_file)
                .with_context(|| format!("failed to open log file {:?}", settings.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<HeartRiskError>() {
        Some(e) => eprintln!("error [{}]: {e}", e.category()),
        None => eprintln!("error: {err:#}"),
    }
}

fn run(cli: Cli, settings: &Settings) -> Result<()> {
    match cli.command {
        Command::Predict(args) => predict(&args, settings),
        Command::Fields => {
            print_fields();
            Ok(())
        }
        Command::Inspect(args) => inspect(&args, settings),
    }
}

fn open_service(args: &ArtifactArgs, settings: &Settings) -> Result<RiskService<FsArtifactStore>> {
    let dir = args
        .artifacts
        .clone()
        .unwrap_or_else(|| settings.artifact_dir.clone());
    let store = FsArtifactStore::open(dir, &settings.integrity_policy()).map_err(HeartRiskError::from)?;
    Ok(RiskService::new(store))
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn predict(args: &PredictArgs, settings: &Settings) -> Result<()> {
    let text = read_input(args.input.as_ref())?;
    let raw = parse_record(&text, args.fill_defaults)?;

    let service = open_service(&args.artifacts, settings)?;
    let assessment = service.assess(&raw)?;

    if args.json {
        print_json(&assessment)?;
    } else {
        print_assessment(&assessment);
    }
    Ok(())
}

fn print_assessment(assessment: &Assessment) {
    println!("Encoded input:");
    for (name, value) in assessment.encoded.iter() {
        println!("  {name:<10} {value}");
    }
    println!();
    println!("{}", assessment.result.label.description());
    println!("Probability: {}", assessment.result.percentage());
}

fn print_json(assessment: &Assessment) -> Result<()> {
    let result = &assessment.result;
    let report = Report {
        label: result.label.as_str(),
        verdict: result.label.description(),
        probability: result.probability,
        percentage: result.percentage(),
        encoded: &assessment.encoded,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_fields() {
    let defaults = PatientRecord::default().to_raw_record();
    for field in Field::ALL {
        let domain = match field.domain() {
            FieldDomain::Range { min, max, step } => format!("{min} to {max}, step {step}"),
            FieldDomain::Options(options) => options.join(" | "),
        };
        let default = defaults
            .get(field.name())
            .map(|v| v.as_text().into_owned())
            .unwrap_or_default();
        println!(
            "{:<9} {:<45} {} (default: {default})",
            field.name(),
            field.description(),
            domain
        );
    }
}

fn inspect(args: &ArtifactArgs, settings: &Settings) -> Result<()> {
    let service = open_service(args, settings)?;
    let artifacts = service.warm_up()?;

    let store = service.store();
    println!(
        "Artifacts: {} (manifest verified: {})",
        store.dir().display(),
        store.is_verified()
    );
    println!("Classifier: {}", artifacts.classifier().describe());
    println!("Feature schema ({} columns):", artifacts.schema().len());
    for (i, name) in artifacts.schema().iter().enumerate() {
        println!("  {i:>2}  {name}");
    }
    println!("Encoders:");
    for encoder in artifacts.encoders().iter() {
        let codes: Vec<String> = encoder
            .categories()
            .iter()
            .enumerate()
            .map(|(code, category)| format!("{code}={category}"))
            .collect();
        println!("  {:<9} {}", encoder.field(), codes.join(", "));
    }
    Ok(())
}
