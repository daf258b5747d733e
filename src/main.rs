//! HemoScan: Anemia screening engine
//!
//! Command-line entry point. Reads one JSON request from `--input` or stdin
//! and prints the JSON response on stdout. Logs go to stderr or a file.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hemoscan::adapters::sanitize::SanitizingMakeWriter;
use hemoscan::application::{DietService, ScreeningService};
use hemoscan::config::{EngineConfig, LogSink};
use hemoscan::domain::{DietRequest, QuickScreenRecord};
use hemoscan::{DietPlan, HemoscanError, PatientRecord, SeverityResult};

const USAGE: &str = "Usage: hemoscan <predict|quick-screen|diet|assess|model-info|statistics|health> [--input <file>] [--language <code>]";

#[derive(Debug, Clone, Copy)]
enum Command {
    Predict,
    QuickScreen,
    Diet,
    Assess,
    ModelInfo,
    Statistics,
    Health,
}

impl Command {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "predict" => Self::Predict,
            "quick-screen" => Self::QuickScreen,
            "diet" => Self::Diet,
            "assess" => Self::Assess,
            "model-info" => Self::ModelInfo,
            "statistics" => Self::Statistics,
            "health" => Self::Health,
            _ => return None,
        })
    }
}

struct Args {
    command: Command,
    input: Option<PathBuf>,
    language: Option<String>,
}

fn parse_args() -> std::result::Result<Args, HemoscanError> {
    let usage = || HemoscanError::Validation(USAGE.to_string());
    let mut args = std::env::args().skip(1);
    let mut command = None;
    let mut input = None;
    let mut language = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input" => input = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
            "--language" => language = Some(args.next().ok_or_else(usage)?),
            "-h" | "--help" => return Err(usage()),
            name if command.is_none() => command = Some(Command::parse(name).ok_or_else(usage)?),
            _ => return Err(usage()),
        }
    }

    Ok(Args {
        command: command.ok_or_else(usage)?,
        input,
        language,
    })
}

fn init_logging(sink: &LogSink) -> Result<WorkerGuard> {
    // stdout carries the JSON response, so logs never go there.
    let (writer, guard) = match sink {
        LogSink::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: don't fail startup just because the directory is missing.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogSink::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();
    Ok(guard)
}

fn read_request<T: DeserializeOwned>(input: Option<&Path>) -> Result<T> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(HemoscanError::Io)
            .with_context(|| format!("reading {path:?}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(HemoscanError::Io)
                .context("reading request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| HemoscanError::Validation(format!("malformed request: {e}")).into())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(HemoscanError::Serialization)?;
    println!("{json}");
    Ok(())
}

/// Classification with its chained diet plan.
#[derive(Serialize)]
struct Assessment {
    result: SeverityResult,
    diet_plan: DietPlan,
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = EngineConfig::from_env()?;
    let _guard = init_logging(&config.log_sink)?;
    tracing::info!(
        "HemoScan {} handling {:?}",
        env!("CARGO_PKG_VERSION"),
        args.command
    );

    let input = args.input.as_deref();
    match args.command {
        Command::Predict => {
            let record: PatientRecord = read_request(input)?;
            let screening = ScreeningService::from_config(&config);
            print_json(&screening.classify(&record)?)
        }
        Command::QuickScreen => {
            let record: QuickScreenRecord = read_request(input)?;
            let screening = ScreeningService::from_config(&config);
            print_json(&screening.quick_screen(record)?)
        }
        Command::Diet => {
            let mut request: DietRequest = read_request(input)?;
            if args.language.is_some() {
                request.language = args.language;
            }
            let diet = DietService::from_config(&config)?;
            print_json(&diet.recommend(&request)?)
        }
        Command::Assess => {
            let record: PatientRecord = read_request(input)?;
            let screening = ScreeningService::from_config(&config);
            let diet = DietService::from_config(&config)?;
            let result = screening.classify(&record)?;
            let diet_plan = diet.recommend_for(&result, &record, args.language.as_deref())?;
            print_json(&Assessment { result, diet_plan })
        }
        Command::ModelInfo => print_json(&ScreeningService::from_config(&config).model_info()?),
        Command::Statistics => print_json(&ScreeningService::from_config(&config).statistics()?),
        Command::Health => print_json(&ScreeningService::from_config(&config).health()),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<HemoscanError>() {
        Some(HemoscanError::Validation(_)) => 2,
        Some(HemoscanError::ModelUnavailable(_) | HemoscanError::Model(_)) => 3,
        _ => 1,
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            let body = serde_json::json!({ "error": format!("{err:#}"), "code": code });
            eprintln!("{body}");
            ExitCode::from(code)
        }
    }
}
