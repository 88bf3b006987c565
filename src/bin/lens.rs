//! Lens CLI - Command-line interface for Exam Lens
//!
//! Commands:
//! - ranges: Print per-feature control ranges
//! - sessions: List aggregated exam sessions
//! - match: Resolve one query to its nearest session
//! - replay: Resolve a stream of control events from stdin
//! - doctor: Check the dataset layout and reference data

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use exam_lens::encoder::MatchEncoder;
use exam_lens::table::{table_keys, table_path, FeatureTable};
use exam_lens::types::PerFeature;
use exam_lens::{
    ControlEvent, Dashboard, Exam, Feature, LensConfig, LensError, StudentId, LENS_VERSION,
    PRODUCER_NAME,
};

/// Lens - Nearest-session matching over exam-stress recordings
#[derive(Parser)]
#[command(name = "lens")]
#[command(author = "Synheart AI Inc")]
#[command(version = LENS_VERSION)]
#[command(about = "Find the exam session closest to a target feature vector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct DataArgs {
    /// Dataset root containing HR/, EDA/, BVP/, TEMP/ and STRESS/
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON config file (data directory and reference tables)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-feature control ranges
    Ranges {
        #[command(flatten)]
        data: DataArgs,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// List aggregated exam sessions
    Sessions {
        #[command(flatten)]
        data: DataArgs,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Resolve one query to its nearest session
    Match {
        #[command(flatten)]
        data: DataArgs,

        /// Target average heart rate
        #[arg(long, value_parser = parse_finite)]
        hr: Option<f64>,

        /// Target average EDA (scaled x100)
        #[arg(long, value_parser = parse_finite)]
        eda: Option<f64>,

        /// Target average BVP (scaled x5)
        #[arg(long, value_parser = parse_finite)]
        bvp: Option<f64>,

        /// Target average skin temperature (scaled x5)
        #[arg(long, value_parser = parse_finite)]
        temp: Option<f64>,

        /// Target average stress; queries stress alone
        #[arg(long, value_parser = parse_finite, conflicts_with_all = ["hr", "eda", "bvp", "temp"])]
        stress: Option<f64>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Resolve FEATURE=VALUE control events read line by line from stdin
    Replay {
        #[command(flatten)]
        data: DataArgs,

        /// Flush output after each event
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Check the dataset layout and reference data
    Doctor {
        #[command(flatten)]
        data: DataArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LensCliError> {
    match cli.command {
        Commands::Ranges {
            data,
            output_format,
        } => cmd_ranges(&data, output_format),

        Commands::Sessions {
            data,
            output_format,
        } => cmd_sessions(&data, output_format),

        Commands::Match {
            data,
            hr,
            eda,
            bvp,
            temp,
            stress,
            output_format,
        } => {
            let physiological = [
                (Feature::Hr, hr),
                (Feature::Eda, eda),
                (Feature::Bvp, bvp),
                (Feature::Temp, temp),
            ];
            cmd_match(&data, &physiological, stress, output_format)
        }

        Commands::Replay { data, flush } => cmd_replay(&data, flush),

        Commands::Doctor { data, json } => cmd_doctor(&data, json),
    }
}

fn resolve_config(args: &DataArgs) -> Result<LensConfig, LensCliError> {
    let mut config = match &args.config {
        Some(path) => LensConfig::load(path)?,
        None => LensConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data_dir = data.clone();
    }
    Ok(config)
}

fn cmd_ranges(args: &DataArgs, output_format: OutputFormat) -> Result<(), LensCliError> {
    let dashboard = Dashboard::load(&resolve_config(args)?)?;

    let rows: Vec<RangeRow> = dashboard
        .ranges()
        .iter()
        .map(|(&feature, range)| RangeRow {
            feature,
            min: range.min,
            max: range.max,
            initial: range.midpoint(),
        })
        .collect();

    print!("{}", format_output(&rows, &output_format)?);
    Ok(())
}

fn cmd_sessions(args: &DataArgs, output_format: OutputFormat) -> Result<(), LensCliError> {
    let dashboard = Dashboard::load(&resolve_config(args)?)?;

    let rows: Vec<SessionRow> = dashboard
        .sessions()
        .iter()
        .map(|session| SessionRow {
            student: session.student,
            exam: session.exam,
            grade: session.grade,
            duration_minutes: session.duration_minutes,
            averages: session.avg.clone(),
        })
        .collect();

    print!("{}", format_output(&rows, &output_format)?);
    Ok(())
}

fn cmd_match(
    args: &DataArgs,
    physiological: &[(Feature, Option<f64>)],
    stress: Option<f64>,
    output_format: OutputFormat,
) -> Result<(), LensCliError> {
    let mut dashboard = Dashboard::load(&resolve_config(args)?)?;

    match stress {
        Some(value) => {
            dashboard.set_control(Feature::Stress, value);
        }
        None => {
            for &(feature, value) in physiological {
                if let Some(value) = value {
                    dashboard.set_control(feature, value);
                }
            }
        }
    }

    let found = dashboard.current_match().ok_or(LensCliError::NoMatch)?;
    let payload = MatchEncoder::new().encode(&found);

    print!("{}", format_output(&[payload], &output_format)?);
    Ok(())
}

fn cmd_replay(args: &DataArgs, flush: bool) -> Result<(), LensCliError> {
    let mut dashboard = Dashboard::load(&resolve_config(args)?)?;
    let encoder = MatchEncoder::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: ControlEvent = trimmed.parse()?;
        let found = dashboard.apply(event).ok_or(LensCliError::NoMatch)?;

        writeln!(stdout, "{}", encoder.encode_to_json(&found)?)?;
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_doctor(args: &DataArgs, json: bool) -> Result<(), LensCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "lens_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Lens version {}", LENS_VERSION),
    });

    let config = match resolve_config(args) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "reference".to_string(),
                status: CheckStatus::Ok,
                message: "Grade and duration tables complete".to_string(),
            });
            config
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "reference".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", CliError::from(e).message),
            });
            LensConfig::default()
        }
    };

    for (feature, exam) in table_keys() {
        let path = table_path(&config.data_dir, feature, exam);
        let name = format!("table_{}_{}", feature.as_str().to_lowercase(), exam.label());

        let check = if !path.exists() {
            DoctorCheck {
                name,
                status: CheckStatus::Error,
                message: format!("Missing {}", path.display()),
            }
        } else {
            match FeatureTable::load(&path) {
                Ok(table) => {
                    let missing = missing_columns(&table, feature, exam);
                    if missing.is_empty() {
                        DoctorCheck {
                            name,
                            status: CheckStatus::Ok,
                            message: format!("{} rows", table.rows.len()),
                        }
                    } else {
                        DoctorCheck {
                            name,
                            status: CheckStatus::Warning,
                            message: format!(
                                "{} rows, no column for {}",
                                table.rows.len(),
                                missing.join(", ")
                            ),
                        }
                    }
                }
                Err(e) => DoctorCheck {
                    name,
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            }
        };
        checks.push(check);
    }

    // Check stdin is available (for replay mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: LENS_VERSION.to_string(),
        data_dir: config.data_dir.display().to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Lens Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("Data:     {}", report.data_dir);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(LensCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn parse_finite(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("{s} is not a finite number")),
        Err(e) => Err(e.to_string()),
    }
}

fn missing_columns(table: &FeatureTable, feature: Feature, exam: Exam) -> Vec<String> {
    StudentId::all()
        .map(|student| feature.column_name(student, exam))
        .filter(|column| table.column_index(column).is_none())
        .collect()
}

fn format_output<T: Serialize>(
    records: &[T],
    format: &OutputFormat,
) -> Result<String, LensCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum LensCliError {
    Io(io::Error),
    Lens(LensError),
    Json(serde_json::Error),
    NoMatch,
    DoctorFailed,
}

impl From<io::Error> for LensCliError {
    fn from(e: io::Error) -> Self {
        LensCliError::Io(e)
    }
}

impl From<LensError> for LensCliError {
    fn from(e: LensError) -> Self {
        LensCliError::Lens(e)
    }
}

impl From<serde_json::Error> for LensCliError {
    fn from(e: serde_json::Error) -> Self {
        LensCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LensCliError> for CliError {
    fn from(e: LensCliError) -> Self {
        match e {
            LensCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LensCliError::Lens(e) => {
                let (code, hint) = match &e {
                    LensError::Io { .. } | LensError::MissingTable { .. } => (
                        "LOAD_ERROR",
                        "Run 'lens doctor' to check the dataset layout",
                    ),
                    LensError::Parse { .. } | LensError::MissingColumn(_) => {
                        ("PARSE_ERROR", "Check the CSV header and minute column")
                    }
                    LensError::MissingGrade { .. } | LensError::MissingField(_) => (
                        "CONFIG_ERROR",
                        "Every exam needs a duration and a grade for every student",
                    ),
                    LensError::InvalidEvent(_)
                    | LensError::NonFiniteTarget { .. }
                    | LensError::UnknownFeature(_)
                    | LensError::UnknownExam(_)
                    | LensError::UnknownStudent(_) => (
                        "INPUT_ERROR",
                        "Events look like HR=92; features are HR, EDA, BVP, TEMP, STRESS",
                    ),
                    _ => ("LENS_ERROR", "Check input and configuration"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LensCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LensCliError::NoMatch => CliError {
                code: "NO_MATCH".to_string(),
                message: "No session has averages for every queried feature".to_string(),
                hint: Some("Query a different feature set".to_string()),
            },
            LensCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct RangeRow {
    feature: Feature,
    min: i64,
    max: i64,
    initial: f64,
}

#[derive(Serialize)]
struct SessionRow {
    student: StudentId,
    exam: Exam,
    grade: i32,
    duration_minutes: u32,
    averages: PerFeature<Option<f64>>,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    data_dir: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
