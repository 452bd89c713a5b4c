//! Attune CLI - Command-line interface for the Attune governance engine
//!
//! Commands:
//! - evaluate: Run one evaluation pass over a request JSON
//! - observe: Record a user observation into the memory bank
//! - doctor: Diagnose engine state and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use attune_engine::engine::{EvaluationRequest, GovernanceEngine};
use attune_engine::memory::{MemoryKind, Observation};
use attune_engine::{EngineError, ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;

/// Attune - Personalization and nudge governance engine
#[derive(Parser)]
#[command(name = "attune")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Decide which nudges to deliver, and when to stand down", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation pass over a request JSON
    Evaluate {
        /// Input request file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Load engine state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save engine state to file after evaluating
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Record a user observation into the memory bank
    Observe {
        /// Memory kind
        #[arg(long, value_enum)]
        kind: ObservationKind,

        /// Observation content
        #[arg(long)]
        content: String,

        /// Polarity in [-1, 1]; negative means "this did not work"
        #[arg(long, default_value = "0.5")]
        polarity: f64,

        /// Load engine state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save engine state to file
        #[arg(long)]
        save_state: PathBuf,
    },

    /// Diagnose engine state and configuration
    Doctor {
        /// Check a saved state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum ObservationKind {
    StatedPreference,
    NudgeFeedback,
    PreferenceConstraint,
    DetectedPattern,
    PreferredTime,
    ProtocolEffectiveness,
}

impl From<ObservationKind> for MemoryKind {
    fn from(kind: ObservationKind) -> Self {
        match kind {
            ObservationKind::StatedPreference => MemoryKind::StatedPreference,
            ObservationKind::NudgeFeedback => MemoryKind::NudgeFeedback,
            ObservationKind::PreferenceConstraint => MemoryKind::PreferenceConstraint,
            ObservationKind::DetectedPattern => MemoryKind::DetectedPattern,
            ObservationKind::PreferredTime => MemoryKind::PreferredTime,
            ObservationKind::ProtocolEffectiveness => MemoryKind::ProtocolEffectiveness,
        }
    }
}

fn main() -> ExitCode {
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

fn run(cli: Cli) -> Result<(), AttuneCliError> {
    match cli.command {
        Commands::Evaluate {
            input,
            output_format,
            load_state,
            save_state,
        } => cmd_evaluate(
            &input,
            output_format,
            load_state.as_deref(),
            save_state.as_deref(),
        ),

        Commands::Observe {
            kind,
            content,
            polarity,
            load_state,
            save_state,
        } => cmd_observe(kind, &content, polarity, load_state.as_deref(), &save_state),

        Commands::Doctor { state, json } => cmd_doctor(state.as_deref(), json),
    }
}

fn cmd_evaluate(
    input: &Path,
    output_format: OutputFormat,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<(), AttuneCliError> {
    let input_data = read_input(input)?;
    let request: EvaluationRequest = serde_json::from_str(&input_data)?;
    request.validate()?;

    let mut engine = GovernanceEngine::new();
    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        engine.load_state(&state_json)?;
    }

    let decision = engine.evaluate(&request, Utc::now());

    if let Some(state_path) = save_state {
        fs::write(state_path, engine.save_state()?)?;
    }

    let output = match output_format {
        OutputFormat::Json => serde_json::to_string(&decision)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&decision)?,
    };
    println!("{output}");

    Ok(())
}

fn cmd_observe(
    kind: ObservationKind,
    content: &str,
    polarity: f64,
    load_state: Option<&Path>,
    save_state: &Path,
) -> Result<(), AttuneCliError> {
    let mut engine = GovernanceEngine::new();
    if let Some(state_path) = load_state {
        let state_json = fs::read_to_string(state_path)?;
        engine.load_state(&state_json)?;
    }

    engine.record_observation(Observation::new(kind.into(), content, polarity), Utc::now());
    fs::write(save_state, engine.save_state()?)?;

    println!("recorded ({} memories)", engine.memory().len());
    Ok(())
}

fn cmd_doctor(state: Option<&Path>, json: bool) -> Result<(), AttuneCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Attune version {}", ENGINE_VERSION),
    });

    if let Some(state_path) = state {
        if state_path.exists() {
            match fs::read_to_string(state_path) {
                Ok(content) => {
                    let mut engine = GovernanceEngine::new();
                    match engine.load_state(&content) {
                        Ok(()) => {
                            checks.push(DoctorCheck {
                                name: "state".to_string(),
                                status: CheckStatus::Ok,
                                message: format!(
                                    "State file valid ({} baseline samples, {} memories, MVD {})",
                                    engine.baseline_samples(),
                                    engine.memory().len(),
                                    if engine.mvd().is_active() {
                                        "active"
                                    } else {
                                        "inactive"
                                    }
                                ),
                            });
                        }
                        Err(e) => {
                            checks.push(DoctorCheck {
                                name: "state".to_string(),
                                status: CheckStatus::Error,
                                message: format!("Invalid state file: {}", e),
                            });
                        }
                    }
                }
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "state".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read state file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            });
        }
    }

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
            message: "stdin is a pipe (request streaming ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Attune Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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
        Err(AttuneCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_input(input: &Path) -> Result<String, AttuneCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

// Error types

#[derive(Debug)]
enum AttuneCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for AttuneCliError {
    fn from(e: io::Error) -> Self {
        AttuneCliError::Io(e)
    }
}

impl From<EngineError> for AttuneCliError {
    fn from(e: EngineError) -> Self {
        AttuneCliError::Engine(e)
    }
}

impl From<serde_json::Error> for AttuneCliError {
    fn from(e: serde_json::Error) -> Self {
        AttuneCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AttuneCliError> for CliError {
    fn from(e: AttuneCliError) -> Self {
        match e {
            AttuneCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AttuneCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'attune doctor --state <file>' for details".to_string()),
            },
            AttuneCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AttuneCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
