//! survgov - governance command line for surveillance pipelines.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use surveillance_governance::audit::AuditError;
use surveillance_governance::config::{ConfigError, ConfigLoader};
use surveillance_governance::tokens::TokenStoreError;
use surveillance_governance::Governance;

/// Exit code when guardrail checks report violations.
const EXIT_VIOLATIONS: u8 = 2;

#[derive(Parser)]
#[command(
    name = "survgov",
    about = "Audit, redaction and guardrails for surveillance data pipelines",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append an event to the audit log.
    Audit {
        /// Event name.
        event: String,
        /// Event details as a JSON object.
        #[arg(long, default_value = "{}")]
        details: String,
    },
    /// Append a decision (JSON object) to the decision ledger.
    Decide {
        decision: String,
    },
    /// Print a record (JSON object) with sensitive fields scrubbed.
    Scrub {
        record: String,
    },
    /// Run guardrail checks on a metrics record (JSON object).
    Check {
        metrics: String,
    },
    /// Print the stable token for a field value.
    Tokenize {
        field: String,
        value: String,
    },
    /// Print the original value behind a token.
    Detokenize {
        field: String,
        token: String,
    },
    /// List rotated audit log archives.
    Archives,
    /// Print the effective configuration.
    Config,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid JSON for {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),

    #[error(transparent)]
    Tokens(#[from] TokenStoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn parse_value(what: &'static str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|source| CliError::Json { what, source })
}

fn parse_object(what: &'static str, raw: &str) -> Result<Map<String, Value>, CliError> {
    match parse_value(what, raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject(what)),
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let loader = match cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load_with_env()?;

    // Opened on first use; `survgov config` never touches stores or S3.
    let cell = OnceCell::new();
    let governance = || cell.get_or_init(|| Governance::open(&config));

    match cli.command {
        Commands::Audit { event, details } => {
            let details = parse_value("details", &details)?;
            let gov = governance().await;
            if !gov.is_enabled() {
                tracing::warn!("Governance disabled, event not recorded");
            }
            gov.audit(&event, details).await;
        }
        Commands::Decide { decision } => {
            let decision = parse_value("decision", &decision)?;
            let gov = governance().await;
            if !gov.is_enabled() {
                tracing::warn!("Governance disabled, decision not recorded");
            }
            gov.record_decision(decision).await;
        }
        Commands::Scrub { record } => {
            let record = parse_object("record", &record)?;
            let scrubbed = governance().await.scrub_record(&record).await;
            println!("{}", serde_json::to_string(&scrubbed)?);
        }
        Commands::Check { metrics } => {
            let metrics = parse_object("metrics", &metrics)?;
            let violations = governance().await.guardrail_check(&metrics);
            for violation in &violations {
                println!("{violation}");
            }
            if !violations.is_empty() {
                return Ok(ExitCode::from(EXIT_VIOLATIONS));
            }
        }
        Commands::Tokenize { field, value } => {
            println!("{}", governance().await.tokenize(&field, &value).await?);
        }
        Commands::Detokenize { field, token } => {
            match governance().await.detokenize(&field, &token).await {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("token not found");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Archives => {
            for archive in governance().await.audit_log().archives().await? {
                println!("{}", archive.display());
            }
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
