mod classify;
mod extract;
mod lines;
mod metrics;
mod state;

use clap::Parser;
use classify::Variant;
use metrics::MetricSet;
use std::process::Command;
use std::process::ExitCode;

const DEFAULT_PUSH_GATEWAY: &str = "localhost:9091";
const DEFAULT_JOB_NAME: &str = "pyxbackup";

/// A Rust CLI tool that reads a backup run's log output on stdin,
/// extracts run timing and success facts, and publishes them as gauges
/// to a Prometheus pushgateway.
#[derive(Parser, Debug)]
#[command(name = "pyxbackup-prom-stats", version, about)]
pub struct Cli {
    /// Address of the pushgateway to publish to. If set to '-' it will
    /// print the metrics to stdout instead.
    #[arg(long, default_value = DEFAULT_PUSH_GATEWAY)]
    pushgw: String,

    /// Pushgateway job name.
    #[arg(long, default_value = DEFAULT_JOB_NAME)]
    job: String,

    /// Log grammar to parse.
    #[arg(long, value_enum, default_value = "simple")]
    variant: Variant,

    /// Value for the instance label (default: this host's FQDN).
    #[arg(long)]
    instance: Option<String>,

    /// Print some information to stderr.
    #[arg(short, long)]
    verbose: bool,
}

/// Errors that end the run with a nonzero exit.
#[derive(Debug)]
enum RunError {
    Extract(extract::ExtractError),
    Metrics(metrics::MetricsError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Extract(e) => write!(f, "{e}"),
            RunError::Metrics(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Extract(e) => Some(e),
            RunError::Metrics(e) => Some(e),
        }
    }
}

impl From<extract::ExtractError> for RunError {
    fn from(e: extract::ExtractError) -> Self {
        RunError::Extract(e)
    }
}

impl From<metrics::MetricsError> for RunError {
    fn from(e: metrics::MetricsError) -> Self {
        RunError::Metrics(e)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(&cli) {
        tracing::error!(error = %e, "aborting");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let instance = match &cli.instance {
        Some(host) => host.clone(),
        None => detect_fqdn(),
    };
    let metrics = MetricSet::new(cli.variant, &instance)?;
    tracing::info!(%instance, variant = ?cli.variant, "started");

    let stdin = std::io::stdin();
    let facts = extract::extract_facts(stdin.lock(), cli.variant)?;
    tracing::info!("finished reading output");

    metrics.record(&facts);
    if cli.pushgw == "-" {
        print!("{}", metrics.render()?);
    } else {
        tracing::info!(pushgw = %cli.pushgw, "publishing to pushgateway");
        metrics.push(&cli.pushgw, &cli.job)?;
    }
    Ok(())
}

/// Reporting-host FQDN for the instance label, via the hostname utility.
/// Falls back to the short name, then to "localhost".
fn detect_fqdn() -> String {
    for args in [&["-f"][..], &[][..]] {
        let output = match Command::new("hostname").args(args).output() {
            Ok(output) if output.status.success() => output,
            _ => continue,
        };
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !name.is_empty() {
            return name;
        }
    }
    "localhost".to_string()
}
