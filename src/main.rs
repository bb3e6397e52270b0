use clap::Parser;
use proof_stepper::{host, Config};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Steps proof scripts through an interactive prover for an editor host.
#[derive(Parser, Debug)]
#[command(name = "proof-stepper")]
#[command(about = "Incremental proof script checking over a framed stdio protocol")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "PROOF_STEPPER_CONFIG")]
    config: Option<PathBuf>,

    /// Prover bridge command line (overrides the config file)
    #[arg(short, long)]
    prover: Option<String>,

    /// Per-sentence timeout in seconds, 0 for none
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config, proof_stepper::ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(prover) = &args.prover {
        config.prover = prover.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(log_file) = &args.log_file {
        config.log_file = Some(log_file.clone());
    }
    Ok(config)
}

/// stdout carries the protocol, so logs go to stderr or a file.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    let file = config
        .log_file
        .as_ref()
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok());

    match file {
        Some(file) => builder.with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("proof-stepper: {}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "proof-stepper started");

    match host::run_host_mode(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "proof-stepper failed");
            ExitCode::FAILURE
        }
    }
}
