//! Sentinel CLI - submit machine readings for prediction and commit the
//! resulting diagnosis to the ledger.
//!
//! ```text
//! sentinel predict [reading flags] [--commit] [--yes]
//! sentinel records
//! ```
//!
//! Stdout carries operator output only. Logs go to
//! `~/.sentinel/logs/sentinel.log` (fallback `./.sentinel/logs/sentinel.log`).

mod prompt;
mod render;
mod setup;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use sentinel_config::SentinelConfig;
use sentinel_types::{MachineId, MachineType, Reading};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Predictive-maintenance diagnosis and ledger commits", long_about = None)]
struct Cli {
    /// Config file (default: ~/.sentinel/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a prediction for one reading, optionally committing the diagnosis
    Predict(PredictArgs),
    /// List every diagnosis committed to the ledger
    Records,
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long, default_value = "MACH-001")]
    machine_id: String,

    /// Air temperature (K)
    #[arg(long, default_value_t = 300.0)]
    air_temp: f64,

    /// Process temperature (K)
    #[arg(long, default_value_t = 310.0)]
    process_temp: f64,

    /// Torque (Nm)
    #[arg(long, default_value_t = 40.0)]
    torque: f64,

    /// Tool wear (min)
    #[arg(long, default_value_t = 100.0)]
    tool_wear: f64,

    /// Rotational speed (RPM)
    #[arg(long, default_value_t = 1500)]
    rotational_speed: i64,

    /// High Performance, Low Power or Medium Duty (or H, L, M)
    #[arg(long, default_value = "High Performance", value_parser = MachineType::parse)]
    machine_type: MachineType,

    /// Commit the diagnosis to the ledger after a successful prediction
    #[arg(long)]
    commit: bool,

    /// Approve the signing request without prompting
    #[arg(long)]
    yes: bool,
}

impl PredictArgs {
    fn reading(&self) -> Result<Reading> {
        let machine_id = MachineId::new(self.machine_id.clone())?;
        Ok(Reading::new(machine_id, self.machine_type)
            .with_temperatures(self.air_temp, self.process_temp)
            .with_torque(self.torque)
            .with_tool_wear(self.tool_wear)
            .with_rotational_speed(self.rotational_speed))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than mixing logs into operator output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_path) = SentinelConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("sentinel.log"));
    }

    candidates.push(PathBuf::from(".sentinel").join("logs").join("sentinel.log"));

    candidates
}

fn load_config(path: Option<&PathBuf>) -> Result<SentinelConfig> {
    let loaded = match path {
        Some(path) => SentinelConfig::load_from(path),
        None => SentinelConfig::load(),
    }
    .inspect_err(|e| tracing::error!(path = %e.path().display(), "Failed to load config"))?;

    let loaded = match (loaded, path) {
        (Some(config), _) => config,
        (None, Some(path)) => {
            bail!("config file {} does not exist", path.display())
        }
        (None, None) => SentinelConfig::default(),
    };
    Ok(loaded.with_env_overrides())
}

async fn run_predict(config: &SentinelConfig, args: &PredictArgs) -> Result<()> {
    let reading = args.reading()?;
    let (mut session, mut progress) = setup::session(config, args.yes)?;

    let ticket = session.predict(&reading).await?;
    if let Some(diagnosis) = session.diagnosis() {
        print!("{}", render::diagnosis(diagnosis, session.recommendations()));
    }

    if !args.commit {
        return Ok(());
    }

    println!();
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            println!("{event}");
        }
    });

    let result = session.commit(ticket).await;
    // Closing the session closes the progress channel so the printer drains and exits.
    drop(session);
    let _ = printer.await;

    let receipt = result?;
    tracing::info!(tx_hash = %receipt.tx_hash, index = receipt.index, "Diagnosis committed");
    Ok(())
}

async fn run_records(config: &SentinelConfig) -> Result<()> {
    let records = setup::record_reader(config)?.fetch_all().await?;
    print!("{}", render::records(&records));
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    match &cli.command {
        Command::Predict(args) => run_predict(&config, args).await,
        Command::Records => run_records(&config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Command failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use sentinel_types::MachineType;

    use super::{Cli, Command};

    #[test]
    fn predict_defaults() {
        let cli = Cli::try_parse_from(["sentinel", "predict"]).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        let reading = args.reading().unwrap();
        assert_eq!(reading.machine_id().as_str(), "MACH-001");
        assert_eq!(reading.machine_type(), MachineType::HighPerformance);
        assert_eq!(reading.rotational_speed(), 1500);
        assert!(!args.commit);
    }

    #[test]
    fn predict_flags() {
        let cli = Cli::try_parse_from([
            "sentinel",
            "predict",
            "--machine-id",
            "LATHE-9",
            "--torque",
            "61.5",
            "--machine-type",
            "l",
            "--commit",
            "--yes",
            "--config",
            "/tmp/sentinel.toml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/sentinel.toml")));
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        let reading = args.reading().unwrap();
        assert_eq!(reading.machine_id().as_str(), "LATHE-9");
        assert_eq!(reading.machine_type(), MachineType::LowPower);
        assert!((reading.torque() - 61.5).abs() < f64::EPSILON);
        assert!(args.commit && args.yes);
    }

    #[test]
    fn blank_machine_id_is_rejected() {
        let cli = Cli::try_parse_from(["sentinel", "predict", "--machine-id", "  "]).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert!(args.reading().is_err());
    }

    #[test]
    fn unknown_machine_type_is_a_usage_error() {
        assert!(Cli::try_parse_from(["sentinel", "predict", "--machine-type", "turbo"]).is_err());
    }
}
