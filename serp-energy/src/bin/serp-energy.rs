use anyhow::Context;
use clap::Parser;
use serp_energy::config::BUFFER_ENV;
use serp_energy::{Config, Pipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "serp-energy",
    version,
    about = "Attribute power-log energy to search-engine sessions and compare engines"
)]
struct Cli {
    /// Session timestamps table
    #[arg(long)]
    sessions: Option<PathBuf>,
    /// Power log written by the energy logger
    #[arg(long)]
    samples: Option<PathBuf>,
    /// Directory for the result tables
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Widening of every session window, in milliseconds
    #[arg(long, env = BUFFER_ENV)]
    buffer_ms: Option<f64>,
    /// |z| threshold for outlier removal before the normality retest
    #[arg(long)]
    outlier_z: Option<f64>,
    /// Significance level
    #[arg(long)]
    alpha: Option<f64>,
    /// Skip writing per-sample power traces
    #[arg(long)]
    no_samples: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    // clap already read ENERGY_BUFFER_MS; only the legacy variable is left
    if cli.buffer_ms.is_none() {
        config = config.with_env_overrides()?;
    }

    if let Some(path) = &cli.sessions {
        config.paths.sessions = path.clone();
    }
    if let Some(path) = &cli.samples {
        config.paths.samples = path.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths = config.paths.with_output_dir(dir);
    }
    if let Some(buffer) = cli.buffer_ms {
        config.analysis.buffer_ms = buffer;
    }
    if let Some(z) = cli.outlier_z {
        config.analysis.statistics.outlier_z_threshold = z;
    }
    if let Some(alpha) = cli.alpha {
        config.analysis.statistics.alpha = alpha;
    }
    if cli.no_samples {
        config.analysis.export_samples = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    let pipeline = Pipeline::new(config)?;
    let output = pipeline.run().context("energy analysis failed")?;
    tracing::info!(
        "Processed {} sessions for {} engines",
        output.intervals.len(),
        output.summaries.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
