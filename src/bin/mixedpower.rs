//! mixedpower CLI - power analysis for group-nested experiments from pilot data.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mixedpower::data::{load_algoinst_csv, load_session_log_csv};
use mixedpower::output::{format_report, to_json_pretty, write_summary};
use mixedpower::{Config, PowerAnalysis, DEFAULT_SESSION};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "mixedpower")]
#[command(version)]
#[command(about = "Simulation-based power analysis for experiments with participants nested in groups")]
struct Cli {
    /// Pilot data in algoinst format (first pilot)
    #[arg(long)]
    pilot: PathBuf,

    /// Pilot data in session-log format (second pilot)
    #[arg(long)]
    session_log: Option<PathBuf>,

    /// Sessions kept from the session log (repeatable)
    #[arg(long = "session", default_value = DEFAULT_SESSION)]
    sessions: Vec<String>,

    /// Groups sampled per condition
    #[arg(long, default_value = "60")]
    sample_groups: usize,

    /// Number of simulated experiments
    #[arg(long, default_value = "1000")]
    experiments: usize,

    /// Use the second pilot's variance for condition 1
    #[arg(long)]
    consider_new_pilot_data: bool,

    /// Path of the summary table
    #[arg(short, long, default_value = "data/stats.csv")]
    output: PathBuf,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Significance level
    #[arg(long, default_value = "0.05")]
    alpha: f64,

    /// Hypothesized difference between condition means
    #[arg(long, default_value = "2.0")]
    mean_diff: f64,

    /// Participants per simulated group
    #[arg(long, default_value = "4")]
    group_size: usize,

    /// Show a progress bar while fitting
    #[arg(long)]
    progress: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new()
            .with_alpha(self.alpha)
            .with_mean_diff(self.mean_diff)
            .with_group_size(self.group_size)
            .with_groups_per_condition(self.sample_groups)
            .with_experiments(self.experiments)
            .with_new_pilot(self.consider_new_pilot_data)
            .with_sessions(self.sessions.iter().cloned())
            .with_progress(self.progress);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let analysis = PowerAnalysis::new(cli.config()).context("Invalid run configuration")?;
    let config = analysis.config();

    let old_pilot = load_algoinst_csv(&cli.pilot, &config.experiment_name)
        .with_context(|| format!("Failed to load pilot data from {:?}", cli.pilot))?;
    info!(rows = old_pilot.len(), groups = old_pilot.n_groups(), "loaded first pilot");

    let new_pilot = match &cli.session_log {
        Some(path) => {
            let data = load_session_log_csv(path, &config.sessions)
                .with_context(|| format!("Failed to load session log from {path:?}"))?;
            info!(rows = data.len(), groups = data.n_groups(), "loaded second pilot");
            Some(data)
        }
        None => None,
    };

    let report = analysis
        .run_pilots(&old_pilot, new_pilot.as_ref())
        .context("Power analysis failed")?;

    write_summary(&report, &cli.output)
        .with_context(|| format!("Failed to write summary to {:?}", cli.output))?;
    info!(path = ?cli.output, "wrote summary table");

    if cli.json {
        println!("{}", to_json_pretty(&report).context("Failed to serialize report")?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}
