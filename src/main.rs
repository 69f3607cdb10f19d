use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use predation::manager::Manager;
use std::{path::PathBuf, process::ExitCode};

/// Predator-prey agent-based simulations on a toroidal grid.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Simulation directory holding `config.toml` and the runs.
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start new runs, each writing its first trajectory file.
    Create {
        #[arg(long, default_value_t = 1)]
        n_runs: usize,
    },

    /// Continue a run from its checkpoint.
    Resume {
        #[arg(long)]
        run_idx: usize,

        /// Trajectory files to append, fewer if the run ends first.
        #[arg(long, default_value_t = 1)]
        n_files: usize,
    },

    /// Write the results file of every run.
    Analyze,

    /// Remove every run.
    Clean,
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    match run_cli(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(args: Cli) -> Result<()> {
    log::info!("{args:?}");

    let mgr = Manager::new(&args.sim_dir)
        .with_context(|| format!("failed to open simulation {:?}", args.sim_dir))?;

    match args.command {
        Command::Create { n_runs } => {
            for _ in 0..n_runs {
                mgr.create_run().context("failed to create run")?;
            }
        }
        Command::Resume { run_idx, n_files } => mgr
            .resume_run(run_idx, n_files)
            .with_context(|| format!("failed to resume run {run_idx}"))?,
        Command::Analyze => mgr.analyze_sim().context("failed to analyze runs")?,
        Command::Clean => mgr.clean_sim().context("failed to clean runs")?,
    }

    Ok(())
}
