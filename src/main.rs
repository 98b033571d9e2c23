use amare::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Simulation directory containing `config.toml`.
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a new run.
    Create,

    /// Continue an existing run from its checkpoint.
    Resume {
        #[arg(long)]
        run_idx: usize,
    },

    /// Analyze every run.
    Analyze,

    /// Remove every run.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create => mgr.create_run().context("failed to create run")?,
        Command::Resume { run_idx } => mgr
            .resume_run(run_idx)
            .with_context(|| format!("failed to resume run {run_idx}"))?,
        Command::Analyze => mgr.analyze_sim().context("failed to analyze simulation")?,
        Command::Clean => mgr.clean_sim().context("failed to clean simulation")?,
    }

    Ok(())
}
