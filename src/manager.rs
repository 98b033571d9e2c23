use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Manager of a simulation directory.
///
/// The directory holds a `config.toml` file and one `run-XXXX` directory
/// per independent run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Start a new run and simulate its first trajectory file.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.next_run_idx().context("failed to find next run index")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let engine = Engine::generate_initial_condition(self.cfg.clone())
            .context("failed to generate initial condition")?;

        self.simulate(run_idx, 0, engine)
    }

    /// Continue an existing run from its checkpoint.
    pub fn resume_run(&self, run_idx: usize) -> Result<()> {
        let file_idx = self
            .count_trajectory_files(run_idx)
            .context("failed to count trajectory files")?;

        let engine = self.load_engine(run_idx)?;

        self.simulate(run_idx, file_idx, engine)
    }

    /// Analyze every run and save its results.
    pub fn analyze_sim(&self) -> Result<()> {
        let run_idxs = self.run_idxs().context("failed to list run dirs")?;
        for run_idx in run_idxs {
            let engine = self.load_engine(run_idx)?;
            let mut analyzer = Analyzer::new(&self.cfg, engine.agents());

            let n_files = self
                .count_trajectory_files(run_idx)
                .context("failed to count trajectory files")?;
            for file_idx in 0..n_files {
                analyzer
                    .add_file(self.trajectory_file(run_idx, file_idx))
                    .context("failed to add file")?;
            }

            let results_file = self.results_file(run_idx);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("saved {results_file:?}");
        }

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn simulate(&self, run_idx: usize, file_idx: usize, mut engine: Engine) -> Result<()> {
        engine
            .run_simulation(self.trajectory_file(run_idx, file_idx))
            .context("failed to run simulation")?;

        engine
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        Ok(())
    }

    fn load_engine(&self, run_idx: usize) -> Result<Engine> {
        let checkpoint_file = self.checkpoint_file(run_idx);
        let engine = Engine::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;
        if engine.cfg() != &self.cfg {
            bail!("checkpoint config differs from the current config");
        }
        log::info!("loaded {checkpoint_file:?}");
        Ok(engine)
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    /// Indices of the existing run directories, in ascending order.
    fn run_idxs(&self) -> Result<Vec<usize>> {
        let mut run_idxs = Vec::new();
        for run_dir in self.run_dirs()? {
            let run_idx = run_dir
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("run-"))
                .and_then(|idx| idx.parse::<usize>().ok());
            match run_idx {
                Some(run_idx) => run_idxs.push(run_idx),
                None => log::warn!("skipping {run_dir:?}"),
            }
        }
        run_idxs.sort_unstable();
        Ok(run_idxs)
    }

    /// One past the largest existing run index, so gaps are never reused.
    fn next_run_idx(&self) -> Result<usize> {
        Ok(self.run_idxs()?.last().map_or(0, |&run_idx| run_idx + 1))
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn count_trajectory_files(&self, run_idx: usize) -> Result<usize> {
        let pattern = self.run_dir(run_idx).join("trajectory-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob trajectory files")?
            .filter_map(Result::ok)
            .count();
        Ok(count)
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn trajectory_file(&self, run_idx: usize, file_idx: usize) -> PathBuf {
        self.run_dir(run_idx)
            .join(format!("trajectory-{file_idx:04}.msgpack"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}
