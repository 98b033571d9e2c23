use crate::config::{BeautyDist, Config};
use crate::dissolution::dissolve;
use crate::matching::{match_batch, partition};
use crate::model::{Agent, Attraction, InteractionMatrix, generate_agents};
use crate::state::{Record, Snapshot, Tracker};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Normal, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, the population, its pairing state and the random
/// number generator, and provides methods to initialize, run, save, and load
/// simulations.
///
/// The interaction matrix and the in-memory snapshot log are not part of a
/// checkpoint; the matrix is rebuilt when a checkpoint is loaded.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    agt_vec: Vec<Agent>,
    tracker: Tracker,
    rng: ChaCha12Rng,
    step: usize,

    #[serde(skip)]
    matrix: InteractionMatrix,
    #[serde(skip)]
    history: Vec<Snapshot>,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    ///
    /// Beauty values are drawn from the configured distribution.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let n_agents = cfg.init.n_agents;
        let agt_vec = match cfg.init.beauty {
            BeautyDist::Uniform { low, high } => {
                let beauty_dist = Uniform::new(low, high)?;
                generate_agents(n_agents, || Ok(beauty_dist.sample(&mut rng)))?
            }
            BeautyDist::Normal { mean, std_dev } => {
                let beauty_dist = Normal::new(mean, std_dev)?;
                generate_agents(n_agents, || Ok(beauty_dist.sample(&mut rng)))?
            }
        };

        Ok(Self::from_agents(cfg, agt_vec, rng))
    }

    /// Create a new `Engine` whose beauty values come from `sample`,
    /// called exactly once per agent.
    pub fn with_sampler<F>(cfg: Config, rng: ChaCha12Rng, sample: F) -> Result<Self>
    where
        F: FnMut() -> Result<f64>,
    {
        cfg.validate().context("failed to validate config")?;

        let agt_vec =
            generate_agents(cfg.init.n_agents, sample).context("failed to generate agents")?;
        Ok(Self::from_agents(cfg, agt_vec, rng))
    }

    fn from_agents(cfg: Config, agt_vec: Vec<Agent>, rng: ChaCha12Rng) -> Self {
        log::info!("constructed population of {} agents", agt_vec.len());

        let matrix = build_matrix(&cfg, &agt_vec);
        let tracker = Tracker::new(agt_vec.len());

        Self {
            cfg,
            agt_vec,
            tracker,
            rng,
            step: 0,
            matrix,
            history: Vec::new(),
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Number of steps completed since the start of the run.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Snapshots of the steps performed by this engine instance, indexed by step.
    pub fn history(&self) -> &[Snapshot] {
        &self.history
    }

    /// Perform `n_steps` steps, appending one snapshot per step to the history.
    pub fn run(&mut self, n_steps: usize) {
        for _ in 0..n_steps {
            self.perform_step();
        }
    }

    /// Perform one step and append its snapshot to the history.
    pub fn perform_step(&mut self) {
        let snapshot = self.advance();
        self.history.push(snapshot);
    }

    /// Perform the simulation and save the resulting records to a binary file.
    ///
    /// Records are written every `steps_per_save` steps and are not added
    /// to the in-memory history.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let steps_per_save = self.cfg.output.steps_per_save;
        let saves_per_file = self.cfg.output.steps_per_file / steps_per_save;

        for i_save in 0..saves_per_file {
            for _ in 1..steps_per_save {
                self.advance();
            }
            let snapshot = self.advance();

            let record = Record {
                step: self.step,
                snapshot,
            };
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * (i_save + 1) as f64 / saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint and rebuild its interaction matrix.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let mut engine: Engine =
            decode::from_read(&mut reader).context("failed to deserialize engine")?;

        engine
            .cfg
            .validate()
            .context("checkpoint config is invalid")?;
        if engine.tracker.n_agents() != engine.agt_vec.len() {
            bail!("checkpoint tracker and population sizes differ");
        }
        for (i_agt, agt) in engine.agt_vec.iter().enumerate() {
            if agt.id() != i_agt {
                bail!("agent at index {i_agt} has id {}", agt.id());
            }
        }
        engine
            .tracker
            .check_consistency()
            .context("checkpoint pairing state is inconsistent")?;
        engine.matrix = build_matrix(&engine.cfg, &engine.agt_vec);

        Ok(engine)
    }

    fn advance(&mut self) -> Snapshot {
        // Shuffle the singles; the shuffled order is the matching priority.
        let mut singles = self.tracker.singles();
        singles.shuffle(&mut self.rng);

        let mut n_formed = 0;
        for batch in partition(&singles, self.cfg.model.batch_size) {
            let new_pairs = match_batch(batch, &self.matrix, &mut self.rng);
            n_formed += new_pairs.len();
            for (a, b) in new_pairs {
                self.tracker.pair(a, b);
            }
        }

        let n_dissolved = dissolve(
            &mut self.tracker,
            self.cfg.model.survivability,
            &mut self.rng,
        );

        for agt in &mut self.agt_vec {
            agt.set_paired(!self.tracker.is_single(agt.id()));
        }
        debug_assert!(self.tracker.check_consistency().is_ok());

        self.step += 1;
        log::debug!(
            "step {}: {n_formed} formed, {n_dissolved} dissolved, {} active",
            self.step,
            self.tracker.n_pairs()
        );

        Snapshot {
            n_pairs: self.tracker.n_pairs(),
            paired: self.agt_vec.iter().map(Agent::paired).collect(),
        }
    }
}

fn build_matrix(cfg: &Config, agt_vec: &[Agent]) -> InteractionMatrix {
    let attraction = Attraction::new(cfg.model.sensitivity);
    let matrix = InteractionMatrix::build(agt_vec, &attraction);
    log::info!("built {0}x{0} interaction matrix", matrix.n_agents());
    matrix
}
