use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Largest population; its interaction matrix takes 800 MB.
pub const MAX_N_AGENTS: usize = 10_000;
/// Largest matching batch; each batch draws `batch_size^2` values.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

/// Constants of the attraction and dissolution model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Steepness of the attraction kernel.
    pub sensitivity: f64,
    /// Probability that one member keeps a relationship for one more step.
    pub survivability: f64,
    /// Target number of agents per matching batch.
    pub batch_size: usize,
}

/// Initial condition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Number of agents in the population.
    pub n_agents: usize,
    /// Distribution the beauty values are sampled from.
    pub beauty: BeautyDist,
    /// Seed of the random number generator (drawn from the OS if absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Beauty value distribution.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum BeautyDist {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps simulated per trajectory file.
    pub steps_per_file: usize,
    /// Number of steps between saved records.
    pub steps_per_save: usize,
    /// Number of beauty bins used by the analysis.
    pub hist_bins: usize,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its valid range.
    ///
    /// The population and batch bounds keep the dense interaction matrix
    /// and the per-batch draws within memory.
    pub fn validate(&self) -> Result<()> {
        check_num(self.model.sensitivity, 0.0..10.0).context("invalid sensitivity")?;
        if self.model.sensitivity == 0.0 {
            bail!("sensitivity must be positive");
        }
        check_num(self.model.survivability, 0.0..=1.0).context("invalid survivability")?;
        check_num(self.model.batch_size, 1..=MAX_BATCH_SIZE).context("invalid batch size")?;

        check_num(self.init.n_agents, 1..=MAX_N_AGENTS).context("invalid number of agents")?;
        match self.init.beauty {
            BeautyDist::Uniform { low, high } => {
                check_num(low, -1e6..1e6).context("invalid uniform lower bound")?;
                check_num(high, -1e6..1e6).context("invalid uniform upper bound")?;
                if low >= high {
                    bail!("uniform lower bound must be below upper bound");
                }
            }
            BeautyDist::Normal { mean, std_dev } => {
                check_num(mean, -1e6..1e6).context("invalid normal mean")?;
                check_num(std_dev, 0.0..1e6).context("invalid normal standard deviation")?;
            }
        }

        check_num(self.output.steps_per_file, 1..1_000_000)
            .context("invalid number of steps per file")?;
        check_num(self.output.steps_per_save, 1..=self.output.steps_per_file)
            .context("invalid number of steps per save")?;
        if self.output.steps_per_file % self.output.steps_per_save != 0 {
            bail!("steps per save must divide steps per file");
        }
        check_num(self.output.hist_bins, 1..1_000).context("invalid number of histogram bins")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
