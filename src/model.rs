//! Attraction model and population data types.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Beauty difference at which the attraction probability reaches one.
const BEAUTY_SPAN: f64 = 9.0;

/// Pairwise attraction kernel.
///
/// Holds the sensitivity and the matching normalization constant
/// `exp(-BEAUTY_SPAN * sensitivity)`.
#[derive(Debug, Clone, Copy)]
pub struct Attraction {
    sensitivity: f64,
    norm: f64,
}

impl Attraction {
    pub fn new(sensitivity: f64) -> Self {
        Self {
            sensitivity,
            norm: (-BEAUTY_SPAN * sensitivity).exp(),
        }
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Probability that an agent of beauty `beauty_self` is interested in
    /// an agent of beauty `beauty_other`.
    ///
    /// Not clamped: extreme beauty spreads may underflow to zero or exceed one.
    pub fn kernel(&self, beauty_self: f64, beauty_other: f64) -> f64 {
        ((beauty_other - beauty_self) * self.sensitivity).exp() * self.norm
    }
}

/// Agent of the simulation.
///
/// The identifier is the agent's index in the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: usize,
    beauty: f64,
    paired: bool,
}

impl Agent {
    pub fn new(id: usize, beauty: f64) -> Self {
        Self {
            id,
            beauty,
            paired: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn beauty(&self) -> f64 {
        self.beauty
    }

    pub fn paired(&self) -> bool {
        self.paired
    }

    pub fn set_paired(&mut self, paired: bool) {
        self.paired = paired;
    }
}

/// Build a population of `n_agents` agents, calling `sample` once per agent.
///
/// # Errors
/// Fails if the population is empty, if the sampler fails,
/// or if it returns a non-finite value.
pub fn generate_agents<F>(n_agents: usize, mut sample: F) -> Result<Vec<Agent>>
where
    F: FnMut() -> Result<f64>,
{
    if n_agents == 0 {
        bail!("population size must be positive");
    }

    let mut agt_vec = Vec::with_capacity(n_agents);
    for id in 0..n_agents {
        let beauty = sample().with_context(|| format!("failed to sample beauty of agent {id}"))?;
        if !beauty.is_finite() {
            bail!("beauty of agent {id} must be finite, but is {beauty}");
        }
        agt_vec.push(Agent::new(id, beauty));
    }
    Ok(agt_vec)
}

/// Dense table of directional attraction probabilities.
///
/// Entry `(i, j)` is the probability that agent `i` is interested in agent `j`.
/// Stored row-major; the diagonal is zero and never read.
#[derive(Debug, Default, Clone)]
pub struct InteractionMatrix {
    n_agents: usize,
    probs: Vec<f64>,
}

impl InteractionMatrix {
    pub fn build(agt_vec: &[Agent], attraction: &Attraction) -> Self {
        let n_agents = agt_vec.len();
        let mut probs = vec![0.0; n_agents * n_agents];
        for (i, agt_i) in agt_vec.iter().enumerate() {
            for (j, agt_j) in agt_vec.iter().enumerate() {
                if i == j {
                    continue;
                }
                probs[i * n_agents + j] = attraction.kernel(agt_i.beauty(), agt_j.beauty());
            }
        }
        Self { n_agents, probs }
    }

    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.n_agents && j < self.n_agents);
        self.probs[i * self.n_agents + j]
    }
}
