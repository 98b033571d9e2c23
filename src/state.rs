//! Pairing state of the population.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Availability tracker and relationship register.
///
/// Every agent is either single or a member of exactly one active pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    single: Vec<bool>,
    pairs: Vec<(usize, usize)>,
}

impl Tracker {
    pub fn new(n_agents: usize) -> Self {
        Self {
            single: vec![true; n_agents],
            pairs: Vec::new(),
        }
    }

    pub fn n_agents(&self) -> usize {
        self.single.len()
    }

    pub fn is_single(&self, id: usize) -> bool {
        self.single[id]
    }

    /// Ids of all single agents, in ascending order.
    pub fn singles(&self) -> Vec<usize> {
        self.single
            .iter()
            .enumerate()
            .filter_map(|(id, &single)| single.then_some(id))
            .collect()
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn n_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Register a new relationship between two single agents.
    pub fn pair(&mut self, a: usize, b: usize) {
        debug_assert!(a != b && self.single[a] && self.single[b]);
        self.single[a] = false;
        self.single[b] = false;
        self.pairs.push((a, b));
    }

    /// Keep only the pairs for which `survives` returns true,
    /// returning members of the other pairs to the single set.
    ///
    /// Pairs are visited in register order.
    pub fn retain_pairs<F>(&mut self, mut survives: F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        let single = &mut self.single;
        self.pairs.retain(|&(a, b)| {
            if survives(a, b) {
                return true;
            }
            single[a] = true;
            single[b] = true;
            false
        });
    }

    /// Check that the single set and the pair members partition the population.
    pub fn check_consistency(&self) -> Result<()> {
        let mut member = vec![false; self.single.len()];
        for &(a, b) in &self.pairs {
            if a == b {
                bail!("agent {a} is paired with itself");
            }
            for id in [a, b] {
                if id >= member.len() {
                    bail!("pair member {id} is out of range");
                }
                if member[id] {
                    bail!("agent {id} appears in two pairs");
                }
                member[id] = true;
            }
        }
        for (id, (&single, &member)) in self.single.iter().zip(member.iter()).enumerate() {
            if single == member {
                bail!("agent {id} must be either single or paired");
            }
        }
        Ok(())
    }
}

/// State of the population at the end of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of active relationships.
    pub n_pairs: usize,
    /// Paired status of every agent.
    pub paired: Vec<bool>,
}

/// Record of the simulation at a saved step.
#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    /// Number of steps completed since the start of the run.
    pub step: usize,

    pub snapshot: Snapshot,
}
