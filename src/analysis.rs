use crate::config::Config;
use crate::model::Agent;
use crate::state::Record;
use crate::stats::{Accumulator, AccumulatorReport, TimeSeries};
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

/// Number of active relationships over time.
pub struct NPairs {
    time_series: TimeSeries,
}

impl NPairs {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for NPairs {
    fn name(&self) -> &'static str {
        "n_pairs"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        self.time_series.push(record.snapshot.n_pairs as f64);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        Ok(serde_value::to_value(self.time_series.report())?)
    }
}

/// Fraction of the population in a relationship.
pub struct FracPaired {
    acc: Accumulator,
}

impl FracPaired {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FracPaired {
    fn name(&self) -> &'static str {
        "frac_paired"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        let n_agents = record.snapshot.paired.len();
        if n_agents == 0 {
            bail!("record has an empty population");
        }
        let n_paired = 2 * record.snapshot.n_pairs;
        self.acc.add(n_paired as f64 / n_agents as f64);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        Ok(serde_value::to_value(self.acc.report())?)
    }
}

/// Probability of being paired as a function of beauty.
///
/// Agents are assigned to equal-width beauty bins spanning the population's range.
pub struct ProbPairedByBeauty {
    low: f64,
    width: f64,
    i_bin_vec: Vec<usize>,
    n_agents_vec: Vec<usize>,
    acc_vec: Vec<Accumulator>,
}

#[derive(Serialize)]
struct BinReport {
    low: f64,
    high: f64,
    n_agents: usize,
    prob_paired: AccumulatorReport,
}

impl ProbPairedByBeauty {
    pub fn new(agt_vec: &[Agent], n_bins: usize) -> Self {
        let low = agt_vec
            .iter()
            .map(Agent::beauty)
            .fold(f64::INFINITY, f64::min);
        let high = agt_vec
            .iter()
            .map(Agent::beauty)
            .fold(f64::NEG_INFINITY, f64::max);
        let width = if high > low {
            (high - low) / n_bins as f64
        } else {
            1.0
        };

        let mut n_agents_vec = vec![0; n_bins];
        let i_bin_vec = agt_vec
            .iter()
            .map(|agt| {
                let i_bin = ((agt.beauty() - low) / width) as usize;
                let i_bin = i_bin.min(n_bins - 1);
                n_agents_vec[i_bin] += 1;
                i_bin
            })
            .collect();

        Self {
            low,
            width,
            i_bin_vec,
            n_agents_vec,
            acc_vec: vec![Accumulator::new(); n_bins],
        }
    }
}

impl Obs for ProbPairedByBeauty {
    fn name(&self) -> &'static str {
        "prob_paired_by_beauty"
    }

    fn update(&mut self, record: &Record) -> Result<()> {
        let paired = &record.snapshot.paired;
        if paired.len() != self.i_bin_vec.len() {
            bail!(
                "record has {} agents, but the population has {}",
                paired.len(),
                self.i_bin_vec.len()
            );
        }

        let mut n_paired_vec = vec![0; self.acc_vec.len()];
        for (&i_bin, &agt_paired) in self.i_bin_vec.iter().zip(paired) {
            if agt_paired {
                n_paired_vec[i_bin] += 1;
            }
        }

        for (i_bin, acc) in self.acc_vec.iter_mut().enumerate() {
            let n_agents = self.n_agents_vec[i_bin];
            if n_agents > 0 {
                acc.add(n_paired_vec[i_bin] as f64 / n_agents as f64);
            }
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        let reports: Vec<_> = self
            .acc_vec
            .iter()
            .enumerate()
            .map(|(i_bin, acc)| BinReport {
                low: self.low + i_bin as f64 * self.width,
                high: self.low + (i_bin + 1) as f64 * self.width,
                n_agents: self.n_agents_vec[i_bin],
                prob_paired: acc.report(),
            })
            .collect();
        Ok(serde_value::to_value(reports)?)
    }
}

pub struct Analyzer {
    saves_per_file: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config, agt_vec: &[Agent]) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(NPairs::new()),
            Box::new(FracPaired::new()),
            Box::new(ProbPairedByBeauty::new(agt_vec, cfg.output.hist_bins)),
        ];
        Self {
            saves_per_file: cfg.output.steps_per_file / cfg.output.steps_per_save,
            obs_ptr_vec,
        }
    }

    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record)
                .with_context(|| format!("failed to update {}", obs.name()))?;
        }
        Ok(())
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.saves_per_file {
            let record: Record =
                decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(&record)?;
        }
        Ok(())
    }

    pub fn results(&self) -> Result<BTreeMap<&'static str, Value>> {
        self.obs_ptr_vec
            .iter()
            .map(|obs| {
                let report = obs
                    .report()
                    .with_context(|| format!("failed to report {}", obs.name()))?;
                Ok((obs.name(), report))
            })
            .collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let results = self.results()?;

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, &results).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
