use crate::agent::Kind;
use crate::config::Config;
use crate::engine::Frame;
use crate::model::Cause;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::Path,
};

/// Observable computed from trajectory frames.
pub trait Obs {
    fn update(&mut self, frame: &Frame) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Population sizes over time.
pub struct Population {
    predators: TimeSeries,
    prey: TimeSeries,
    grass_grown: Option<TimeSeries>,
}

impl Population {
    pub fn new(cfg: &Config) -> Self {
        Self {
            predators: TimeSeries::new(),
            prey: TimeSeries::new(),
            grass_grown: cfg.model.grass.enabled.then(TimeSeries::new),
        }
    }
}

impl Obs for Population {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        for snapshot in &frame.history.snapshots {
            self.predators.push(snapshot.n_predators as f64);
            self.prey.push(snapshot.n_prey as f64);
            if let Some(grass_grown) = &mut self.grass_grown {
                grass_grown.push(snapshot.n_grass_grown as f64);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "population": {
                "predators": self.predators.report(),
                "prey": self.prey.report(),
                "grass_grown": self.grass_grown.as_ref().map(TimeSeries::report),
            }
        })
    }
}

/// Total energy held by each kind.
pub struct Energy {
    acc_vec: Vec<Accumulator>,
}

impl Default for Energy {
    fn default() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(Kind::ALL.len(), Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for Energy {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        for snapshot in &frame.history.snapshots {
            let energies = [
                snapshot.energy_predators,
                snapshot.energy_prey,
                snapshot.energy_grass,
            ];
            for (acc, val) in self.acc_vec.iter_mut().zip(energies) {
                acc.add(val);
            }
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: BTreeMap<_, _> = Kind::ALL
            .iter()
            .zip(&self.acc_vec)
            .map(|(kind, acc)| (kind.to_string(), acc.report()))
            .collect();
        serde_json::json!({ "energy": reports })
    }
}

/// Age at death, split by kind and cause.
#[derive(Default)]
pub struct Lifespan {
    accs: BTreeMap<String, Accumulator>,
}

impl Obs for Lifespan {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        for death in &frame.history.deaths {
            let cause = match death.cause {
                Cause::Starvation => "starvation",
                Cause::Eaten { .. } => "eaten",
            };
            self.accs
                .entry(format!("{}_{cause}", death.kind))
                .or_insert_with(Accumulator::new)
                .add(death.age as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: BTreeMap<_, _> = self
            .accs
            .iter()
            .map(|(key, acc)| (key, acc.report()))
            .collect();
        serde_json::json!({ "lifespan": reports })
    }
}

/// First step at which each animal population was empty.
#[derive(Default)]
pub struct Extinction {
    predators: Option<u64>,
    prey: Option<u64>,
    last_step: Option<u64>,
}

impl Obs for Extinction {
    fn update(&mut self, frame: &Frame) -> Result<()> {
        for snapshot in &frame.history.snapshots {
            if snapshot.n_predators == 0 {
                self.predators.get_or_insert(snapshot.step);
            }
            if snapshot.n_prey == 0 {
                self.prey.get_or_insert(snapshot.step);
            }
            self.last_step = Some(snapshot.step);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "extinction": {
                "predators": self.predators,
                "prey": self.prey,
                "last_step": self.last_step,
            }
        })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Population::new(cfg)),
            Box::new(Energy::default()),
            Box::new(Lifespan::default()),
            Box::new(Extinction::default()),
        ];
        Self { obs_ptr_vec }
    }

    /// Feed every frame of a trajectory file to the observables.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        while !reader.fill_buf().context("failed to read file")?.is_empty() {
            let frame: Frame = decode::from_read(&mut reader).context("failed to read frame")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&frame).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn report(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.report()).context("failed to write results")?;
        Ok(())
    }
}
