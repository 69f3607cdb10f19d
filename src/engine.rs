use crate::agent::AgentView;
use crate::config::Config;
use crate::model::{History, Model};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Trajectory frame written every `steps_per_save` steps.
///
/// Holds the aggregates and deaths of every step since the previous frame
/// and the live agents at the end of the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub history: History,
    pub agents: Vec<AgentView>,
}

/// Simulation engine.
///
/// Holds the configuration and the model (including its random stream),
/// and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    model: Model,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let seed = cfg.init.seed.unwrap_or_else(rand::random);
        log::info!("seed = {seed}");
        let rng = ChaCha12Rng::seed_from_u64(seed);

        let model = Model::new(cfg.model.clone(), &cfg.init, rng)
            .context("failed to initialize model")?;

        Ok(Self { cfg, model })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn is_running(&self) -> bool {
        self.model.is_running()
    }

    /// Run up to `steps_per_file` steps and save the resulting frames to a binary file.
    ///
    /// Stops early once the termination rule ends the run. A fresh run also
    /// saves a frame with its initial state.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        if self.model.step_count() == 0 {
            let history = History {
                snapshots: vec![self.model.snapshot()],
                deaths: Vec::new(),
            };
            self.write_frame(&mut writer, history)?;
        }

        let steps_per_save = self.cfg.output.steps_per_save;
        let saves_per_file = self.cfg.output.steps_per_file / steps_per_save;
        for i_save in 0..saves_per_file {
            let mut history = History::default();
            for _ in 0..steps_per_save {
                if !self.model.is_running() {
                    break;
                }
                self.model.step(&mut history)?;
            }
            if history.snapshots.is_empty() {
                break;
            }
            self.write_frame(&mut writer, history)?;

            let progress = 100.0 * (i_save + 1) as f64 / saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        if !self.model.is_running() {
            let snapshot = self.model.snapshot();
            log::info!(
                "run ended at step {}: {} predators, {} prey",
                snapshot.step,
                snapshot.n_predators,
                snapshot.n_prey
            );
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

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    fn write_frame<W: Write>(&self, writer: &mut W, history: History) -> Result<()> {
        let frame = Frame {
            history,
            agents: self.model.agents().collect(),
        };
        encode::write_named(writer, &frame).context("failed to serialize frame")
    }
}
