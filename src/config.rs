use crate::grid::Neighborhood;
use crate::scheduler::Activation;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path, str::FromStr};

/// Largest number of grid cells a model may allocate.
pub const MAX_CELLS: usize = 10_000_000;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model parameters.
    pub model: ModelConfig,
    /// Initial population parameters.
    pub init: InitConfig,
    /// Output parameters.
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of grid columns.
    pub width: usize,
    /// Number of grid rows.
    pub height: usize,

    /// Cells an animal may step into, inherited by offspring.
    #[serde(default = "default_neighborhood")]
    pub neighborhood: Neighborhood,
    /// Activation order policy.
    #[serde(default)]
    pub activation: Activation,
    /// Population extinction rule that ends a run.
    #[serde(default)]
    pub termination: Termination,

    pub prey: SpeciesConfig,
    pub predator: SpeciesConfig,

    #[serde(default)]
    pub grass: GrassConfig,
}

fn default_neighborhood() -> Neighborhood {
    Neighborhood::Moore
}

/// Parameters of an animal species.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Per-tick reproduction probability.
    pub reproduce: f64,
    /// Energy spent on every move.
    #[serde(default = "default_move_cost")]
    pub move_cost: f64,
    /// Energy cap applied after feeding.
    #[serde(default)]
    pub max_energy: Option<f64>,
    /// Fixed energy gained per meal.
    ///
    /// Prey need it under the countdown grass policy. Predators gain the
    /// eaten prey's energy when it is unset.
    #[serde(default)]
    pub gain_from_food: Option<f64>,
    /// Share of its energy a parent keeps when it reproduces.
    #[serde(default = "default_split")]
    pub split: f64,
}

fn default_move_cost() -> f64 {
    1.0
}

fn default_split() -> f64 {
    0.5
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    /// Whether grass patches exist and prey feed on them.
    pub enabled: bool,
    pub regrowth: Regrowth,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            regrowth: Regrowth::Countdown { regrowth_time: 20 },
        }
    }
}

/// Grass regrowth and feeding policy.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Regrowth {
    /// Binary patches: grown again `regrowth_time` ticks after being eaten.
    Countdown { regrowth_time: i64 },
    /// Energy pools accruing `regrowth_rate` per tick up to `max_energy`.
    ///
    /// A patch eaten while holding less than `min_energy_regrowth` is deleted.
    Continuous {
        regrowth_rate: f64,
        max_energy: f64,
        min_energy_regrowth: f64,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Stop once either animal population is extinct.
    #[default]
    Either,
    /// Stop once both animal populations are extinct.
    Both,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub n_predators: usize,
    pub n_prey: usize,

    pub energy_predators: InitEnergy,
    pub energy_prey: InitEnergy,

    /// Random seed. Drawn from the OS when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Initial energy of a seeded animal.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitEnergy {
    Fixed(f64),
    /// Uniform in the inclusive range `[lo, hi]`.
    Range([f64; 2]),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps per trajectory file.
    pub steps_per_file: usize,
    /// Number of steps between trajectory frames.
    pub steps_per_save: usize,
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
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        contents.parse()
    }

    fn validate(&self) -> Result<()> {
        self.model.validate().context("invalid model parameters")?;

        check_num(self.init.n_predators, 0..1_000_000)
            .context("invalid initial number of predators")?;
        check_num(self.init.n_prey, 0..1_000_000).context("invalid initial number of prey")?;
        check_energy(self.init.energy_predators)
            .context("invalid initial energy of predators")?;
        check_energy(self.init.energy_prey).context("invalid initial energy of prey")?;

        check_num(self.output.steps_per_file, 1..=100_000_000)
            .context("invalid number of steps per file")?;
        check_num(self.output.steps_per_save, 1..=self.output.steps_per_file)
            .context("invalid number of steps per save")?;

        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }
}

impl ModelConfig {
    /// # Errors
    /// Returns an error describing the first invalid parameter.
    pub fn validate(&self) -> Result<()> {
        check_num(self.width, 1..=100_000).context("invalid grid width")?;
        check_num(self.height, 1..=100_000).context("invalid grid height")?;
        check_num(self.width * self.height, 1..=MAX_CELLS).context("invalid grid area")?;

        self.prey.validate().context("invalid prey parameters")?;
        self.predator
            .validate()
            .context("invalid predator parameters")?;

        match self.grass.regrowth {
            Regrowth::Countdown { regrowth_time } => {
                check_num(regrowth_time, 1..=1_000_000).context("invalid grass regrowth time")?;
                if self.grass.enabled && self.prey.gain_from_food.is_none() {
                    bail!("countdown grass requires the prey gain from food");
                }
            }
            Regrowth::Continuous {
                regrowth_rate,
                max_energy,
                min_energy_regrowth,
            } => {
                check_num(max_energy, 0.0..).context("invalid maximum grass energy")?;
                check_num(regrowth_rate, 0.0..=max_energy)
                    .context("invalid grass regrowth rate")?;
                check_num(min_energy_regrowth, 0.0..)
                    .context("invalid minimum grass regrowth energy")?;
            }
        }

        Ok(())
    }
}

impl SpeciesConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.reproduce, 0.0..=1.0).context("invalid reproduction rate")?;
        check_num(self.move_cost, 0.0..).context("invalid move cost")?;
        check_num(self.split, 0.0..=1.0).context("invalid energy split")?;
        if let Some(max_energy) = self.max_energy {
            check_num(max_energy, 0.0..).context("invalid maximum energy")?;
        }
        if let Some(gain) = self.gain_from_food {
            check_num(gain, 0.0..).context("invalid gain from food")?;
        }
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

fn check_energy(energy: InitEnergy) -> Result<()> {
    match energy {
        InitEnergy::Fixed(val) => check_num(val, 0.0..),
        InitEnergy::Range([lo, hi]) => {
            check_num(lo, 0.0..).context("invalid lower bound")?;
            check_num(hi, lo..).context("invalid upper bound")
        }
    }
}
