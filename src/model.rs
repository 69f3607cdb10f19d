//! Simulation model: grid, scheduler, random stream and tick loop.

use crate::agent::{Agent, AgentId, AgentView, Body, Kind, Patch, Walker};
use crate::config::{InitConfig, InitEnergy, ModelConfig, Regrowth, Termination};
use crate::grid::{Grid, Position};
use crate::scheduler::Scheduler;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Why an agent left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    Starvation,
    Eaten { by: AgentId },
}

/// Death event of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Death {
    pub id: AgentId,
    pub kind: Kind,
    /// Age at death.
    pub age: u64,
    /// Step during which the agent died.
    pub step: u64,
    pub cause: Cause,
}

/// Aggregate counts and energies after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: u64,
    pub n_predators: usize,
    pub n_prey: usize,
    pub n_grass: usize,
    /// Grass patches that are fully grown.
    pub n_grass_grown: usize,
    pub energy_predators: f64,
    pub energy_prey: f64,
    pub energy_grass: f64,
}

/// Consumer of the per-step aggregates and death events.
pub trait Collector {
    fn collect(&mut self, snapshot: &Snapshot, deaths: &[Death]) -> Result<()>;
}

/// Collector that keeps everything in memory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub snapshots: Vec<Snapshot>,
    pub deaths: Vec<Death>,
}

impl Collector for History {
    fn collect(&mut self, snapshot: &Snapshot, deaths: &[Death]) -> Result<()> {
        self.snapshots.push(snapshot.clone());
        self.deaths.extend_from_slice(deaths);
        Ok(())
    }
}

/// Predator-prey model.
///
/// Holds the model parameters, the grid and scheduler (always kept in
/// lockstep), the random stream and the id counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub(crate) cfg: ModelConfig,
    pub(crate) grid: Grid,
    pub(crate) sched: Scheduler,
    pub(crate) rng: ChaCha12Rng,
    next_id: u64,
    pub(crate) step: u64,
    pub(crate) deaths: Vec<Death>,
}

impl Model {
    /// Create a model and seed its initial population.
    ///
    /// Predators are placed first, then prey, then one grass patch per cell
    /// in row-major order if grass is enabled.
    pub fn new(cfg: ModelConfig, init: &InitConfig, rng: ChaCha12Rng) -> Result<Self> {
        let mut model = Self::empty(cfg, rng)?;

        model
            .seed_animals(Kind::Predator, init.n_predators, init.energy_predators)
            .context("failed to seed predators")?;
        model
            .seed_animals(Kind::Prey, init.n_prey, init.energy_prey)
            .context("failed to seed prey")?;
        if model.cfg.grass.enabled {
            model.seed_grass().context("failed to seed grass")?;
        }

        log::info!(
            "seeded {} predators, {} prey and {} grass patches",
            model.count(Kind::Predator),
            model.count(Kind::Prey),
            model.count(Kind::Grass)
        );

        Ok(model)
    }

    /// Create a model without agents.
    pub fn empty(cfg: ModelConfig, rng: ChaCha12Rng) -> Result<Self> {
        cfg.validate().context("invalid model config")?;
        Ok(Self {
            grid: Grid::new(cfg.width, cfg.height),
            sched: Scheduler::new(cfg.activation),
            cfg,
            rng,
            next_id: 1,
            step: 0,
            deaths: Vec::new(),
        })
    }

    pub fn cfg(&self) -> &ModelConfig {
        &self.cfg
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.sched.get(id)
    }

    /// Live agents in increasing id order.
    pub fn agents(&self) -> impl Iterator<Item = AgentView> + '_ {
        self.sched.agents().map(Agent::view)
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.sched.count(kind)
    }

    pub fn total_energy(&self, kind: Kind) -> f64 {
        self.sched.total_energy(kind)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step,
            n_predators: self.sched.count(Kind::Predator),
            n_prey: self.sched.count(Kind::Prey),
            n_grass: self.sched.count(Kind::Grass),
            n_grass_grown: self.sched.count_where(Kind::Grass, Agent::is_fully_grown),
            energy_predators: self.sched.total_energy(Kind::Predator),
            energy_prey: self.sched.total_energy(Kind::Prey),
            energy_grass: self.sched.total_energy(Kind::Grass),
        }
    }

    /// Whether the termination rule still lets the run continue.
    pub fn is_running(&self) -> bool {
        let n_predators = self.count(Kind::Predator);
        let n_prey = self.count(Kind::Prey);
        match self.cfg.termination {
            Termination::Either => n_predators > 0 && n_prey > 0,
            Termination::Both => n_predators > 0 || n_prey > 0,
        }
    }

    /// Run one tick and report its aggregates to `collector`.
    pub fn step<C: Collector + ?Sized>(&mut self, collector: &mut C) -> Result<()> {
        self.step += 1;

        let order = self.sched.activation_order(&mut self.rng);
        self.activate(&order)
            .with_context(|| format!("failed to perform step {}", self.step))?;
        self.check_consistency()?;

        collector
            .collect(&self.snapshot(), &self.deaths)
            .context("failed to collect step")?;
        self.deaths.clear();

        Ok(())
    }

    /// Activate agents in the given order, skipping those removed earlier in the tick.
    pub(crate) fn activate(&mut self, order: &[AgentId]) -> Result<()> {
        for &id in order {
            if !self.sched.contains(id) {
                log::trace!("skipping {id}, removed earlier this step");
                continue;
            }
            self.act(id)?;
        }
        Ok(())
    }

    /// Verify that the grid and the scheduler hold the same agents.
    pub fn check_consistency(&self) -> Result<()> {
        if !self.grid.ids().eq(self.sched.ids()) {
            bail!(
                "grid holds {} agents but scheduler holds {}",
                self.grid.len(),
                self.sched.len()
            );
        }
        Ok(())
    }

    pub fn spawn_animal(&mut self, kind: Kind, pos: Position, energy: f64) -> Result<AgentId> {
        let walker = Walker::new(self.cfg.neighborhood);
        let body = match kind {
            Kind::Predator => Body::Predator(walker),
            Kind::Prey => Body::Prey(walker),
            Kind::Grass => bail!("grass is not an animal"),
        };
        let id = self.next_agent_id();
        self.insert(Agent::new(id, pos, energy, body))?;
        Ok(id)
    }

    pub fn spawn_grass(&mut self, pos: Position, patch: Patch, energy: f64) -> Result<AgentId> {
        let id = self.next_agent_id();
        self.insert(Agent::new(id, pos, energy, Body::Grass(patch)))?;
        Ok(id)
    }

    pub(crate) fn next_agent_id(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place an agent on the grid and schedule it.
    pub(crate) fn insert(&mut self, agent: Agent) -> Result<()> {
        self.grid.place(agent.id, agent.pos)?;
        self.sched.add(agent)
    }

    /// Remove an agent from grid and scheduler and log its death.
    pub(crate) fn kill(&mut self, id: AgentId, cause: Cause) -> Result<Agent> {
        self.grid.remove(id)?;
        let agent = self.sched.remove(id)?;
        let death = Death {
            id,
            kind: agent.kind(),
            age: agent.age,
            step: self.step,
            cause,
        };
        log::debug!("{} {id} died at age {}: {cause:?}", death.kind, death.age);
        self.deaths.push(death);
        Ok(agent)
    }

    pub(crate) fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent> {
        self.sched
            .get_mut(id)
            .with_context(|| format!("agent {id} is not live"))
    }

    fn seed_animals(&mut self, kind: Kind, n_agt: usize, energy: InitEnergy) -> Result<()> {
        let (fixed, energy_dist) = match energy {
            InitEnergy::Fixed(val) => (val, None),
            InitEnergy::Range([lo, hi]) => (lo, Some(Uniform::new_inclusive(lo, hi)?)),
        };
        for _ in 0..n_agt {
            let pos = self.grid.random_position(&mut self.rng);
            let energy = match &energy_dist {
                Some(dist) => dist.sample(&mut self.rng),
                None => fixed,
            };
            self.spawn_animal(kind, pos, energy)?;
        }
        Ok(())
    }

    fn seed_grass(&mut self) -> Result<()> {
        let (width, height) = (self.grid.width(), self.grid.height());
        for y in 0..height {
            for x in 0..width {
                let pos = Position::new(x, y);
                match self.cfg.grass.regrowth {
                    Regrowth::Countdown { regrowth_time } => {
                        let fully_grown = self.rng.random_bool(0.5);
                        let countdown = if fully_grown {
                            regrowth_time
                        } else {
                            self.rng.random_range(1..=regrowth_time)
                        };
                        let patch = Patch {
                            fully_grown,
                            countdown,
                        };
                        self.spawn_grass(pos, patch, 0.0)?;
                    }
                    Regrowth::Continuous { max_energy, .. } => {
                        let energy = Uniform::new_inclusive(0.0, max_energy)?.sample(&mut self.rng);
                        let patch = Patch {
                            fully_grown: energy >= max_energy,
                            countdown: 0,
                        };
                        self.spawn_grass(pos, patch, energy)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{Config, GrassConfig, SpeciesConfig};
    use crate::grid::Neighborhood;
    use crate::scheduler::Activation;
    use std::collections::BTreeMap;

    pub(crate) fn species(reproduce: f64, gain_from_food: Option<f64>) -> SpeciesConfig {
        SpeciesConfig {
            reproduce,
            move_cost: 1.0,
            max_energy: None,
            gain_from_food,
            split: 0.5,
        }
    }

    pub(crate) fn test_cfg(width: usize, height: usize) -> ModelConfig {
        ModelConfig {
            width,
            height,
            neighborhood: Neighborhood::Moore,
            activation: Activation::Global,
            termination: Termination::Either,
            prey: species(0.0, Some(4.0)),
            predator: species(0.0, None),
            grass: GrassConfig::default(),
        }
    }

    pub(crate) fn rng(seed: u64) -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(seed)
    }

    fn basic_model(seed: u64) -> Model {
        let cfg: Config = crate::config::tests::BASIC.parse().unwrap();
        Model::new(cfg.model, &cfg.init, rng(seed)).unwrap()
    }

    #[test]
    fn seeding_fills_grid_and_scheduler() {
        let model = basic_model(1);
        assert_eq!(model.count(Kind::Predator), 50);
        assert_eq!(model.count(Kind::Prey), 100);
        assert_eq!(model.count(Kind::Grass), 400);
        model.check_consistency().unwrap();

        for agent in model.agents() {
            match agent.kind {
                Kind::Prey => assert_eq!(agent.energy, 8.0),
                Kind::Predator => assert!((0.0..=40.0).contains(&agent.energy)),
                Kind::Grass => assert!(agent.fully_grown.is_some()),
            }
            assert_eq!(agent.age, 0);
        }

        let ids: Vec<_> = model.agents().map(|agent| agent.id.0).collect();
        assert_eq!(ids, (1..=550).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_config_creates_no_model() {
        let mut cfg = test_cfg(5, 5);
        cfg.prey.reproduce = -0.1;
        assert!(Model::empty(cfg, rng(0)).is_err());

        let mut cfg = test_cfg(5, 5);
        cfg.height = 0;
        assert!(Model::empty(cfg, rng(0)).is_err());
    }

    #[test]
    fn same_seed_same_run() {
        let mut model_a = basic_model(7);
        let mut model_b = basic_model(7);
        let mut history_a = History::default();
        let mut history_b = History::default();
        for _ in 0..40 {
            model_a.step(&mut history_a).unwrap();
            model_b.step(&mut history_b).unwrap();
        }
        assert_eq!(history_a, history_b);
        assert!(!history_a.deaths.is_empty());
    }

    #[test]
    fn per_step_invariants_hold() {
        let mut model = basic_model(3);
        let mut history = History::default();
        for _ in 0..40 {
            let ages_before: BTreeMap<_, _> =
                model.agents().map(|agent| (agent.id, agent.age)).collect();

            model.step(&mut history).unwrap();

            assert!(model.grid().ids().eq(model.scheduler().ids()));
            for agent in model.agents() {
                if agent.kind != Kind::Grass {
                    assert!(agent.energy >= 0.0, "{:?} survived with negative energy", agent);
                }
                match ages_before.get(&agent.id) {
                    Some(&age) => assert_eq!(agent.age, age + 1),
                    None => assert_eq!(agent.age, 0),
                }
            }
        }

        let snapshot = history.snapshots.last().unwrap();
        assert_eq!(snapshot, &model.snapshot());
        assert_eq!(snapshot.step, 40);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut model = basic_model(9);
        let mut history = History::default();
        let mut max_id = model.agents().map(|agent| agent.id).max().unwrap();
        for _ in 0..30 {
            let before: Vec<_> = model.agents().map(|agent| agent.id).collect();
            model.step(&mut history).unwrap();
            for agent in model.agents() {
                if !before.contains(&agent.id) {
                    assert!(agent.id > max_id);
                    max_id = agent.id;
                }
            }
        }
        let mut dead: Vec<_> = history.deaths.iter().map(|death| death.id).collect();
        let n_deaths = dead.len();
        dead.sort();
        dead.dedup();
        assert_eq!(dead.len(), n_deaths);
    }

    #[test]
    fn termination_rules() {
        let mut cfg = test_cfg(4, 4);
        let mut model = Model::empty(cfg.clone(), rng(0)).unwrap();
        model
            .spawn_animal(Kind::Prey, Position::new(0, 0), 1.0)
            .unwrap();
        assert!(!model.is_running());

        cfg.termination = Termination::Both;
        let mut model = Model::empty(cfg, rng(0)).unwrap();
        assert!(!model.is_running());
        model
            .spawn_animal(Kind::Prey, Position::new(0, 0), 1.0)
            .unwrap();
        assert!(model.is_running());
    }

    #[test]
    fn checkpoint_round_trip_continues_identically() {
        let mut model = basic_model(21);
        let mut history = History::default();
        for _ in 0..10 {
            model.step(&mut history).unwrap();
        }

        let bytes = rmp_serde::to_vec_named(&model).unwrap();
        let mut restored: Model = rmp_serde::from_slice(&bytes).unwrap();

        let mut history_a = History::default();
        let mut history_b = History::default();
        for _ in 0..10 {
            model.step(&mut history_a).unwrap();
            restored.step(&mut history_b).unwrap();
        }
        assert_eq!(history_a, history_b);
    }
}
