//! Per-agent behaviours: movement, feeding, starvation and reproduction.
//!
//! Random draws happen in a fixed order within an animal's turn: the move,
//! then the choice of prey (predators with prey in their cell), then the
//! reproduction lottery (survivors only).

use crate::agent::{Agent, AgentId, Kind};
use crate::config::{Regrowth, SpeciesConfig};
use crate::grid::Position;
use crate::model::{Cause, Model};
use anyhow::{Context, Result, bail};
use rand::prelude::*;

/// Split an energy budget between parent and newborn, conserving the total.
///
/// The parent keeps the `split` share and the newborn gets the rest.
pub fn split_energy(energy: f64, split: f64) -> (f64, f64) {
    let kept = energy * split;
    (kept, energy - kept)
}

impl Model {
    /// Run one agent's turn.
    pub(crate) fn act(&mut self, id: AgentId) -> Result<()> {
        let kind = self
            .sched
            .get(id)
            .with_context(|| format!("cannot activate {id}, it is not live"))?
            .kind();
        let acted = match kind {
            Kind::Prey => self.act_prey(id),
            Kind::Predator => self.act_predator(id),
            Kind::Grass => self.act_grass(id),
        };
        acted.with_context(|| format!("failed to activate {kind} {id}"))
    }

    fn act_prey(&mut self, id: AgentId) -> Result<()> {
        let pos = self.walk(id, self.cfg.prey.move_cost)?;

        if self.cfg.grass.enabled {
            self.graze(id, pos)?;
        }
        if let Some(max_energy) = self.cfg.prey.max_energy {
            let prey = self.agent_mut(id)?;
            prey.energy = prey.energy.min(max_energy);
        }

        let SpeciesConfig { reproduce, split, .. } = self.cfg.prey;
        self.starve_or_breed(id, reproduce, split)
    }

    fn act_predator(&mut self, id: AgentId) -> Result<()> {
        let pos = self.walk(id, self.cfg.predator.move_cost)?;

        let prey_in_cell: Vec<_> = self
            .grid
            .contents_at(pos)
            .iter()
            .copied()
            .filter(|&other| self.kind_of(other) == Some(Kind::Prey))
            .collect();
        if let Some(&prey_id) = prey_in_cell.choose(&mut self.rng) {
            let eaten = self.kill(prey_id, Cause::Eaten { by: id })?;
            let gain = self.cfg.predator.gain_from_food.unwrap_or(eaten.energy);
            let max_energy = self.cfg.predator.max_energy;

            let predator = self.agent_mut(id)?;
            predator.energy += gain;
            if let Some(max_energy) = max_energy {
                predator.energy = predator.energy.min(max_energy);
            }
            log::trace!("predator {id} ate prey {prey_id} at {pos:?}, gaining {gain}");
        }

        let SpeciesConfig { reproduce, split, .. } = self.cfg.predator;
        self.starve_or_breed(id, reproduce, split)
    }

    fn act_grass(&mut self, id: AgentId) -> Result<()> {
        let regrowth = self.cfg.grass.regrowth;
        let grass = self.agent_mut(id)?;
        grass.age += 1;

        match regrowth {
            Regrowth::Countdown { regrowth_time } => {
                let patch = grass.patch_mut().context("agent has no grass patch")?;
                if !patch.fully_grown {
                    patch.countdown -= 1;
                    if patch.countdown <= 0 {
                        patch.fully_grown = true;
                        patch.countdown = regrowth_time;
                    }
                }
            }
            Regrowth::Continuous {
                regrowth_rate,
                max_energy,
                ..
            } => {
                if grass.energy < max_energy - regrowth_rate {
                    grass.energy += regrowth_rate;
                } else {
                    grass.energy = max_energy;
                    grass.patch_mut().context("agent has no grass patch")?.fully_grown = true;
                }
            }
        }

        Ok(())
    }

    /// Move an animal to a random neighbor cell, pay the move cost and age it.
    fn walk(&mut self, id: AgentId, move_cost: f64) -> Result<Position> {
        let animal = self.sched.get(id).context("animal is not live")?;
        let walker = animal.walker().context("agent cannot walk")?;
        let from = animal.pos;

        let to = walker.random_move(&self.grid, from, &mut self.rng)?;
        self.grid.move_agent(id, to)?;

        let animal = self.agent_mut(id)?;
        animal.pos = to;
        animal.energy -= move_cost;
        animal.age += 1;
        log::trace!("{id} moved {from:?} => {to:?} [E:{}]", animal.energy);

        Ok(to)
    }

    /// Let a prey eat the grass patch of its cell, if any.
    ///
    /// A cell holds zero or one patch; more is an error.
    fn graze(&mut self, prey_id: AgentId, pos: Position) -> Result<()> {
        let patches: Vec<_> = self
            .grid
            .contents_at(pos)
            .iter()
            .copied()
            .filter(|&other| self.kind_of(other) == Some(Kind::Grass))
            .collect();
        let patch_id = match patches.as_slice() {
            [] => return Ok(()),
            [patch_id] => *patch_id,
            _ => bail!("{} grass patches share cell {pos:?}", patches.len()),
        };

        match self.cfg.grass.regrowth {
            Regrowth::Countdown { regrowth_time } => {
                let gain = self
                    .cfg
                    .prey
                    .gain_from_food
                    .context("prey gain from food is not configured")?;
                let grass = self.agent_mut(patch_id)?;
                let patch = grass.patch_mut().context("agent has no grass patch")?;
                if !patch.fully_grown {
                    return Ok(());
                }
                patch.fully_grown = false;
                patch.countdown = regrowth_time;
                self.agent_mut(prey_id)?.energy += gain;
                log::trace!("prey {prey_id} ate grass {patch_id}, gaining {gain}");
            }
            Regrowth::Continuous {
                min_energy_regrowth,
                ..
            } => {
                let pool = self.agent_mut(patch_id)?.energy;
                if pool <= 0.0 {
                    return Ok(());
                }
                self.agent_mut(prey_id)?.energy += pool;
                if pool < min_energy_regrowth {
                    self.kill(patch_id, Cause::Eaten { by: prey_id })?;
                } else {
                    let grass = self.agent_mut(patch_id)?;
                    grass.energy = 0.0;
                    grass.patch_mut().context("agent has no grass patch")?.fully_grown = false;
                }
                log::trace!("prey {prey_id} ate grass {patch_id}, gaining {pool}");
            }
        }

        Ok(())
    }

    /// Remove a starved animal, or run its reproduction lottery.
    ///
    /// Starvation is `energy < 0`; an animal at exactly zero survives.
    fn starve_or_breed(&mut self, id: AgentId, reproduce: f64, split: f64) -> Result<()> {
        let energy = self.agent_mut(id)?.energy;
        if energy < 0.0 {
            self.kill(id, Cause::Starvation)?;
            return Ok(());
        }
        if self.rng.random::<f64>() < reproduce {
            self.breed(id, split)?;
        }
        Ok(())
    }

    fn breed(&mut self, id: AgentId, split: f64) -> Result<()> {
        let parent = self.agent_mut(id)?;
        let (kept, given) = split_energy(parent.energy, split);
        parent.energy = kept;
        let (pos, body) = (parent.pos, parent.body.clone());

        let child_id = self.next_agent_id();
        let child = Agent::new(child_id, pos, given, body);
        log::debug!("{} {id} bred {child_id} at {pos:?} [E:{given}]", child.kind());
        self.insert(child)
    }

    fn kind_of(&self, id: AgentId) -> Option<Kind> {
        self.sched.get(id).map(Agent::kind)
    }
}
