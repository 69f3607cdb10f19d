//! Live agent population and activation order.

use crate::agent::{Agent, AgentId, Kind};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordering policy of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// One shuffle over every live agent.
    #[default]
    Global,
    /// One shuffle per kind, kinds activated in [`Kind::ALL`] order.
    PerType,
}

/// Master set of live agents plus an index by kind.
///
/// Both structures are updated together in [`Scheduler::add`] and
/// [`Scheduler::remove`]; per-kind queries read the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler {
    policy: Activation,
    agents: BTreeMap<AgentId, Agent>,
    by_kind: [BTreeSet<AgentId>; 3],
}

impl Scheduler {
    pub fn new(policy: Activation) -> Self {
        Self {
            policy,
            agents: BTreeMap::new(),
            by_kind: Default::default(),
        }
    }

    pub fn policy(&self) -> Activation {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Live agents in increasing id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.agents.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    /// # Errors
    /// Returns an error if an agent with the same id is already live.
    pub fn add(&mut self, agent: Agent) -> Result<()> {
        let id = agent.id;
        if self.agents.contains_key(&id) {
            bail!("agent {id} is already scheduled");
        }
        self.by_kind[agent.kind().idx()].insert(id);
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Remove an agent from the live set and the kind index.
    ///
    /// # Errors
    /// Returns an error if the agent is missing from either structure.
    pub fn remove(&mut self, id: AgentId) -> Result<Agent> {
        let agent = self
            .agents
            .remove(&id)
            .with_context(|| format!("agent {id} is not scheduled"))?;
        let kind = agent.kind();
        if !self.by_kind[kind.idx()].remove(&id) {
            bail!("agent {id} is missing from the {kind} index");
        }
        Ok(agent)
    }

    /// Materialize the activation order of the next tick.
    pub fn activation_order<R: Rng>(&self, rng: &mut R) -> Vec<AgentId> {
        match self.policy {
            Activation::Global => {
                let mut order: Vec<_> = self.agents.keys().copied().collect();
                order.shuffle(rng);
                order
            }
            Activation::PerType => {
                let mut order = Vec::with_capacity(self.agents.len());
                for kind in Kind::ALL {
                    let mut part: Vec<_> = self.by_kind[kind.idx()].iter().copied().collect();
                    part.shuffle(rng);
                    order.extend(part);
                }
                order
            }
        }
    }

    pub fn ids_of(&self, kind: Kind) -> impl Iterator<Item = AgentId> + '_ {
        self.by_kind[kind.idx()].iter().copied()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.by_kind[kind.idx()].len()
    }

    /// Count live agents of a kind that satisfy a filter.
    pub fn count_where<F>(&self, kind: Kind, filter: F) -> usize
    where
        F: Fn(&Agent) -> bool,
    {
        self.of_kind(kind).filter(|&agent| filter(agent)).count()
    }

    pub fn total_energy(&self, kind: Kind) -> f64 {
        self.of_kind(kind).map(|agent| agent.energy).sum()
    }

    fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Agent> + '_ {
        self.ids_of(kind).filter_map(|id| self.agents.get(&id))
    }
}
