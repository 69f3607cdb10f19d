//! Agent data types.

use crate::grid::{Grid, Neighborhood, Position};
use anyhow::{Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique agent identifier, never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Agent variant discriminator.
///
/// The declaration order is the activation order of the per-type policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Predator,
    Prey,
    Grass,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Predator, Kind::Prey, Kind::Grass];

    pub fn idx(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Predator => "predator",
            Kind::Prey => "prey",
            Kind::Grass => "grass",
        };
        f.write_str(name)
    }
}

/// Random-walk movement capability shared by the animals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Walker {
    pub neighborhood: Neighborhood,
}

impl Walker {
    pub fn new(neighborhood: Neighborhood) -> Self {
        Self { neighborhood }
    }

    /// Pick a uniformly random adjacent cell.
    pub fn random_move<R: Rng>(&self, grid: &Grid, pos: Position, rng: &mut R) -> Result<Position> {
        grid.neighbors_of(pos, self.neighborhood)
            .choose(rng)
            .copied()
            .with_context(|| format!("no neighbor cells around {pos:?}"))
    }
}

/// Regrowth state of a grass patch.
///
/// `countdown` is only meaningful under the countdown policy; under the
/// continuous policy the patch's pool is the agent's `energy`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub fully_grown: bool,
    pub countdown: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    Prey(Walker),
    Predator(Walker),
    Grass(Patch),
}

/// Agent of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Position,
    pub age: u64,
    pub energy: f64,
    pub body: Body,
}

impl Agent {
    pub fn new(id: AgentId, pos: Position, energy: f64, body: Body) -> Self {
        Self {
            id,
            pos,
            age: 0,
            energy,
            body,
        }
    }

    pub fn kind(&self) -> Kind {
        match self.body {
            Body::Prey(_) => Kind::Prey,
            Body::Predator(_) => Kind::Predator,
            Body::Grass(_) => Kind::Grass,
        }
    }

    pub fn walker(&self) -> Option<Walker> {
        match self.body {
            Body::Prey(walker) | Body::Predator(walker) => Some(walker),
            Body::Grass(_) => None,
        }
    }

    pub fn patch(&self) -> Option<&Patch> {
        match &self.body {
            Body::Grass(patch) => Some(patch),
            _ => None,
        }
    }

    pub fn patch_mut(&mut self) -> Option<&mut Patch> {
        match &mut self.body {
            Body::Grass(patch) => Some(patch),
            _ => None,
        }
    }

    pub fn is_fully_grown(&self) -> bool {
        self.patch().is_some_and(|patch| patch.fully_grown)
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            kind: self.kind(),
            pos: self.pos,
            age: self.age,
            energy: self.energy,
            fully_grown: self.patch().map(|patch| patch.fully_grown),
        }
    }
}

/// Read-only description of a live agent, for renderers and trajectory files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: AgentId,
    pub kind: Kind,
    pub pos: Position,
    pub age: u64,
    pub energy: f64,
    pub fully_grown: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;
    use std::collections::BTreeMap;

    #[test]
    fn random_move_is_uniform_on_narrow_grid() {
        let grid = Grid::new(2, 3);
        let walker = Walker::new(Neighborhood::Moore);
        let mut rng = ChaCha12Rng::seed_from_u64(21);

        let mut counts = BTreeMap::new();
        for _ in 0..50_000 {
            let to = walker.random_move(&grid, Position::new(0, 1), &mut rng).unwrap();
            *counts.entry(to).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 5);
        assert!(!counts.contains_key(&Position::new(0, 1)));
        for (pos, count) in counts {
            assert!((9_000..11_000).contains(&count), "{pos:?} drawn {count} times");
        }
    }

    #[test]
    fn views_report_patch_state_only_for_grass() {
        let walker = Walker::new(Neighborhood::VonNeumann);
        let prey = Agent::new(AgentId(1), Position::new(0, 0), 3.0, Body::Prey(walker));
        let patch = Patch {
            fully_grown: true,
            countdown: 4,
        };
        let grass = Agent::new(AgentId(2), Position::new(1, 0), 0.0, Body::Grass(patch));

        assert_eq!(prey.view().kind, Kind::Prey);
        assert_eq!(prey.view().fully_grown, None);
        assert!(prey.walker().is_some());
        assert_eq!(grass.view().fully_grown, Some(true));
        assert!(grass.walker().is_none());
        assert!(grass.is_fully_grown());
    }
}
