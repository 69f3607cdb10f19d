//! Toroidal multi-occupancy grid.

use crate::agent::AgentId;
use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cell coordinate, always within the grid bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Set of cells an agent may step into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// The 4 orthogonally adjacent cells.
    VonNeumann,
    /// The 8 surrounding cells.
    Moore,
}

/// Fixed-size 2D torus holding zero or more agents per cell.
///
/// Keeps a reverse index from agent to position so that removal only needs
/// the agent id. Cell contents keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Vec<AgentId>>,
    locations: BTreeMap<AgentId, Position>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Vec::new(); width * height],
            locations: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of agents on the grid.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Ids of all agents on the grid, in increasing order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.locations.keys().copied()
    }

    pub fn position_of(&self, id: AgentId) -> Option<Position> {
        self.locations.get(&id).copied()
    }

    /// Put an agent into a cell.
    ///
    /// # Errors
    /// Returns an error if the position is out of bounds or the agent is already placed.
    pub fn place(&mut self, id: AgentId, pos: Position) -> Result<()> {
        if pos.x >= self.width || pos.y >= self.height {
            bail!(
                "position {pos:?} is outside the {}x{} grid",
                self.width,
                self.height
            );
        }
        if let Some(old) = self.locations.get(&id) {
            bail!("agent {id} is already placed at {old:?}");
        }
        let idx = self.cell_idx(pos);
        self.cells[idx].push(id);
        self.locations.insert(id, pos);
        Ok(())
    }

    /// Take an agent off the grid and return its last position.
    ///
    /// # Errors
    /// Returns an error if the agent is not on the grid.
    pub fn remove(&mut self, id: AgentId) -> Result<Position> {
        let pos = self
            .locations
            .remove(&id)
            .with_context(|| format!("agent {id} is not on the grid"))?;
        let idx = self.cell_idx(pos);
        let cell = &mut self.cells[idx];
        let i_ele = cell
            .iter()
            .position(|&ele| ele == id)
            .with_context(|| format!("agent {id} is missing from cell {pos:?}"))?;
        cell.remove(i_ele);
        Ok(pos)
    }

    pub fn move_agent(&mut self, id: AgentId, to: Position) -> Result<()> {
        self.remove(id)?;
        self.place(id, to)
    }

    /// Agents in a cell, in the order they arrived.
    pub fn contents_at(&self, pos: Position) -> &[AgentId] {
        &self.cells[self.cell_idx(pos)]
    }

    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Position {
        let x = rng.random_range(0..self.width);
        let y = rng.random_range(0..self.height);
        Position { x, y }
    }

    /// Distinct cells adjacent to `pos`, wrapped on the torus, in ascending order.
    ///
    /// Only the zero offset is skipped, so on a dimension of length 1 the
    /// wrapped offsets land on `pos` itself and it is listed once.
    pub fn neighbors_of(&self, pos: Position, neighborhood: Neighborhood) -> Vec<Position> {
        let mut neighbors = Vec::with_capacity(8);
        for dx in -1_i64..=1 {
            for dy in -1_i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if neighborhood == Neighborhood::VonNeumann && dx != 0 && dy != 0 {
                    continue;
                }
                neighbors.push(Position {
                    x: wrap(pos.x, dx, self.width),
                    y: wrap(pos.y, dy, self.height),
                });
            }
        }
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    fn cell_idx(&self, pos: Position) -> usize {
        pos.y * self.width + pos.x
    }
}

fn wrap(coord: usize, delta: i64, len: usize) -> usize {
    (coord as i64 + delta).rem_euclid(len as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn neighbors_wrap_around_edges() {
        let grid = Grid::new(5, 4);
        let corner = Position::new(0, 0);

        let von_neumann = grid.neighbors_of(corner, Neighborhood::VonNeumann);
        assert_eq!(
            von_neumann,
            vec![
                Position::new(0, 1),
                Position::new(0, 3),
                Position::new(1, 0),
                Position::new(4, 0),
            ]
        );

        let moore = grid.neighbors_of(corner, Neighborhood::Moore);
        assert_eq!(moore.len(), 8);
        assert!(moore.contains(&Position::new(4, 3)));
        assert!(moore.contains(&Position::new(1, 1)));
        assert!(!moore.contains(&corner));
    }

    #[test]
    fn single_cell_torus_still_has_moves() {
        let grid = Grid::new(1, 1);
        let pos = Position::new(0, 0);
        assert_eq!(grid.neighbors_of(pos, Neighborhood::Moore), vec![pos]);
        assert_eq!(grid.neighbors_of(pos, Neighborhood::VonNeumann), vec![pos]);
    }

    #[test]
    fn narrow_grid_lists_each_cell_once() {
        let grid = Grid::new(2, 3);
        let moore = grid.neighbors_of(Position::new(0, 1), Neighborhood::Moore);
        assert_eq!(
            moore,
            vec![
                Position::new(0, 0),
                Position::new(0, 2),
                Position::new(1, 0),
                Position::new(1, 1),
                Position::new(1, 2),
            ]
        );

        let von_neumann = grid.neighbors_of(Position::new(0, 1), Neighborhood::VonNeumann);
        assert_eq!(
            von_neumann,
            vec![
                Position::new(0, 0),
                Position::new(0, 2),
                Position::new(1, 1),
            ]
        );
    }

    #[test]
    fn multi_occupancy_keeps_insertion_order() {
        let mut grid = Grid::new(3, 3);
        let pos = Position::new(1, 2);
        for id in [7, 3, 5] {
            grid.place(AgentId(id), pos).unwrap();
        }
        assert_eq!(grid.contents_at(pos), &[AgentId(7), AgentId(3), AgentId(5)]);

        grid.remove(AgentId(3)).unwrap();
        assert_eq!(grid.contents_at(pos), &[AgentId(7), AgentId(5)]);
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn move_updates_cells_and_index() {
        let mut grid = Grid::new(4, 4);
        let id = AgentId(1);
        grid.place(id, Position::new(0, 0)).unwrap();
        grid.move_agent(id, Position::new(3, 2)).unwrap();
        assert!(grid.contents_at(Position::new(0, 0)).is_empty());
        assert_eq!(grid.contents_at(Position::new(3, 2)), &[id]);
        assert_eq!(grid.position_of(id), Some(Position::new(3, 2)));
    }

    #[test]
    fn invalid_operations_fail() {
        let mut grid = Grid::new(2, 2);
        assert!(grid.remove(AgentId(1)).is_err());
        assert!(grid.place(AgentId(1), Position::new(2, 0)).is_err());
        grid.place(AgentId(1), Position::new(1, 1)).unwrap();
        assert!(grid.place(AgentId(1), Position::new(0, 0)).is_err());
    }

    #[test]
    fn random_positions_stay_in_bounds() {
        let grid = Grid::new(3, 7);
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        for _ in 0..200 {
            let pos = grid.random_position(&mut rng);
            assert!(pos.x < 3 && pos.y < 7);
        }
    }
}
