//! Predator-prey-grass agent-based model on a torus grid.
//!
//! [`model::Model`] owns the grid, the scheduler and the random stream and
//! runs one tick per [`model::Model::step`]. The remaining modules wrap it
//! into a command-line tool that writes trajectories, checkpoints and
//! analysis results to a simulation directory.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod grid;
pub mod manager;
pub mod model;
pub mod rules;
pub mod scheduler;
pub mod stats;
