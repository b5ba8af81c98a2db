//! Agent-based stochastic epidemic simulation in continuous 2D space.
//!
//! A fixed population of agents moves under home attraction, random walk,
//! damping and reflecting boundaries; spatial contacts are detected through
//! a uniform-cell index; each agent advances through an S/E/I/R/D
//! compartment machine with per-agent sojourn timers under configurable
//! transmission, mobility and intervention parameters. The engine exposes a
//! construct/step/snapshot surface for interactive front ends, plus batch
//! run, checkpoint and analysis tooling for the bundled CLI.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod grid;
pub mod manager;
pub mod model;
pub mod motion;
pub mod stats;
