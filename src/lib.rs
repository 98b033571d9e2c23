//! Stochastic agent-based model of relationship formation and dissolution.
//!
//! Agents are matched in random batches according to a directional attraction
//! kernel of their beauty values, and every relationship survives each step
//! only if both members independently choose to continue it.

pub mod analysis;
pub mod config;
pub mod dissolution;
pub mod engine;
pub mod manager;
pub mod matching;
pub mod model;
pub mod state;
pub mod stats;
