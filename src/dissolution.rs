//! Stochastic dissolution of relationships.

use crate::state::Tracker;
use rand::Rng;

/// Whether a relationship survives given both members' draws.
pub fn survives(draw_a: f64, draw_b: f64, survivability: f64) -> bool {
    draw_a < survivability && draw_b < survivability
}

/// Draw one survival sample per member of every active pair and dissolve
/// the pairs in which either member fails.
///
/// Returns the number of dissolved pairs.
pub fn dissolve<R: Rng>(tracker: &mut Tracker, survivability: f64, rng: &mut R) -> usize {
    let n_pairs = tracker.n_pairs();
    tracker.retain_pairs(|_, _| {
        let draw_a: f64 = rng.random();
        let draw_b: f64 = rng.random();
        survives(draw_a, draw_b, survivability)
    });
    n_pairs - tracker.n_pairs()
}
