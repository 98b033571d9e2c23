//! Batching and greedy matching of single agents.

use crate::model::InteractionMatrix;
use rand::Rng;
use std::slice::Chunks;

/// Split shuffled ids into consecutive batches of `batch_size` ids.
///
/// The last batch holds the remainder.
pub fn partition(ids: &[usize], batch_size: usize) -> Chunks<'_, usize> {
    debug_assert!(batch_size > 0);
    ids.chunks(batch_size)
}

/// Match the agents of one batch, returning the new pairs as agent ids.
///
/// The batch order is the priority order: earlier agents pick first.
pub fn match_batch<R: Rng>(
    batch: &[usize],
    matrix: &InteractionMatrix,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let n_batch = batch.len();
    let draws: Vec<f64> = (0..n_batch * n_batch).map(|_| rng.random()).collect();
    let compat = compatibility(batch, matrix, &draws);
    resolve(n_batch, &compat)
        .into_iter()
        .map(|(i, j)| (batch[i], batch[j]))
        .collect()
}

/// Mutual acceptance of every ordered pair of batch positions.
///
/// `draws` is a row-major `n x n` matrix of uniform values in `[0, 1)`.
/// Positions `i` and `j` are compatible if each one's attraction towards
/// the other exceeds its own draw.
fn compatibility(batch: &[usize], matrix: &InteractionMatrix, draws: &[f64]) -> Vec<bool> {
    let n_batch = batch.len();
    debug_assert_eq!(draws.len(), n_batch * n_batch);

    let mut compat = vec![false; n_batch * n_batch];
    for (i, &id_i) in batch.iter().enumerate() {
        for (j, &id_j) in batch.iter().enumerate() {
            if i == j {
                continue;
            }
            compat[i * n_batch + j] = matrix.get(id_i, id_j) > draws[i * n_batch + j]
                && matrix.get(id_j, id_i) > draws[j * n_batch + i];
        }
    }
    compat
}

/// Greedy first-preference resolution.
///
/// Each unclaimed position, in ascending order, takes the first unclaimed
/// compatible position. Not a stable or maximum matching.
fn resolve(n_batch: usize, compat: &[bool]) -> Vec<(usize, usize)> {
    let mut claimed = vec![false; n_batch];
    let mut pairs = Vec::new();
    for i in 0..n_batch {
        if claimed[i] {
            continue;
        }
        let partner = (0..n_batch).find(|&j| !claimed[j] && compat[i * n_batch + j]);
        if let Some(j) = partner {
            claimed[i] = true;
            claimed[j] = true;
            pairs.push((i, j));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, Attraction};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn matrix(beauties: &[f64]) -> InteractionMatrix {
        let agt_vec: Vec<_> = beauties
            .iter()
            .enumerate()
            .map(|(id, &beauty)| Agent::new(id, beauty))
            .collect();
        InteractionMatrix::build(&agt_vec, &Attraction::new(0.42))
    }

    fn compat_from(n_batch: usize, edges: &[(usize, usize)]) -> Vec<bool> {
        let mut compat = vec![false; n_batch * n_batch];
        for &(i, j) in edges {
            compat[i * n_batch + j] = true;
            compat[j * n_batch + i] = true;
        }
        compat
    }

    #[test]
    fn partition_sizes() {
        for n_ids in 0..40 {
            for batch_size in 1..12 {
                let ids: Vec<_> = (0..n_ids).collect();
                let batches: Vec<_> = partition(&ids, batch_size).collect();

                assert_eq!(batches.len(), n_ids.div_ceil(batch_size));
                assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), n_ids);
                assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
                assert!(batches.iter().filter(|b| b.len() < batch_size).count() <= 1);
                assert_eq!(batches.concat(), ids);
            }
        }
    }

    #[test]
    fn earlier_positions_win_ties() {
        let compat = compat_from(4, &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(resolve(4, &compat), vec![(0, 1), (2, 3)]);

        let compat = compat_from(4, &[(0, 2), (1, 2), (1, 3)]);
        assert_eq!(resolve(4, &compat), vec![(0, 2), (1, 3)]);
    }

    #[test]
    fn greedy_resolution_is_not_maximum() {
        // 0 takes 1, leaving 2 without its only partner.
        let compat = compat_from(3, &[(0, 1), (1, 2)]);
        assert_eq!(resolve(3, &compat), vec![(0, 1)]);
    }

    #[test]
    fn unmatched_positions_stay_single() {
        let compat = compat_from(5, &[(3, 4)]);
        assert_eq!(resolve(5, &compat), vec![(3, 4)]);
        assert!(resolve(5, &compat_from(5, &[])).is_empty());
    }

    #[test]
    fn compatibility_requires_both_directions() {
        let matrix = matrix(&[1.0, 10.0]);
        let up = matrix.get(0, 1);
        let down = matrix.get(1, 0);
        assert!(down < up);

        let draws = [0.0, up / 2.0, down / 2.0, 0.0];
        assert_eq!(compatibility(&[0, 1], &matrix, &draws), vec![false, true, true, false]);

        let draws = [0.0, up / 2.0, down * 2.0, 0.0];
        assert_eq!(compatibility(&[0, 1], &matrix, &draws), vec![false; 4]);
    }

    #[test]
    fn compatibility_uses_original_ids() {
        let matrix = matrix(&[5.0, 1.0, 5.0, 10.0]);
        let batch = [3, 1];
        let draws = [0.0, matrix.get(3, 1) * 0.99, matrix.get(1, 3) * 0.99, 0.0];
        assert_eq!(compatibility(&batch, &matrix, &draws), vec![false, true, true, false]);
    }

    #[test]
    fn equal_agents_pair_when_both_draws_succeed() {
        let matrix = matrix(&[5.0, 5.0]);
        let norm = Attraction::new(0.42).norm();
        let draws = [0.0, norm * 0.5, norm * 0.5, 0.0];
        let compat = compatibility(&[1, 0], &matrix, &draws);
        assert_eq!(resolve(2, &compat), vec![(0, 1)]);

        let draws = [0.0, norm * 0.5, norm, 0.0];
        let compat = compatibility(&[1, 0], &matrix, &draws);
        assert!(resolve(2, &compat).is_empty());
    }

    #[test]
    fn single_agent_batch_never_matches() {
        let matrix = matrix(&[5.0, 5.0, 5.0]);
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(match_batch(&[2], &matrix, &mut rng).is_empty());
        }
    }

    #[test]
    fn matched_pairs_are_disjoint_batch_members() {
        let beauties: Vec<_> = (0..60).map(|i| 1.0 + 0.15 * i as f64).collect();
        let matrix = matrix(&beauties);
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let batch: Vec<_> = (0..60).rev().collect();
        for _ in 0..50 {
            let pairs = match_batch(&batch, &matrix, &mut rng);
            let mut seen = vec![false; 60];
            for (a, b) in pairs {
                assert_ne!(a, b);
                for id in [a, b] {
                    assert!(!seen[id]);
                    seen[id] = true;
                }
            }
        }
    }
}
