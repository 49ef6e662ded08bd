/*! Circuit selection over the registry directory.
*/

use rand::seq::index;
use rand::Rng;
use thiserror::Error;

use onion_packet::NodeEntry;

/// Number of relays in every circuit.
pub const CIRCUIT_LENGTH: usize = 3;

/// Error that can happen when picking a circuit.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PickCircuitError {
    /// Directory does not hold enough distinct nodes for a circuit.
    #[error("Directory holds {available} nodes, {required} required")]
    InsufficientNodes {
        /// Nodes a circuit requires.
        required: usize,
        /// Nodes the directory holds.
        available: usize,
    },
}

/** Pick `CIRCUIT_LENGTH` distinct nodes uniformly at random.

Sampling is without replacement over directory indices, so a node id can
never repeat within a circuit (the directory itself is keyed by id).
Selection does not need cryptographically secure randomness.
*/
pub fn pick_circuit<R: Rng>(
    rng: &mut R,
    directory: &[NodeEntry],
) -> Result<[NodeEntry; CIRCUIT_LENGTH], PickCircuitError> {
    if directory.len() < CIRCUIT_LENGTH {
        return Err(PickCircuitError::InsufficientNodes {
            required: CIRCUIT_LENGTH,
            available: directory.len(),
        });
    }
    let picked = index::sample(rng, directory.len(), CIRCUIT_LENGTH);
    Ok([
        directory[picked.index(0)].clone(),
        directory[picked.index(1)].clone(),
        directory[picked.index(2)].clone(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn directory(len: usize) -> Vec<NodeEntry> {
        (0..len as u32)
            .map(|node_id| NodeEntry {
                node_id,
                pub_key: format!("key {}", node_id),
            })
            .collect()
    }

    #[test]
    fn pick_circuit_distinct_ids() {
        let mut rng = thread_rng();
        let directory = directory(5);
        for _ in 0..100 {
            let circuit = pick_circuit(&mut rng, &directory).unwrap();
            let [n_1, n_2, n_3] = &circuit;
            assert_ne!(n_1.node_id, n_2.node_id);
            assert_ne!(n_1.node_id, n_3.node_id);
            assert_ne!(n_2.node_id, n_3.node_id);
            for node in &circuit {
                assert!(directory.contains(node));
            }
        }
    }

    #[test]
    fn pick_circuit_insufficient_nodes() {
        let mut rng = thread_rng();
        for available in 0..CIRCUIT_LENGTH {
            assert_eq!(
                pick_circuit(&mut rng, &directory(available)),
                Err(PickCircuitError::InsufficientNodes {
                    required: CIRCUIT_LENGTH,
                    available,
                })
            );
        }
    }

    #[test]
    fn pick_circuit_exact_directory() {
        let mut rng = thread_rng();
        let directory = directory(CIRCUIT_LENGTH);
        let circuit = pick_circuit(&mut rng, &directory).unwrap();
        let mut ids: Vec<_> = circuit.iter().map(|node| node.node_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
