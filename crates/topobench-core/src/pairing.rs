//! Randomized client/server pairing.

use rand::seq::SliceRandom;
use rand::Rng;

/// A one-to-one pairing of clients to servers. `clients[i]` targets
/// `servers[i]`; no other meaning is attached to list positions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Matching<T> {
    pub clients: Vec<T>,
    pub servers: Vec<T>,
}

impl<T> Default for Matching<T> {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            servers: Vec::new(),
        }
    }
}

impl<T> Matching<T> {
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&T, &T)> {
        self.clients.iter().zip(self.servers.iter())
    }
}

impl<T: Clone> Matching<T> {
    /// Servers in reverse list order, used for the cross-pod condition where
    /// client `i` targets server `n - 1 - i`.
    pub fn reversed_servers(&self) -> Vec<T> {
        self.servers.iter().rev().cloned().collect()
    }
}

/// Pairs endpoints uniformly at random: one Fisher-Yates shuffle, then
/// consecutive elements become (client, server) pairs. This has the same
/// distribution as repeatedly drawing two distinct endpoints from a shrinking
/// pool, in O(n).
///
/// An odd leftover endpoint is silently dropped; fewer than two endpoints
/// yields an empty matching.
pub fn random_matching<T, R>(endpoints: &[T], rng: &mut R) -> Matching<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let mut pool = endpoints.to_vec();
    pool.shuffle(rng);
    if pool.len() % 2 != 0 {
        pool.pop();
    }
    let mut clients = Vec::with_capacity(pool.len() / 2);
    let mut servers = Vec::with_capacity(pool.len() / 2);
    for pair in pool.chunks_exact(2) {
        clients.push(pair[0].clone());
        servers.push(pair[1].clone());
    }
    Matching { clients, servers }
}

/// Partitions the endpoints into contiguous pod-sized ranges, matches each
/// partition independently, and concatenates the results in pod order. For a
/// fat-tree, `pod_size` is `k^2 / 4` and every resulting pair stays within
/// its pod.
pub fn pod_scoped_matching<T, R>(endpoints: &[T], pod_size: usize, rng: &mut R) -> Matching<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    assert!(pod_size > 0, "pod size must be positive");
    let mut out = Matching::default();
    for pod in endpoints.chunks(pod_size) {
        let m = random_matching(pod, rng);
        out.clients.extend(m.clients);
        out.servers.extend(m.servers);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn endpoints(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn even_input_is_fully_matched() {
        let mut rng = StdRng::seed_from_u64(0);
        for n in [2, 4, 16, 64] {
            let m = random_matching(&endpoints(n), &mut rng);
            assert_eq!(m.len(), n / 2);
            let used = m
                .clients
                .iter()
                .chain(m.servers.iter())
                .collect::<HashSet<_>>();
            assert_eq!(used.len(), n, "every endpoint appears exactly once");
        }
    }

    #[test]
    fn odd_leftover_is_dropped() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = random_matching(&endpoints(7), &mut rng);
        assert_eq!(m.len(), 3);
        let used = m
            .clients
            .iter()
            .chain(m.servers.iter())
            .collect::<HashSet<_>>();
        assert_eq!(used.len(), 6, "exactly one endpoint is left unpaired");
    }

    #[test]
    fn no_self_pairs() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let m = random_matching(&endpoints(32), &mut rng);
            assert!(m.pairs().all(|(c, s)| c != s));
        }
    }

    #[test]
    fn degenerate_inputs_yield_empty_matching() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(random_matching::<usize, _>(&[], &mut rng).is_empty());
        assert!(random_matching(&[42], &mut rng).is_empty());
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let a = random_matching(&endpoints(16), &mut StdRng::seed_from_u64(7));
        let b = random_matching(&endpoints(16), &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn pod_scoped_pairs_stay_in_pod() {
        let mut rng = StdRng::seed_from_u64(4);
        // k = 4 fat-tree: 16 hosts, pods of k^2/4 = 4
        let m = pod_scoped_matching(&endpoints(16), 4, &mut rng);
        assert_eq!(m.len(), 8);
        for (c, s) in m.pairs() {
            assert_eq!(c / 4, s / 4, "pair ({c}, {s}) crosses pods");
        }
    }

    #[test]
    fn pod_subset_of_four_returns_two_pairs() {
        let mut rng = StdRng::seed_from_u64(5);
        let m = random_matching(&endpoints(4), &mut rng);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn reversed_servers_reverses() {
        let m = Matching {
            clients: vec![1, 2, 3],
            servers: vec![4, 5, 6],
        };
        assert_eq!(m.reversed_servers(), vec![6, 5, 4]);
    }
}
