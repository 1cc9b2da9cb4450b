//! Deterministic topology builders.
//!
//! Each builder maps structural parameters onto a concrete set of switches,
//! hosts, and links. Jellyfish topologies are not built here: their wiring
//! comes from the external random-regular-graph generator bundled with the
//! emulator runner, and only its host list is consumed downstream.

use itertools::iproduct;

use crate::network::types::{Layer, Link, Node, NodeId};
use crate::network::{Topology, TopologyError};
use crate::units::{Mbps, Microsecs};

/// Fat-tree link rates, matching the emulator's interface shaping.
const FT_BANDWIDTH: Mbps = Mbps::new(1000);
const FT_DELAY: Microsecs = Microsecs::new(100);

/// Hypercube interfaces are shaped far below line rate so that contention is
/// observable on a single machine.
const CUBE_BANDWIDTH: Mbps = Mbps::new(10);
const CUBE_DELAY: Microsecs = Microsecs::new(2000);

/// Number of bit positions in which `x` and `y` differ, restricted to the low
/// `dim` bits.
fn bit_mismatches(mut x: usize, mut y: usize, dim: u32) -> u32 {
    let mut cnt = 0;
    for _ in 0..dim {
        if x % 2 != y % 2 {
            cnt += 1;
        }
        x /= 2;
        y /= 2;
    }
    cnt
}

/// Builds a `dim`-dimensional hypercube of `2^dim` switches, with one host
/// hanging off each switch. Switches are adjacent iff their indices are at
/// Hamming distance 1. `dim = 0` degenerates to a single switch/host pair.
///
/// PRECONDITION: `2^dim` must fit in `usize`. The driver caps the dimension
/// far below that.
pub fn hypercube(dim: u32) -> Result<Topology, TopologyError> {
    let n = 1usize << dim;
    let switch_id = |i: usize| NodeId::new(i);
    let host_id = |i: usize| NodeId::new(n + i);

    let mut nodes = Vec::with_capacity(2 * n);
    for i in 0..n {
        nodes.push(Node::new_switch(switch_id(i), format!("s{i}"), Layer::Flat));
    }
    for i in 0..n {
        nodes.push(Node::new_host(host_id(i), format!("h{i}"), Some(switch_id(i))));
    }

    let mut links = Vec::new();
    for i in 0..n {
        links.push(
            Link::new(switch_id(i), host_id(i))
                .with_bandwidth(CUBE_BANDWIDTH)
                .with_delay(CUBE_DELAY),
        );
    }
    for (i, j) in iproduct!(0..n, 0..n) {
        if i < j && bit_mismatches(i, j, dim) == 1 {
            links.push(
                Link::new(switch_id(i), switch_id(j))
                    .with_bandwidth(CUBE_BANDWIDTH)
                    .with_delay(CUBE_DELAY),
            );
        }
    }
    Topology::new(&nodes, &links)
}

/// The numeric prefix loses a zero once the sequential index reaches two
/// digits, keeping every name at the same overall width ("1001".."1009",
/// then "1010", ...).
fn layer_name(base: usize, idx: usize) -> String {
    if idx < 10 {
        format!("{base}00{idx}")
    } else {
        format!("{base}0{idx}")
    }
}

/// Builds a `k`-ary fat-tree: `(k/2)^2` core switches, `k/2 * k` aggregation
/// and edge switches, and `k/2` hosts per edge switch.
///
/// PRECONDITION: `k` must be even. Odd `k` produces an asymmetric wiring and
/// is not validated here.
pub fn fat_tree(k: usize) -> Result<Topology, TopologyError> {
    let half = k / 2;
    let nr_core = half * half;
    let nr_agg = half * k;
    let nr_edge = half * k;
    let nr_hosts = nr_edge * half;

    let core_id = |i: usize| NodeId::new(i);
    let agg_id = |i: usize| NodeId::new(nr_core + i);
    let edge_id = |i: usize| NodeId::new(nr_core + nr_agg + i);
    let host_id = |i: usize| NodeId::new(nr_core + nr_agg + nr_edge + i);

    let mut nodes = Vec::with_capacity(nr_core + nr_agg + nr_edge + nr_hosts);
    for i in 0..nr_core {
        nodes.push(Node::new_switch(core_id(i), layer_name(1, i + 1), Layer::Core));
    }
    for i in 0..nr_agg {
        nodes.push(Node::new_switch(agg_id(i), layer_name(2, i + 1), Layer::Agg));
    }
    for i in 0..nr_edge {
        nodes.push(Node::new_switch(edge_id(i), layer_name(3, i + 1), Layer::Edge));
    }
    for i in 0..nr_hosts {
        nodes.push(Node::new_host(
            host_id(i),
            layer_name(4, i + 1),
            Some(edge_id(i / half)),
        ));
    }

    let mut links = Vec::new();
    // Aggregation uplinks cycle through contiguous core blocks of size k/2,
    // wrapping every k/2 aggregation switches, so that within a pod every
    // core switch is reached exactly once.
    let mut pod_slot = 0;
    for a in 0..nr_agg {
        for x in 0..half {
            links.push(
                Link::new(agg_id(a), core_id(pod_slot * half + x))
                    .with_bandwidth(FT_BANDWIDTH)
                    .with_delay(FT_DELAY),
            );
        }
        pod_slot += 1;
        if pod_slot >= half {
            pod_slot = 0;
        }
    }
    // Full bipartite aggregation <-> edge wiring inside each pod.
    for pod in 0..k {
        for (x, y) in iproduct!(0..half, 0..half) {
            links.push(
                Link::new(agg_id(pod * half + x), edge_id(pod * half + y))
                    .with_bandwidth(FT_BANDWIDTH)
                    .with_delay(FT_DELAY),
            );
        }
    }
    // k/2 hosts per edge switch. Host links are bandwidth-only.
    for e in 0..nr_edge {
        for p in 0..half {
            links.push(Link::new(edge_id(e), host_id(e * half + p)).with_bandwidth(FT_BANDWIDTH));
        }
    }
    Topology::new(&nodes, &links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::types::NodeKind;

    #[test]
    fn hypercube_counts() -> anyhow::Result<()> {
        for dim in 0..=4 {
            let n = 1 << dim;
            let topo = hypercube(dim)?;
            assert_eq!(topo.nr_switches(), n);
            assert_eq!(topo.nr_hosts(), n);
            // n host links plus dim * 2^(dim-1) switch-switch links
            let nr_cube_edges = dim as usize * n / 2;
            assert_eq!(topo.nr_links(), n + nr_cube_edges);
        }
        Ok(())
    }

    #[test]
    fn hypercube_dim_two_edge_set() -> anyhow::Result<()> {
        let topo = hypercube(2)?;
        let expected = [(0, 1), (0, 2), (1, 3), (2, 3)];
        let cube_links = topo
            .links()
            .filter(|l| {
                topo.node(l.a).unwrap().is_switch() && topo.node(l.b).unwrap().is_switch()
            })
            .collect::<Vec<_>>();
        assert_eq!(cube_links.len(), expected.len());
        for (i, j) in expected {
            assert!(
                cube_links
                    .iter()
                    .any(|l| l.connects(NodeId::new(i), NodeId::new(j))),
                "missing hypercube edge ({i}, {j})"
            );
        }
        Ok(())
    }

    #[test]
    fn hypercube_switch_degree_is_dim_plus_host() -> anyhow::Result<()> {
        let dim = 3;
        let topo = hypercube(dim)?;
        for s in topo.switches() {
            assert_eq!(topo.degree(s.id), Some(dim as usize + 1));
        }
        for h in topo.hosts() {
            assert_eq!(topo.degree(h.id), Some(1));
        }
        Ok(())
    }

    #[test]
    fn hypercube_degenerate_dimension() -> anyhow::Result<()> {
        let topo = hypercube(0)?;
        assert_eq!(topo.nr_switches(), 1);
        assert_eq!(topo.nr_hosts(), 1);
        assert_eq!(topo.nr_links(), 1);
        Ok(())
    }

    #[test]
    fn fat_tree_counts() -> anyhow::Result<()> {
        let k = 4;
        let topo = fat_tree(k)?;
        let layer_count = |layer| {
            topo.switches()
                .filter(|s| matches!(s.kind, NodeKind::Switch { layer: l } if l == layer))
                .count()
        };
        assert_eq!(layer_count(Layer::Core), 4);
        assert_eq!(layer_count(Layer::Agg), 8);
        assert_eq!(layer_count(Layer::Edge), 8);
        assert_eq!(topo.nr_hosts(), 16);
        Ok(())
    }

    #[test]
    fn fat_tree_edge_switch_wiring() -> anyhow::Result<()> {
        let k = 4;
        let topo = fat_tree(k)?;
        let edges = topo
            .switches()
            .filter(|s| matches!(s.kind, NodeKind::Switch { layer: Layer::Edge }))
            .collect::<Vec<_>>();
        for e in edges {
            let host_links = topo
                .links()
                .filter(|l| {
                    l.a == e.id && topo.node(l.b).unwrap().is_host()
                        || l.b == e.id && topo.node(l.a).unwrap().is_host()
                })
                .count();
            assert_eq!(host_links, k / 2);
            // k/2 host links + k/2 aggregation links
            assert_eq!(topo.degree(e.id), Some(k));
        }
        Ok(())
    }

    #[test]
    fn fat_tree_core_reached_once_per_pod() -> anyhow::Result<()> {
        let k = 4;
        let half = k / 2;
        let nr_core = half * half;
        let topo = fat_tree(k)?;
        for core in 0..nr_core {
            let core = NodeId::new(core);
            for pod in 0..k {
                let pod_aggs = (pod * half..(pod + 1) * half)
                    .map(|i| NodeId::new(nr_core + i))
                    .collect::<Vec<_>>();
                let reached = topo
                    .links()
                    .filter(|l| pod_aggs.iter().any(|&a| l.connects(a, core)))
                    .count();
                assert_eq!(reached, 1, "core {core} should be reached once by pod {pod}");
            }
        }
        Ok(())
    }

    #[test]
    fn fat_tree_host_links_are_bandwidth_only() -> anyhow::Result<()> {
        let topo = fat_tree(4)?;
        for link in topo.links() {
            let host_facing =
                topo.node(link.a).unwrap().is_host() || topo.node(link.b).unwrap().is_host();
            assert!(link.bandwidth.is_some());
            assert_eq!(link.delay.is_none(), host_facing);
        }
        Ok(())
    }

    #[test]
    fn fat_tree_names_keep_fixed_width() -> anyhow::Result<()> {
        let topo = fat_tree(6)?;
        for node in topo.nodes() {
            assert_eq!(node.name.len(), 4, "name {} is not 4 wide", node.name);
        }
        // 10th edge switch drops a prefix zero
        assert!(topo.nodes().any(|n| n.name == "3009"));
        assert!(topo.nodes().any(|n| n.name == "3010"));
        Ok(())
    }
}
