use std::collections::HashSet;

use petgraph::graph::{NodeIndex, UnGraph};
use rustc_hash::FxHashMap;

use crate::network::types::{Link, Node, NodeId};

/// An immutable topology over hosts and switches. Built once per session from
/// structural parameters and handed to the emulator frontend unchanged.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<Node, Link>,
    id2idx: FxHashMap<NodeId, NodeIndex>,
}

impl Topology {
    /// Creates a topology from a list of nodes and links. This function returns
    /// an error if the given wiring fails to produce a valid topology.
    ///
    /// Correctness properties:
    ///
    /// - Every node must have a unique ID.
    /// - Every link must have distinct endpoints in `nodes`.
    /// - For any two nodes, there must be at most one link between them.
    /// - Every host must have exactly one attachment link.
    /// - Every node must be referenced by some link.
    pub fn new(nodes: &[Node], links: &[Link]) -> Result<Self, TopologyError> {
        let mut g = UnGraph::default();
        let mut id2idx = FxHashMap::default();
        for n in nodes.iter().cloned() {
            let id = n.id;
            let idx = g.add_node(n);
            if id2idx.insert(id, idx).is_some() {
                // CORRECTNESS: Every node must have a unique ID.
                return Err(TopologyError::DuplicateNodeId(id));
            }
        }
        let mut seen = HashSet::new();
        for link in links.iter().cloned() {
            let Link { a, b, .. } = link;
            // CORRECTNESS: Every link must have distinct endpoints in `nodes`.
            if a == b {
                return Err(TopologyError::SelfLoop(a));
            }
            let &ai = id2idx.get(&a).ok_or(TopologyError::UndeclaredNode(a))?;
            let &bi = id2idx.get(&b).ok_or(TopologyError::UndeclaredNode(b))?;
            // CORRECTNESS: For any two nodes, there must be at most one link
            // between them.
            let key = if a < b { (a, b) } else { (b, a) };
            if !seen.insert(key) {
                return Err(TopologyError::DuplicateLink { n1: a, n2: b });
            }
            g.add_edge(ai, bi, link);
        }
        for (&id, &idx) in &id2idx {
            let degree = g.edges(idx).count();
            // CORRECTNESS: Every node must be referenced by some link.
            // The single-node topology is the degenerate exception.
            if degree == 0 && nodes.len() > 1 {
                return Err(TopologyError::IsolatedNode(id));
            }
            // CORRECTNESS: Every host must have exactly one attachment link.
            if g[idx].is_host() && degree > 1 {
                return Err(TopologyError::TooManyHostLinks { id, n: degree });
            }
        }
        Ok(Self { graph: g, id2idx })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.edge_weights()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_host())
    }

    pub fn switches(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.is_switch())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.id2idx.get(&id).map(|&idx| &self.graph[idx])
    }

    /// The number of links touching `id`.
    pub fn degree(&self, id: NodeId) -> Option<usize> {
        self.id2idx.get(&id).map(|&idx| self.graph.edges(idx).count())
    }

    pub fn nr_hosts(&self) -> usize {
        self.hosts().count()
    }

    pub fn nr_switches(&self) -> usize {
        self.switches().count()
    }

    pub fn nr_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Host names in builder order, the order pairings index into.
    pub fn host_names(&self) -> Vec<&str> {
        self.hosts().map(|h| h.name.as_str()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Duplicate node ID {0}")]
    DuplicateNodeId(NodeId),

    #[error("Node {0} is linked to itself")]
    SelfLoop(NodeId),

    #[error("Node {0} is not declared")]
    UndeclaredNode(NodeId),

    #[error("Duplicate links between {n1} and {n2}")]
    DuplicateLink { n1: NodeId, n2: NodeId },

    #[error("Host {id} has too many links (expected 1, got {n})")]
    TooManyHostLinks { id: NodeId, n: usize },

    #[error("Node {0} is not connected to any other node")]
    IsolatedNode(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::types::Layer;

    fn host(id: usize) -> Node {
        Node::new_host(NodeId::new(id), format!("h{id}"), None)
    }

    fn switch(id: usize) -> Node {
        Node::new_switch(NodeId::new(id), format!("s{id}"), Layer::Flat)
    }

    #[test]
    fn empty_topology_succeeds() {
        assert!(
            Topology::new(&[], &[]).is_ok(),
            "failed to create empty topology"
        );
    }

    #[test]
    fn three_node_topology_succeeds() {
        let (n1, n2, n3) = (host(0), host(1), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let res = Topology::new(&[n1, n2, n3], &[l1, l2]);
        assert!(res.is_ok());
    }

    #[test]
    fn single_node_pair_topology_succeeds() {
        // The `a = 0` hypercube degenerates to one switch and one host.
        let (h, s) = (host(0), switch(1));
        let l = Link::new(h.id, s.id);
        assert!(Topology::new(&[h, s], &[l]).is_ok());
    }

    #[test]
    fn duplicate_node_fails() {
        let (n1, n2, n3) = (host(0), host(0), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let res = Topology::new(&[n1, n2, n3], &[l1, l2]);
        assert!(matches!(res, Err(TopologyError::DuplicateNodeId(..))));
    }

    #[test]
    fn self_loop_fails() {
        let (n1, n2, n3) = (host(0), host(1), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let l3 = Link::new(n3.id, n3.id); // error
        let res = Topology::new(&[n1, n2, n3], &[l1, l2, l3]);
        assert!(matches!(res, Err(TopologyError::SelfLoop(..))));
    }

    #[test]
    fn undeclared_node_fails() {
        let (n1, n2, n3) = (host(0), host(1), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let l3 = Link::new(NodeId::new(3), n3.id); // error
        let res = Topology::new(&[n1, n2, n3], &[l1, l2, l3]);
        assert!(matches!(res, Err(TopologyError::UndeclaredNode(..))));
    }

    #[test]
    fn duplicate_links_fails() {
        let (n1, n2, n3) = (host(0), host(1), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let l3 = Link::new(n3.id, n2.id); // error, regardless of direction
        let res = Topology::new(&[n1, n2, n3], &[l1, l2, l3]);
        assert!(matches!(res, Err(TopologyError::DuplicateLink { .. })));
    }

    #[test]
    fn too_many_host_links_fails() {
        let (n1, n2, n3, n4) = (host(0), host(1), switch(2), switch(3));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let l3 = Link::new(n1.id, n4.id); // error
        let res = Topology::new(&[n1, n2, n3, n4], &[l1, l2, l3]);
        assert!(matches!(
            res,
            Err(TopologyError::TooManyHostLinks { n: 2, .. })
        ));
    }

    #[test]
    fn isolated_node_fails() {
        let (n1, n2, n3, n4) = (host(0), host(1), switch(2), host(3));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let res = Topology::new(&[n1, n2, n3, n4], &[l1, l2]);
        assert!(matches!(res, Err(TopologyError::IsolatedNode(..))));
    }

    #[test]
    fn host_names_follow_builder_order() {
        let (n1, n2, n3) = (host(0), host(1), switch(2));
        let l1 = Link::new(n1.id, n3.id);
        let l2 = Link::new(n2.id, n3.id);
        let topo = Topology::new(&[n1, n2, n3], &[l1, l2]).unwrap();
        assert_eq!(topo.host_names(), vec!["h0", "h1"]);
    }
}
