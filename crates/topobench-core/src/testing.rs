//! Canned fixtures shared by this crate's tests and the frontend's.

use crate::network::types::{Layer, Link, Node, NodeId};

/// One flat switch with `nr_hosts` hosts hanging off it.
pub fn star_config(nr_hosts: usize) -> (Vec<Node>, Vec<Link>) {
    let switch = Node::new_switch(NodeId::new(0), "s0", Layer::Flat);
    let mut nodes = vec![switch];
    let mut links = Vec::new();
    for i in 0..nr_hosts {
        let id = NodeId::new(1 + i);
        nodes.push(Node::new_host(id, format!("h{i}"), Some(NodeId::new(0))));
        links.push(Link::new(NodeId::new(0), id));
    }
    (nodes, links)
}
