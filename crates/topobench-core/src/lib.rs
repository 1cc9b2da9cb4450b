#![warn(unreachable_pub, missing_debug_implementations)]

//! The core topobench library. This crate builds the synthetic datacenter
//! topologies under test (hypercube and fat-tree), generates randomized
//! client/server matchings over their hosts, and runs batches of external
//! measurement commands through the [process harness](harness::Harness).

#[macro_use]
mod ident;

pub mod builders;
pub mod harness;
pub mod network;
pub mod pairing;
pub mod units;

pub mod testing;

pub use harness::{Harness, Monitor, WorkerId, WorkerStatus};
pub use network::{
    topology::TopologyError,
    types::{Layer, Link, Node, NodeId, NodeKind},
    Topology,
};
pub use pairing::{pod_scoped_matching, random_matching, Matching};
