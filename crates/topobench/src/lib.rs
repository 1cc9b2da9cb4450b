//! `Topobench` drives throughput and latency measurements over emulated data
//! center topologies. It builds fat-tree, hypercube, and Jellyfish networks,
//! brings them up under Mininet, and measures randomly paired hosts with
//! `ping` and `iperf3`, collecting the raw output per measurement stage.

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod driver;
pub mod frontend;
