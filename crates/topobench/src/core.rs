//! Core topobench data structures and routines: topologies and their
//! builders, client/server pairing, and the worker process harness.

pub use topobench_core::*;
