pub mod topology;
pub mod types;

pub use topology::{Topology, TopologyError};
pub use types::*;
