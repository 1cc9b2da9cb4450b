//! The measurement driver: command-line parsing, stage planning, and the
//! sequencing of measurement stages against a running emulation.

#![warn(unreachable_pub, missing_debug_implementations)]

mod results;
mod runner;
mod session;
mod stages;

pub use runner::run;
pub use session::{Session, TopoKind};
