//! The Mininet frontend. The entry point is [MininetEmulation], which writes
//! the runner's input files, starts the emulation, and hands back a
//! [RunningNetwork] for command execution inside hosts.

pub use mininet_frontend::*;
