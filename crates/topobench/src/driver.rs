//! The session driver behind the `topobench` binary: stage planning and
//! sequencing. The entry point is [run()] with a parsed [Session].

pub use topobench_driver::*;
