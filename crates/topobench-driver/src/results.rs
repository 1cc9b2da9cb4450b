//! Raw measurement output, appended line by line as the monitor yields it.

use std::fs::{File, OpenOptions};
use std::io;
use std::io::{BufWriter, Write};
use std::path::Path;

use topobench_core::WorkerId;

/// Appends `<worker>: <line>` records to one per-stage results file.
#[derive(Debug)]
pub(crate) struct ResultSink {
    out: BufWriter<File>,
}

impl ResultSink {
    /// Opens `path` for appending, creating it if needed. Re-running a stage
    /// extends its file rather than clobbering it.
    pub(crate) fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub(crate) fn record(&mut self, worker: WorkerId, line: &str) -> io::Result<()> {
        writeln!(self.out, "{worker}: {line}")
    }

    pub(crate) fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_tagged_and_appended() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ft_stp_k4_ping_results_same_pod");

        let mut sink = ResultSink::append_to(&path)?;
        sink.record(WorkerId::new(0), "64 bytes from 10.0.0.2")?;
        sink.record(WorkerId::new(3), "rtt min/avg/max")?;
        sink.finish()?;

        // A second sink on the same path must extend, not truncate.
        let mut sink = ResultSink::append_to(&path)?;
        sink.record(WorkerId::new(0), "later line")?;
        sink.finish()?;

        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(
            contents,
            "0: 64 bytes from 10.0.0.2\n3: rtt min/avg/max\n0: later line\n"
        );
        Ok(())
    }
}
