//! The process harness: fire-and-forget launching of measurement commands and
//! deadline-bounded multiplexing of their output.
//!
//! All concurrency lives in OS processes and their reader threads; the
//! harness itself is driven from a single control thread. Each worker gets a
//! dedicated reader thread that feeds a shared channel, so the monitor never
//! blocks on one slow process while another has output ready.

use std::collections::BTreeMap;
use std::io;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;

identifier!(WorkerId, usize);

/// Where a worker process is in its lifecycle. Exiting non-zero is not an
/// error to the harness; callers inspect results after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Exited(ExitStatus),
    /// Killed by the monitor: at deadline expiry, or for outliving its own
    /// closed stdout.
    Cancelled,
}

#[derive(Debug)]
struct Worker {
    child: Child,
    status: WorkerStatus,
    /// Whether the worker's stdout has hit EOF. Closing stdout and exiting
    /// are distinct events; a worker may close its output and live on.
    drained: bool,
}

enum Event {
    Line(WorkerId, String),
    Eof(WorkerId),
}

/// A batch of concurrently running worker processes, keyed by logical worker
/// ID (typically the pair index).
#[derive(Debug)]
pub struct Harness {
    workers: FxHashMap<WorkerId, Worker>,
    events: Receiver<Event>,
    nr_undrained: usize,
}

impl Harness {
    /// Launches every command immediately as a background `sh -c` process
    /// with captured stdout. No queuing or throttling: all commands fire
    /// concurrently, and this never waits on any of them.
    ///
    /// Failing to spawn the shell itself is an error; a missing binary
    /// *inside* the shell is not — it surfaces as a fast exit with no output.
    pub fn launch(commands: &BTreeMap<WorkerId, String>) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut workers = FxHashMap::default();
        for (&id, cmd) in commands {
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .stdin(Stdio::null())
                .spawn()?;
            let stdout = child.stdout.take().unwrap(); // stdout is piped
            let tx = tx.clone();
            thread::spawn(move || read_lines(id, stdout, tx));
            workers.insert(
                id,
                Worker {
                    child,
                    status: WorkerStatus::Running,
                    drained: false,
                },
            );
        }
        Ok(Self {
            nr_undrained: workers.len(),
            workers,
            events: rx,
        })
    }

    /// Multiplexes worker output until every worker's stdout is drained, or
    /// until `deadline` elapses, whichever comes first. Either way, any
    /// worker still running when the monitor finishes is killed and marked
    /// [`WorkerStatus::Cancelled`]; the monitor never blocks on a worker's
    /// exit, so it returns on time no matter what the workers do.
    ///
    /// Lines from one worker never reorder; no order is promised between
    /// workers. A monitor is not restartable — launch a fresh harness per
    /// stage.
    pub fn monitor(&mut self, deadline: Duration) -> Monitor<'_> {
        Monitor {
            deadline: Instant::now() + deadline,
            harness: self,
        }
    }

    /// The status of a worker, once the monitor has returned.
    pub fn status(&self, id: WorkerId) -> Option<WorkerStatus> {
        self.workers.get(&id).map(|w| w.status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = (WorkerId, WorkerStatus)> + '_ {
        self.workers.iter().map(|(&id, w)| (id, w.status))
    }

    fn reap(&mut self, id: WorkerId) {
        if let Some(w) = self.workers.get_mut(&id) {
            if w.status == WorkerStatus::Running {
                // Most workers exit right before their stdout closes, but a
                // worker may close stdout and keep running. Never block on
                // it here; whatever is still running when the monitor winds
                // down gets killed through `cancel_running`.
                if let Ok(Some(status)) = w.child.try_wait() {
                    w.status = WorkerStatus::Exited(status);
                }
            }
            if !w.drained {
                w.drained = true;
                self.nr_undrained -= 1;
            }
        }
    }

    fn cancel_running(&mut self) {
        for w in self.workers.values_mut() {
            if w.status == WorkerStatus::Running {
                let _ = w.child.kill();
                let _ = w.child.wait();
                w.status = WorkerStatus::Cancelled;
            }
        }
    }
}

fn read_lines(id: WorkerId, stdout: ChildStdout, tx: Sender<Event>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.send(Event::Line(id, line)).is_err() {
                    // Harness dropped; nobody is listening anymore.
                    return;
                }
            }
            Err(_) => break,
        }
    }
    let _ = tx.send(Event::Eof(id));
}

/// A finite stream of `(worker, line)` records. See [`Harness::monitor`].
#[derive(Debug)]
pub struct Monitor<'a> {
    harness: &'a mut Harness,
    deadline: Instant,
}

impl Iterator for Monitor<'_> {
    type Item = (WorkerId, String);

    fn next(&mut self) -> Option<Self::Item> {
        while self.harness.nr_undrained > 0 {
            match self.harness.events.recv_deadline(self.deadline) {
                Ok(Event::Line(id, line)) => return Some((id, line)),
                Ok(Event::Eof(id)) => self.harness.reap(id),
                Err(RecvTimeoutError::Timeout) => {
                    self.harness.cancel_running();
                    return None;
                }
                // All reader threads are gone; every remaining Eof event
                // was drained above.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Every stdout has closed, but a worker that shut its output early
        // may still be running; it gets the same treatment as a deadline
        // overrun.
        self.harness.cancel_running();
        None
    }
}
