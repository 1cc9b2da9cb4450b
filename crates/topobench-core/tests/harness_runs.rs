use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use topobench_core::{Harness, WorkerId, WorkerStatus};

fn commands(cmds: &[&str]) -> BTreeMap<WorkerId, String> {
    cmds.iter()
        .enumerate()
        .map(|(i, c)| (WorkerId::new(i), c.to_string()))
        .collect()
}

#[test]
fn deadline_cancels_the_sleeper() -> anyhow::Result<()> {
    let cmds = commands(&["printf 'a\\nb\\n'", "echo c", "sleep 30"]);
    let mut harness = Harness::launch(&cmds)?;

    let started = Instant::now();
    let lines: Vec<_> = harness.monitor(Duration::from_secs(2)).collect();
    let elapsed = started.elapsed();

    // The monitor must return at the deadline, not when the sleeper does.
    assert!(elapsed < Duration::from_secs(10), "monitor overran: {elapsed:?}");

    let by_worker = |id: usize| {
        lines
            .iter()
            .filter(|(w, _)| *w == WorkerId::new(id))
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(by_worker(0), vec!["a", "b"]);
    assert_eq!(by_worker(1), vec!["c"]);
    assert_eq!(by_worker(2), Vec::<&str>::new());

    assert!(matches!(
        harness.status(WorkerId::new(0)),
        Some(WorkerStatus::Exited(status)) if status.success()
    ));
    assert!(matches!(
        harness.status(WorkerId::new(1)),
        Some(WorkerStatus::Exited(status)) if status.success()
    ));
    assert_eq!(harness.status(WorkerId::new(2)), Some(WorkerStatus::Cancelled));
    Ok(())
}

#[test]
fn per_worker_line_order_is_preserved() -> anyhow::Result<()> {
    let cmds = commands(&[
        "for i in $(seq 1 50); do echo a$i; done",
        "for i in $(seq 1 50); do echo b$i; done",
    ]);
    let mut harness = Harness::launch(&cmds)?;
    let lines: Vec<_> = harness.monitor(Duration::from_secs(30)).collect();

    for (worker, prefix) in [(0, "a"), (1, "b")] {
        let got = lines
            .iter()
            .filter(|(w, _)| *w == WorkerId::new(worker))
            .map(|(_, l)| l.clone())
            .collect::<Vec<_>>();
        let expected = (1..=50).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>();
        assert_eq!(got, expected);
    }
    Ok(())
}

#[test]
fn empty_batch_finishes_immediately() -> anyhow::Result<()> {
    let mut harness = Harness::launch(&BTreeMap::new())?;
    assert_eq!(harness.monitor(Duration::from_secs(30)).next(), None);
    Ok(())
}

#[test]
fn missing_binary_is_not_a_harness_error() -> anyhow::Result<()> {
    let cmds = commands(&["definitely-not-a-real-binary-5b2e"]);
    let mut harness = Harness::launch(&cmds)?;
    let lines: Vec<_> = harness.monitor(Duration::from_secs(30)).collect();
    // No output lines; the failure shows up only in the exit status.
    assert!(lines.is_empty());
    assert!(matches!(
        harness.status(WorkerId::new(0)),
        Some(WorkerStatus::Exited(status)) if !status.success()
    ));
    Ok(())
}

#[test]
fn closed_stdout_does_not_stall_the_monitor() -> anyhow::Result<()> {
    // The worker closes its stdout and then lives on well past the deadline.
    let cmds = commands(&["echo early; exec 1>&-; sleep 30"]);
    let mut harness = Harness::launch(&cmds)?;

    let started = Instant::now();
    let lines: Vec<_> = harness.monitor(Duration::from_secs(2)).collect();
    let elapsed = started.elapsed();

    // The monitor must not wait for the sleeper to exit.
    assert!(elapsed < Duration::from_secs(10), "monitor overran: {elapsed:?}");
    assert_eq!(lines, vec![(WorkerId::new(0), "early".to_string())]);
    assert_eq!(harness.status(WorkerId::new(0)), Some(WorkerStatus::Cancelled));
    Ok(())
}

#[test]
fn all_workers_drain_without_deadline_pressure() -> anyhow::Result<()> {
    let cmds = commands(&["echo one", "sleep 1; echo two", "echo three"]);
    let mut harness = Harness::launch(&cmds)?;
    let lines: Vec<_> = harness.monitor(Duration::from_secs(30)).collect();
    assert_eq!(lines.len(), 3);
    assert!(harness
        .statuses()
        .all(|(_, s)| matches!(s, WorkerStatus::Exited(status) if status.success())));
    Ok(())
}
