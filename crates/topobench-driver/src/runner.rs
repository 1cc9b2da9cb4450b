//! Session sequencing: build or request a topology, bring the emulation up,
//! generate pairs, start servers, and run the planned stages in order.

use std::collections::BTreeMap;
use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use mininet_frontend::{RunningNetwork, TopologySpec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use topobench_core::units::Mbps;
use topobench_core::{
    builders, pod_scoped_matching, random_matching, Harness, Matching, WorkerId, WorkerStatus,
};

use crate::results::ResultSink;
use crate::session::{Session, TopoKind};
use crate::stages::{self, Locality, Stage, TestKind};

/// How long STP is given to settle before measurements start.
const CONVERGENCE_DELAY: Duration = Duration::from_secs(60);
/// The small ad hoc hypercubes settle much faster.
const CUBE_CONVERGENCE_DELAY: Duration = Duration::from_secs(10);
/// Server daemons either come up quickly or not at all.
const SERVER_START_DEADLINE: Duration = Duration::from_secs(60);
/// One warmup ping per pair, to get paths learned before transfers.
const WARMUP_DEADLINE: Duration = Duration::from_secs(30);
/// Pause after the warmup pings so the learned paths settle.
const PATH_SETUP_DELAY: Duration = Duration::from_secs(15);
/// 2^16 switches is already far beyond what one emulator machine can hold.
const MAX_CUBE_DIM: u32 = 16;

/// Runs the whole session. A failure to build the topology or start the
/// emulation is fatal; a failed stage is logged and the session moves on.
pub fn run(session: &Session) -> anyhow::Result<()> {
    fs::create_dir_all(&session.results_dir)?;
    match session.topo {
        TopoKind::FatTree { k } => run_fat_tree(session, k),
        TopoKind::Jellyfish {
            hosts,
            switches,
            ports,
            runs,
            ref bandwidths,
        } => run_jellyfish(session, hosts, switches, ports, runs, bandwidths),
        TopoKind::Hypercube {
            dim,
            ref bandwidths,
        } => run_hypercube(session, dim, bandwidths),
    }
}

fn run_fat_tree(session: &Session, k: usize) -> anyhow::Result<()> {
    anyhow::ensure!(
        k >= 2 && k % 2 == 0,
        "fat-tree arity must be even and at least 2, got {k}"
    );
    log::info!("initiating fat-tree session with k = {k}");
    let topology = builders::fat_tree(k).context("failed to build the fat-tree")?;
    let hosts = owned(topology.host_names());
    let net = session.emulation(TopologySpec::Explicit(topology)).start()?;
    converge(CONVERGENCE_DELAY);

    let mut rng = StdRng::seed_from_u64(session.seed);
    let matching = pod_scoped_matching(&hosts, k * k / 4, &mut rng);
    let prefix = stages::file_prefix("ft", session.controller, Some(k));
    write_pairs(session, &prefix, &matching)?;
    start_servers(&net, &matching.servers)?;

    for stage in stages::fat_tree_stages() {
        run_stage(session, &net, &stage, &matching, &prefix);
    }
    net.stop()?;
    Ok(())
}

fn run_jellyfish(
    session: &Session,
    hosts: usize,
    switches: usize,
    ports: usize,
    runs: usize,
    bandwidths: &[u64],
) -> anyhow::Result<()> {
    log::info!(
        "initiating jellyfish session with {hosts} hosts, {switches} switches, {ports} ports"
    );
    let net = session
        .emulation(TopologySpec::Jellyfish {
            hosts,
            switches,
            ports,
        })
        .start()?;
    converge(CONVERGENCE_DELAY);

    // The generator wires the graph; we only learn the host list afterwards.
    let hosts = net.host_names().map(str::to_string).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(session.seed);
    let matching = random_matching(&hosts, &mut rng);
    let prefix = stages::file_prefix("jf", session.controller, None);
    write_pairs(session, &prefix, &matching)?;
    start_servers(&net, &matching.servers)?;

    let (pings, transfers): (Vec<_>, Vec<_>) = stages::jellyfish_stages(runs, bandwidths)
        .into_iter()
        .partition(|s| s.kind == TestKind::Ping);
    for stage in pings {
        run_stage(session, &net, &stage, &matching, &prefix);
    }
    if let Err(err) = warm_up_paths(&net, &matching) {
        log::warn!("path warmup failed: {err:#}");
    }
    thread::sleep(PATH_SETUP_DELAY);
    for stage in transfers {
        run_stage(session, &net, &stage, &matching, &prefix);
    }
    net.stop()?;
    Ok(())
}

fn run_hypercube(session: &Session, dim: u32, bandwidths: &[u64]) -> anyhow::Result<()> {
    anyhow::ensure!(
        dim <= MAX_CUBE_DIM,
        "hypercube dimension must be at most {MAX_CUBE_DIM}, got {dim}"
    );
    log::info!("initiating hypercube session with dimension {dim}");
    let topology = builders::hypercube(dim).context("failed to build the hypercube")?;
    let hosts = owned(topology.host_names());
    let net = session.emulation(TopologySpec::Explicit(topology)).start()?;
    converge(CUBE_CONVERGENCE_DELAY);

    let mut rng = StdRng::seed_from_u64(session.seed);
    let matching = random_matching(&hosts, &mut rng);
    let prefix = stages::file_prefix("hc", session.controller, None);
    write_pairs(session, &prefix, &matching)?;
    start_servers(&net, &matching.servers)?;

    for stage in stages::hypercube_stages(session.duration, bandwidths) {
        run_stage(session, &net, &stage, &matching, &prefix);
    }
    net.stop()?;
    Ok(())
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

fn converge(delay: Duration) {
    log::info!("waiting {}s for the network to converge", delay.as_secs());
    thread::sleep(delay);
}

fn write_pairs(session: &Session, prefix: &str, matching: &Matching<String>) -> anyhow::Result<()> {
    let path = session.results_dir.join(format!("{prefix}_pairs.json"));
    fs::write(&path, serde_json::to_string_pretty(matching)?)?;
    log::info!("wrote {} pairs to {}", matching.len(), path.display());
    Ok(())
}

/// Opens the measurement ports and starts one `iperf3` daemon per server.
fn start_servers(net: &RunningNetwork, servers: &[String]) -> anyhow::Result<()> {
    log::info!("starting iperf3 servers on {} hosts", servers.len());
    let cmd = "iptables -A INPUT -p tcp --dport 5001 -j ACCEPT; \
               iptables -A INPUT -p tcp --dport 5201 -j ACCEPT; \
               iperf3 -sD";
    let commands = servers
        .iter()
        .enumerate()
        .map(|(i, server)| (WorkerId::new(i), net.exec_line(server, cmd)))
        .collect::<BTreeMap<_, _>>();
    let mut harness = Harness::launch(&commands)?;
    for (worker, line) in harness.monitor(SERVER_START_DEADLINE) {
        log::debug!("<{worker}>: {line}");
    }
    Ok(())
}

/// One throwaway ping per pair. The replies are not recorded; the point is
/// the forwarding state they leave behind.
fn warm_up_paths(net: &RunningNetwork, matching: &Matching<String>) -> anyhow::Result<()> {
    log::info!("warming up {} paths", matching.len());
    let commands = matching
        .pairs()
        .enumerate()
        .map(|(i, (client, server))| {
            let ip = host_ip(net, server)?;
            let cmd = format!("ping -n -c 1 -W 10 {ip} 2>&1");
            Ok((WorkerId::new(i), net.exec_line(client, &cmd)))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
    let mut harness = Harness::launch(&commands)?;
    for (worker, line) in harness.monitor(WARMUP_DEADLINE) {
        log::debug!("<{worker}>: {line}");
    }
    Ok(())
}

fn run_stage(
    session: &Session,
    net: &RunningNetwork,
    stage: &Stage,
    matching: &Matching<String>,
    prefix: &str,
) {
    let file = stage.result_file(prefix);
    if let Err(err) = try_run_stage(session, net, stage, matching, &file) {
        log::error!("stage {file} failed: {err:#}");
    }
}

fn try_run_stage(
    session: &Session,
    net: &RunningNetwork,
    stage: &Stage,
    matching: &Matching<String>,
    file: &str,
) -> anyhow::Result<()> {
    let servers = match stage.locality {
        Locality::DifferentPod => matching.reversed_servers(),
        Locality::SamePod | Locality::Flat => matching.servers.clone(),
    };
    log::info!(">>> starting stage {file} with {} pairs", matching.len());
    let commands = stage_commands(stage, net, &matching.clients, &servers, session.duration)?;
    let mut sink = ResultSink::append_to(session.results_dir.join(file))?;
    let mut harness = Harness::launch(&commands)?;
    for (worker, line) in harness.monitor(stage.deadline) {
        log::debug!("<{worker}>: {line}");
        sink.record(worker, &line)?;
    }
    sink.finish()?;
    let nr_cancelled = harness
        .statuses()
        .filter(|&(_, status)| status == WorkerStatus::Cancelled)
        .count();
    if nr_cancelled > 0 {
        log::warn!("stage {file}: cancelled {nr_cancelled} workers at the deadline");
    }
    Ok(())
}

fn stage_commands(
    stage: &Stage,
    net: &RunningNetwork,
    clients: &[String],
    servers: &[String],
    duration: u64,
) -> anyhow::Result<BTreeMap<WorkerId, String>> {
    let nr_pairs = clients.len();
    let mut commands = BTreeMap::new();
    for (i, (client, server)) in clients.iter().zip(servers).enumerate() {
        let ip = host_ip(net, server)?;
        log::debug!("pair {i}: {client} --> {server} ({ip})");
        let cmd = measurement_command(stage, duration, i, nr_pairs, ip);
        commands.insert(WorkerId::new(i), net.exec_line(client, &cmd));
    }
    Ok(commands)
}

fn host_ip<'a>(net: &'a RunningNetwork, host: &str) -> anyhow::Result<&'a str> {
    net.host_ip(host)
        .with_context(|| format!("host {host} is not in the emulation's host map"))
}

fn measurement_command(
    stage: &Stage,
    duration: u64,
    index: usize,
    nr_pairs: usize,
    server_ip: &str,
) -> String {
    let t = transfer_duration(stage, duration, index, nr_pairs);
    let bw = bandwidth_flag(stage.bandwidth);
    match stage.kind {
        TestKind::Ping => format!("ping -q -n -c 6 {server_ip} 2>&1"),
        TestKind::Tcp => {
            format!("iperf3 -O 10 -f m{bw} -i 10 -t {t} -Z -c {server_ip} 2>&1")
        }
        TestKind::Udp => {
            format!("iperf3 -u -O 10 -f m{bw} -i 10 -t {t} -Z -c {server_ip} 2>&1")
        }
        TestKind::Combined => format!(
            "ping -n -c 3 {server_ip} 2>&1; \
             iperf3 -O 10{bw} -i 10 -t {t} -Z -c {server_ip} 2>&1"
        ),
    }
}

/// Cross-pod transfer lengths are staggered by pair index so the flows do
/// not all terminate at once.
fn transfer_duration(stage: &Stage, duration: u64, index: usize, nr_pairs: usize) -> u64 {
    match stage.locality {
        Locality::DifferentPod => duration + (nr_pairs - index) as u64,
        Locality::SamePod | Locality::Flat => duration,
    }
}

fn bandwidth_flag(bandwidth: Option<Mbps>) -> String {
    bandwidth.map_or_else(String::new, |b| format!(" -b {}M", b.into_u64()))
}
