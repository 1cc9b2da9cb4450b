//! Stage planning: which measurements run, in what order, against which
//! results file.

use std::fmt::Write;
use std::time::Duration;

use topobench_core::units::Mbps;

/// Fat-tree ping stages comfortably finish within this bound.
const PING_DEADLINE: Duration = Duration::from_secs(300);
/// Fat-tree iperf3 stages include the staggered cross-pod tail.
const IPERF_DEADLINE: Duration = Duration::from_secs(1200);
/// Jellyfish graphs are small; stuck stages should be cut short.
const JF_PING_DEADLINE: Duration = Duration::from_secs(60);
const JF_IPERF_DEADLINE: Duration = Duration::from_secs(300);
/// Headroom for the ping preamble and teardown of a combined stage, on top
/// of the configured transfer duration.
const COMBINED_GRACE: Duration = Duration::from_secs(110);

/// Fat-tree iperf3 bandwidth caps, in Mbps.
const FT_TCP_BANDWIDTHS: [u64; 2] = [100, 1000];
const FT_UDP_BANDWIDTHS: [u64; 1] = [1000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestKind {
    Ping,
    Tcp,
    Udp,
    /// A ping immediately followed by an iperf3 transfer in the same worker.
    Combined,
}

impl TestKind {
    fn as_str(&self) -> &'static str {
        match self {
            TestKind::Ping => "ping",
            TestKind::Tcp => "tcp",
            TestKind::Udp => "udp",
            TestKind::Combined => "combined",
        }
    }
}

/// Which servers a stage's clients target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Locality {
    /// Clients target their matched server inside the same pod.
    SamePod,
    /// Clients target servers in reverse list order, crossing pods.
    DifferentPod,
    /// No pod structure; the matching is used as generated.
    Flat,
}

/// One measurement stage: every pair runs one command concurrently, and all
/// output lands in one results file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stage {
    pub(crate) kind: TestKind,
    pub(crate) locality: Locality,
    pub(crate) bandwidth: Option<Mbps>,
    /// Repetition index (1-based), for families that repeat stages.
    pub(crate) run: Option<usize>,
    pub(crate) deadline: Duration,
}

impl Stage {
    /// The results file name for this stage, e.g.
    /// `ft_stp_k4_tcp_results_same_pod_100M`.
    pub(crate) fn result_file(&self, prefix: &str) -> String {
        let mut name = format!("{prefix}_{}_results", self.kind.as_str());
        match self.locality {
            Locality::SamePod => name.push_str("_same_pod"),
            Locality::DifferentPod => name.push_str("_different_pod"),
            Locality::Flat => {}
        }
        if let Some(bandwidth) = self.bandwidth {
            write!(name, "_{}M", bandwidth.into_u64()).unwrap();
        }
        if let Some(run) = self.run {
            write!(name, "_{run}").unwrap();
        }
        name
    }
}

/// The results file prefix encoding the topology family, the switch mode,
/// and (for fat-trees) the arity.
pub(crate) fn file_prefix(family: &str, controller: bool, k: Option<usize>) -> String {
    let mode = if controller { "sdn" } else { "stp" };
    match k {
        Some(k) => format!("{family}_{mode}_k{k}"),
        None => format!("{family}_{mode}"),
    }
}

/// Ping both conditions first, then TCP over every bandwidth cap and both
/// conditions, then UDP likewise.
pub(crate) fn fat_tree_stages() -> Vec<Stage> {
    let mut stages = Vec::new();
    for locality in [Locality::SamePod, Locality::DifferentPod] {
        stages.push(Stage {
            kind: TestKind::Ping,
            locality,
            bandwidth: None,
            run: None,
            deadline: PING_DEADLINE,
        });
    }
    for kind in [TestKind::Tcp, TestKind::Udp] {
        let bandwidths: &[u64] = match kind {
            TestKind::Tcp => &FT_TCP_BANDWIDTHS,
            _ => &FT_UDP_BANDWIDTHS,
        };
        for locality in [Locality::SamePod, Locality::DifferentPod] {
            for &bandwidth in bandwidths {
                stages.push(Stage {
                    kind,
                    locality,
                    bandwidth: Some(Mbps::new(bandwidth)),
                    run: None,
                    deadline: IPERF_DEADLINE,
                });
            }
        }
    }
    stages
}

/// All ping repetitions first, then TCP, then UDP, each repeated `runs`
/// times over every bandwidth cap.
pub(crate) fn jellyfish_stages(runs: usize, bandwidths: &[u64]) -> Vec<Stage> {
    let mut stages = Vec::new();
    for run in 1..=runs {
        stages.push(Stage {
            kind: TestKind::Ping,
            locality: Locality::Flat,
            bandwidth: None,
            run: Some(run),
            deadline: JF_PING_DEADLINE,
        });
    }
    for kind in [TestKind::Tcp, TestKind::Udp] {
        for run in 1..=runs {
            for &bandwidth in bandwidths {
                stages.push(Stage {
                    kind,
                    locality: Locality::Flat,
                    bandwidth: Some(Mbps::new(bandwidth)),
                    run: Some(run),
                    deadline: JF_IPERF_DEADLINE,
                });
            }
        }
    }
    stages
}

/// One combined ping-then-transfer stage per bandwidth cap.
pub(crate) fn hypercube_stages(duration: u64, bandwidths: &[u64]) -> Vec<Stage> {
    bandwidths
        .iter()
        .map(|&bandwidth| Stage {
            kind: TestKind::Combined,
            locality: Locality::Flat,
            bandwidth: Some(Mbps::new(bandwidth)),
            run: None,
            deadline: COMBINED_GRACE + Duration::from_secs(duration),
        })
        .collect()
}
