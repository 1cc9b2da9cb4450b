use std::path::PathBuf;

use mininet_frontend::{HostExec, MininetEmulation, SwitchMode, TopologySpec};

/// Drive a measurement session against a Mininet installation.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Session {
    /// Directory containing the Mininet runner's `run.py`.
    #[arg(long, default_value = "./runner")]
    pub runner_dir: PathBuf,

    /// Directory for generated topology files and runner output.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory raw measurement results are appended under.
    #[arg(long, default_value = "./results")]
    pub results_dir: PathBuf,

    /// Duration of each iperf3 transfer, in seconds.
    #[arg(short, long, default_value_t = 60)]
    pub duration: u64,

    /// Seed for client/server pair generation.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Defer switching to a remote SDN controller instead of running STP.
    #[arg(long)]
    pub controller: bool,

    /// Controller IP address.
    #[arg(long, default_value = "127.0.0.1")]
    pub controller_ip: String,

    /// Controller port.
    #[arg(long, default_value_t = 6633)]
    pub controller_port: u16,

    /// Reach the emulator machine over SSH at this target instead of locally.
    #[arg(long)]
    pub ssh: Option<String>,

    /// Path to the Mininet `m` host-attach utility.
    #[arg(long, default_value = "/home/mininet/mininet/util/m")]
    pub util: PathBuf,

    #[command(subcommand)]
    pub topo: TopoKind,
}

/// The topology family to measure.
#[derive(Debug, clap::Subcommand)]
pub enum TopoKind {
    /// A k-ary fat-tree, measured under per-pod and cross-pod conditions.
    FatTree {
        /// Fat-tree arity (number of pods). Must be even.
        #[arg(short, default_value_t = 4)]
        k: usize,
    },

    /// A Jellyfish random graph, wired by the runner's own generator.
    Jellyfish {
        /// Number of hosts.
        #[arg(short = 'H', long, default_value_t = 16)]
        hosts: usize,

        /// Number of switches.
        #[arg(short, long, default_value_t = 20)]
        switches: usize,

        /// Ports per switch.
        #[arg(short, long, default_value_t = 4)]
        ports: usize,

        /// Number of repetitions of each test.
        #[arg(short, long, default_value_t = 1)]
        runs: usize,

        /// iperf3 bandwidth caps, in Mbps.
        #[arg(short, long, value_delimiter = ',', default_value = "1000")]
        bandwidths: Vec<u64>,
    },

    /// A hypercube of switches, measured with one combined ping/iperf3 stage.
    Hypercube {
        /// Hypercube dimension.
        #[arg(short = 'a', default_value_t = 3)]
        dim: u32,

        /// iperf3 bandwidth caps, in Mbps.
        #[arg(short, long, value_delimiter = ',', default_value = "100")]
        bandwidths: Vec<u64>,
    },
}

impl Session {
    pub(crate) fn switch_mode(&self) -> SwitchMode {
        if self.controller {
            SwitchMode::Controller {
                ip: self.controller_ip.clone(),
                port: self.controller_port,
            }
        } else {
            SwitchMode::SpanningTree
        }
    }

    pub(crate) fn host_exec(&self) -> HostExec {
        match &self.ssh {
            Some(target) => HostExec::Ssh {
                target: target.clone(),
                util: self.util.clone(),
            },
            None => HostExec::Local {
                util: self.util.clone(),
            },
        }
    }

    pub(crate) fn emulation(&self, topology: TopologySpec) -> MininetEmulation {
        MininetEmulation::builder()
            .runner_dir(self.runner_dir.clone())
            .data_dir(self.data_dir.clone())
            .topology(topology)
            .switch_mode(self.switch_mode())
            .exec(self.host_exec())
            .build()
    }
}
