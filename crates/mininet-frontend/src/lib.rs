//! An interface to the Mininet runner scripts.
//!
//! This crate is tightly coupled to the interface provided by the Python
//! runner: it writes the topology files the runner reads, starts the runner,
//! and parses the host map the runner writes back.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::{fmt::Write, io};

use topobench_core::network::Topology;

/// Bridge priorities start here; lower wins the spanning-tree root election.
const STP_PRIORITY_BASE: u32 = 1000;

/// A Mininet emulation session.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct MininetEmulation {
    /// The directory containing the runner's `run.py`.
    #[builder(setter(into))]
    pub runner_dir: PathBuf,
    /// The directory in which to write topology configs and runner output.
    #[builder(setter(into))]
    pub data_dir: PathBuf,
    /// The topology to emulate.
    pub topology: TopologySpec,
    /// Whether switches run STP locally or defer to a remote controller.
    #[builder(default)]
    pub switch_mode: SwitchMode,
    /// How commands reach the emulated hosts.
    #[builder(default)]
    pub exec: HostExec,
}

impl MininetEmulation {
    /// Starts the emulated network, returning a handle to it.
    ///
    /// This routine can fail due to IO errors or errors parsing the runner's
    /// host map. The runner itself logs to `output.txt` in the data directory.
    pub fn start(&self) -> Result<RunningNetwork, Error> {
        // Set up directory
        let mk_path = |dir, file| [dir, file].into_iter().collect::<PathBuf>();
        fs::create_dir_all(&self.data_dir)?;

        // Set up the topology
        if let TopologySpec::Explicit(topology) = &self.topology {
            fs::write(
                mk_path(self.data_dir.as_path(), "topology.txt".as_ref()),
                translate_topology(topology),
            )?;
            if let SwitchMode::SpanningTree = self.switch_mode {
                fs::write(
                    mk_path(self.data_dir.as_path(), "switches.txt".as_ref()),
                    translate_stp_priorities(topology, STP_PRIORITY_BASE),
                )?;
            }
        }

        // Run Mininet
        self.invoke_runner()?;

        // Parse the host map and return a handle
        let s = fs::read_to_string(mk_path(self.data_dir.as_path(), "hosts.txt".as_ref()))?;
        let hosts = parse_host_map(&s)?;
        Ok(RunningNetwork {
            hosts,
            exec: self.exec.clone(),
        })
    }

    fn invoke_runner(&self) -> io::Result<()> {
        // We need to canonicalize the directories because we run `cd` below.
        let data_dir = fs::canonicalize(&self.data_dir)?;
        let data_dir = data_dir.display();
        let runner_dir = fs::canonicalize(&self.runner_dir)?;
        let runner_dir = runner_dir.display();

        // Build the command that runs the Python script.
        let mut python_command = format!("python2 run.py --root {data_dir}");
        match &self.topology {
            TopologySpec::Explicit(_) => {
                write!(python_command, " --topo topology").unwrap();
            }
            TopologySpec::Jellyfish {
                hosts,
                switches,
                ports,
            } => {
                write!(python_command, " --jellyfish {hosts} {switches} {ports}").unwrap();
            }
        }
        match &self.switch_mode {
            SwitchMode::SpanningTree => {
                write!(python_command, " --stp switches").unwrap();
            }
            SwitchMode::Controller { ip, port } => {
                write!(python_command, " --controller {ip}:{port}").unwrap();
            }
        }
        write!(python_command, " > {data_dir}/output.txt 2>&1").unwrap();

        // Execute the command in a child process.
        let _output = Command::new("sh")
            .arg("-c")
            .arg(format!("cd {runner_dir}; {python_command}"))
            .output()?;
        Ok(())
    }
}

/// The error type for [MininetEmulation::start].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error parsing the runner's host map.
    #[error("failed to parse the Mininet host map")]
    ParseHosts(#[from] ParseHostsError),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the runner should emulate.
#[derive(Debug, Clone)]
pub enum TopologySpec {
    /// A fully specified topology, written out for the runner to load.
    Explicit(Topology),
    /// A Jellyfish random graph, wired by the runner's own generator.
    Jellyfish {
        /// Number of hosts.
        hosts: usize,
        /// Number of switches.
        switches: usize,
        /// Ports per switch.
        ports: usize,
    },
}

/// Forwarding control for the emulated switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SwitchMode {
    /// STP-enabled OVS bridges. The first switch declared gets the lowest
    /// priority and becomes the spanning-tree root.
    #[default]
    SpanningTree,
    /// Hand all switches to a remote SDN controller.
    Controller {
        /// Controller IP address.
        ip: String,
        /// Controller port.
        port: u16,
    },
}

/// How measurement commands reach emulated hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostExec {
    /// Attach through the local Mininet `m` utility.
    Local {
        /// Path to the `m` utility.
        util: PathBuf,
    },
    /// Wrap the attach in SSH to the emulator machine.
    Ssh {
        /// SSH target, e.g. `mininet@emulator`.
        target: String,
        /// Path to the `m` utility on the target.
        util: PathBuf,
    },
}

impl Default for HostExec {
    fn default() -> Self {
        Self::Local {
            util: "/home/mininet/mininet/util/m".into(),
        }
    }
}

impl HostExec {
    /// The shell line that runs `cmd` inside host `host`.
    pub fn line(&self, host: &str, cmd: &str) -> String {
        match self {
            Self::Local { util } => format!("{} {host} '{cmd}'", util.display()),
            Self::Ssh { target, util } => {
                format!("ssh {target} {} {host} '{cmd}'", util.display())
            }
        }
    }

    fn teardown_line(&self) -> String {
        const TEARDOWN: &str = "mn -c > /dev/null 2>&1; killall -9 iperf3 2> /dev/null";
        match self {
            Self::Local { .. } => TEARDOWN.to_string(),
            Self::Ssh { target, .. } => format!("ssh {target} '{TEARDOWN}'"),
        }
    }
}

/// A handle to a started emulation: the host-to-IP map plus the exec path
/// into the hosts.
#[derive(Debug)]
pub struct RunningNetwork {
    hosts: Vec<(String, String)>,
    exec: HostExec,
}

impl RunningNetwork {
    /// Host names in the runner's declaration order.
    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(|(name, _)| name.as_str())
    }

    /// The IP address assigned to `host`, if it exists.
    pub fn host_ip(&self, host: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|(name, _)| name == host)
            .map(|(_, ip)| ip.as_str())
    }

    /// The number of hosts the runner reported.
    pub fn nr_hosts(&self) -> usize {
        self.hosts.len()
    }

    /// The shell line that runs `cmd` inside host `host`.
    pub fn exec_line(&self, host: &str, cmd: &str) -> String {
        self.exec.line(host, cmd)
    }

    /// Tears down the emulated network and any leftover measurement daemons.
    pub fn stop(self) -> io::Result<()> {
        let _output = Command::new("sh")
            .arg("-c")
            .arg(self.exec.teardown_line())
            .output()?;
        Ok(())
    }
}

fn translate_topology(topology: &Topology) -> String {
    // The endpoints of every link are validated at topology construction.
    let name = |id| {
        topology
            .node(id)
            .map(|n| n.name.as_str())
            .unwrap() // link endpoints are declared
    };
    let opt = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    let mut s = String::new();
    // First line: total node #, switch node #, link #
    writeln!(
        s,
        "{} {} {}",
        topology.nodes().count(),
        topology.nr_switches(),
        topology.nr_links()
    )
    .unwrap();
    // Second line: switch names...
    let switch_names = topology
        .switches()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(s, "{switch_names}").unwrap();
    // a0 b0 bandwidth (Mbps or -) delay (us or -)
    // a1 b1 bandwidth (Mbps or -) delay (us or -)
    // ...
    for link in topology.links() {
        writeln!(
            s,
            "{} {} {} {}",
            name(link.a),
            name(link.b),
            opt(link.bandwidth.map(|b| b.into_u64())),
            opt(link.delay.map(|d| d.into_u64())),
        )
        .unwrap();
    }
    s
}

/// One priority line per switch, in declaration order, counting up from
/// `base + 1`. The counter is scoped to this translation, so repeated
/// sessions always elect the same root.
fn translate_stp_priorities(topology: &Topology, base: u32) -> String {
    let mut s = String::new();
    for (i, switch) in topology.switches().enumerate() {
        writeln!(s, "{} {}", switch.name, base + i as u32 + 1).unwrap();
    }
    s
}

fn parse_host_map(s: &str) -> Result<Vec<(String, String)>, ParseHostsError> {
    s.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_host_record)
        .collect()
}

fn parse_host_record(s: &str) -> Result<(String, String), ParseHostsError> {
    // <host name> <ip>
    const NR_HOST_FIELDS: usize = 2;
    let fields = s.split_whitespace().collect::<Vec<_>>();
    let nr_fields = fields.len();
    if nr_fields != NR_HOST_FIELDS {
        return Err(ParseHostsError::WrongNrFields {
            expected: NR_HOST_FIELDS,
            got: nr_fields,
        });
    }
    Ok((fields[0].to_string(), fields[1].to_string()))
}

/// Error parsing the runner's host map.
#[derive(Debug, thiserror::Error)]
pub enum ParseHostsError {
    /// Incorrect number of fields.
    #[error("Wrong number of fields (expected {expected}, got {got})")]
    WrongNrFields {
        /// Expected number of fields.
        expected: usize,
        /// Actual number of fields.
        got: usize,
    },
}
