//! `tc netem` argument builders for network chaos injection.
//!
//! The runtime does not expose traffic control natively, so netem
//! disruptions run the `tc` tool inside the target container via a
//! privileged exec. Requires `iproute2` in the container image.

use std::fmt;
use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ChaosError;

/// Pattern a network interface name must match in full.
///
/// The interface name is concatenated into the exec argv, so anything
/// outside this alphabet is rejected up front as a command-injection
/// guard.
pub const INTERFACE_PATTERN: &str = "^[a-zA-Z]+[0-9]{0,2}$";

fn interface_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(INTERFACE_PATTERN).expect("interface pattern is a valid regex"))
}

/// Validate a network interface name against [`INTERFACE_PATTERN`].
pub fn validate_interface(name: &str) -> Result<(), ChaosError> {
    if interface_regex().is_match(name) {
        Ok(())
    } else {
        Err(ChaosError::BadInterface {
            name: name.into(),
            pattern: INTERFACE_PATTERN,
        })
    }
}

/// How the optional target-IP filter matches packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// `u32 match ip dport <ip>`: matches what earlier releases of the
    /// engine emitted, and what downstream tooling asserts on. `dport`
    /// expects a port number, so as a packet filter this is a no-op.
    #[default]
    Dport,
    /// `u32 match ip dst <ip>`: actually restricts the disruption to
    /// traffic addressed to the target IP.
    Dst,
}

impl FilterMode {
    fn keyword(self) -> &'static str {
        match self {
            FilterMode::Dport => "dport",
            FilterMode::Dst => "dst",
        }
    }
}

/// A netem parameter set: the part of the qdisc spec after `netem`.
#[derive(Debug, Clone, PartialEq)]
pub enum NetemEffect {
    /// Delay egress packets.
    Delay {
        /// Fixed delay in milliseconds.
        amount_ms: u64,
        /// Random variation in milliseconds (`amount ± variation`).
        variation_ms: u64,
        /// Correlation between consecutive delays, in percent.
        correlation: u8,
    },
    /// Drop a percentage of egress packets.
    Loss {
        /// Loss probability in percent.
        percent: f64,
        /// Correlation for burst loss patterns, in percent.
        correlation: f64,
    },
    /// Duplicate a percentage of egress packets.
    Duplicate {
        /// Duplication probability in percent.
        percent: f64,
        /// Correlation, in percent.
        correlation: f64,
    },
    /// Corrupt a percentage of egress packets (single-bit error).
    Corrupt {
        /// Corruption probability in percent.
        percent: f64,
        /// Correlation, in percent.
        correlation: f64,
    },
}

impl NetemEffect {
    fn percent_spec(f: &mut fmt::Formatter<'_>, kind: &str, percent: f64, corr: f64) -> fmt::Result {
        write!(f, "{kind} {percent}%")?;
        if corr > 0.0 {
            write!(f, " {corr}%")?;
        }
        Ok(())
    }
}

impl fmt::Display for NetemEffect {
    /// Render the lowercase netem spec. Zero-valued trailing parameters
    /// are omitted, matching the `tc-netem(8)` grammar.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NetemEffect::Delay {
                amount_ms,
                variation_ms,
                correlation,
            } => {
                write!(f, "delay {amount_ms}ms")?;
                if variation_ms > 0 {
                    write!(f, " {variation_ms}ms")?;
                }
                if correlation > 0 {
                    write!(f, " {correlation}%")?;
                }
                Ok(())
            }
            NetemEffect::Loss {
                percent,
                correlation,
            } => Self::percent_spec(f, "loss", percent, correlation),
            NetemEffect::Duplicate {
                percent,
                correlation,
            } => Self::percent_spec(f, "duplicate", percent, correlation),
            NetemEffect::Corrupt {
                percent,
                correlation,
            } => Self::percent_spec(f, "corrupt", percent, correlation),
        }
    }
}

/// `tc qdisc add dev <iface> root netem <spec>`: the single-qdisc
/// (unfiltered) setup.
pub fn qdisc_add_root(interface: &str, spec: &str) -> Vec<String> {
    let mut argv = to_argv(&["tc", "qdisc", "add", "dev", interface, "root", "netem"]);
    argv.extend(spec.split_whitespace().map(str::to_string));
    argv
}

/// `tc qdisc del dev <iface> root netem`: teardown for both the
/// filtered and unfiltered setups.
pub fn qdisc_del_root(interface: &str) -> Vec<String> {
    to_argv(&["tc", "qdisc", "del", "dev", interface, "root", "netem"])
}

/// `tc qdisc add dev <iface> root handle 1: prio`, the first step of the
/// filtered setup: a priority scheduler at the interface root.
pub fn qdisc_add_prio(interface: &str) -> Vec<String> {
    to_argv(&[
        "tc", "qdisc", "add", "dev", interface, "root", "handle", "1:", "prio",
    ])
}

/// `tc qdisc add dev <iface> parent 1:3 netem <spec>`, the second step:
/// attach the netem qdisc to the lowest-priority band.
pub fn qdisc_add_band(interface: &str, spec: &str) -> Vec<String> {
    let mut argv = to_argv(&["tc", "qdisc", "add", "dev", interface, "parent", "1:3", "netem"]);
    argv.extend(spec.split_whitespace().map(str::to_string));
    argv
}

/// `tc filter add dev <iface> protocol ip parent 1:0 prio 3 u32 match ip
/// <mode> <ip> flowid 1:3`, the third step: route matching traffic into
/// the netem band.
pub fn filter_add_ip(interface: &str, target: IpAddr, mode: FilterMode) -> Vec<String> {
    let mut argv = to_argv(&[
        "tc", "filter", "add", "dev", interface, "protocol", "ip", "parent", "1:0", "prio", "3",
        "u32", "match", "ip",
    ]);
    argv.push(mode.keyword().to_string());
    argv.push(target.to_string().to_lowercase());
    argv.push("flowid".to_string());
    argv.push("1:3".to_string());
    argv
}

fn to_argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
