//! # havoc
//!
//! Resilience testing tool that helps applications tolerate random
//! Docker container failures: process, network and performance.
//!
//! ## Examples
//!
//! ```bash
//! # Kill a random matching container every 30 seconds
//! havoc --interval 30s --random kill re2:^worker-
//!
//! # Preview what a forced remove would touch
//! havoc --interval 1m --dry rm --force --links --volumes web-1
//!
//! # Add 100ms +/- 10ms of egress delay for 20s out of every minute
//! havoc --interval 1m netem --duration 20s --interface eth0 delay \
//!     --amount 100 --variation 10 --correlation 20 web-1 web-2
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use havoc_core::command::{ChaosCommand, NetemCommand};
use havoc_core::executor::RunContext;
use havoc_core::netem::{FilterMode, NetemEffect};
use havoc_core::schedule::{RunOutcome, Scheduler};
use havoc_core::selector::Selector;
use havoc_core::{lifecycle, DockerClient};

mod slack;
mod tls;

/// Havoc is a resilience testing tool that helps applications tolerate
/// random Docker container failures: process, network and performance.
#[derive(Parser, Debug)]
#[command(name = "havoc", version, about, long_about = None)]
struct Cli {
    /// Daemon socket to connect to
    #[arg(
        long,
        short = 'H',
        default_value = "unix:///var/run/docker.sock",
        env = "DOCKER_HOST"
    )]
    host: String,

    /// Use TLS; implied by --tlsverify
    #[arg(long)]
    tls: bool,

    /// Use TLS and verify the remote
    #[arg(long, env = "DOCKER_TLS_VERIFY")]
    tlsverify: bool,

    /// Trust certs signed only by this CA
    #[arg(long, value_name = "FILE")]
    tlscacert: Option<PathBuf>,

    /// Client certificate for TLS authentication
    #[arg(long, value_name = "FILE")]
    tlscert: Option<PathBuf>,

    /// Client key for TLS authentication
    #[arg(long, value_name = "FILE")]
    tlskey: Option<PathBuf>,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    debug: bool,

    /// Produce log in JSON format: Logstash and Splunk friendly
    #[arg(long)]
    json: bool,

    /// Web hook url; send havoc log events to Slack
    #[arg(long, value_name = "URL")]
    slackhook: Option<String>,

    /// Slack channel for log events
    #[arg(long, default_value = "#havoc")]
    slackchannel: String,

    /// Recurrent interval for the chaos command; use with optional unit
    /// suffix: 'ms/s/m/h'
    #[arg(long, short = 'i', value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Randomly select a single matching container from the target list
    #[arg(long, short = 'r')]
    random: bool,

    /// Dry run; does not create chaos, only logs planned chaos commands
    #[arg(long)]
    dry: bool,

    /// Fire the chaos command exactly once after the interval, then exit
    #[arg(long, hide = true)]
    test_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a termination signal to the main process inside target
    /// container(s)
    Kill {
        /// Termination signal to send
        #[arg(long, short, default_value = "SIGKILL")]
        signal: String,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Emulate the properties of wide area networks: delay, loss,
    /// duplicate and corrupt packets
    Netem(NetemArgs),

    /// Pause all running processes within target containers
    Pause {
        /// Pause duration; should be smaller than the recurrent interval
        #[arg(long, short, value_parser = humantime::parse_duration)]
        duration: Duration,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Stop the main process inside target containers, sending SIGTERM
    /// and then SIGKILL after a grace period
    Stop {
        /// Seconds to wait for stop before killing the container
        #[arg(long, short, default_value_t = 10)]
        time: u64,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Remove target containers
    Rm {
        /// Force the removal of a running container (with SIGKILL)
        #[arg(long, short)]
        force: bool,

        /// Remove container links
        #[arg(long, short)]
        links: bool,

        /// Remove volumes associated with the container
        #[arg(long, short)]
        volumes: bool,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct NetemArgs {
    /// Network emulation duration; should be smaller than the recurrent
    /// interval
    #[arg(long, short, value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Network interface to apply the disruption on
    #[arg(long, short, default_value = "eth0")]
    interface: String,

    /// Target IP filter; disrupt only traffic to this IP
    #[arg(long, short)]
    target: Option<IpAddr>,

    /// How the target IP filter matches packets
    #[arg(long, value_enum, default_value = "dport")]
    filter_mode: FilterModeArg,

    #[command(subcommand)]
    effect: NetemEffectCommand,
}

#[derive(Subcommand, Debug)]
enum NetemEffectCommand {
    /// Delay egress traffic
    Delay {
        /// Delay amount, in milliseconds
        #[arg(long, short, default_value_t = 100)]
        amount: u64,

        /// Random delay variation, in milliseconds; example: 100ms ± 10ms
        #[arg(long, short, default_value_t = 10)]
        variation: u64,

        /// Delay correlation, in percents
        #[arg(long, short, default_value_t = 20)]
        correlation: u8,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Drop a percentage of egress packets
    Loss {
        /// Loss probability, in percents
        #[arg(long, short, default_value_t = 1.0)]
        percent: f64,

        /// Loss correlation for burst patterns, in percents
        #[arg(long, short, default_value_t = 0.0)]
        correlation: f64,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Duplicate a percentage of egress packets
    Duplicate {
        /// Duplication probability, in percents
        #[arg(long, short, default_value_t = 1.0)]
        percent: f64,

        /// Duplication correlation, in percents
        #[arg(long, short, default_value_t = 0.0)]
        correlation: f64,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },

    /// Corrupt a percentage of egress packets (single-bit errors)
    Corrupt {
        /// Corruption probability, in percents
        #[arg(long, short, default_value_t = 1.0)]
        percent: f64,

        /// Corruption correlation, in percents
        #[arg(long, short, default_value_t = 0.0)]
        correlation: f64,

        /// Containers (name, list of names, or re2: regex)
        targets: Vec<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FilterModeArg {
    /// Match the target IP with `u32 match ip dport`, as historical
    /// releases did
    Dport,
    /// Match the target IP with `u32 match ip dst`
    Dst,
}

impl From<FilterModeArg> for FilterMode {
    fn from(mode: FilterModeArg) -> Self {
        match mode {
            FilterModeArg::Dport => FilterMode::Dport,
            FilterModeArg::Dst => FilterMode::Dst,
        }
    }
}

/// Translate the parsed CLI into a chaos command and its target args.
fn build_command(command: &Command) -> (ChaosCommand, Vec<String>) {
    match command {
        Command::Kill { signal, targets } => (
            ChaosCommand::Kill {
                signal: signal.clone(),
            },
            targets.clone(),
        ),
        Command::Netem(args) => {
            let (effect, targets) = match &args.effect {
                NetemEffectCommand::Delay {
                    amount,
                    variation,
                    correlation,
                    targets,
                } => (
                    NetemEffect::Delay {
                        amount_ms: *amount,
                        variation_ms: *variation,
                        correlation: *correlation,
                    },
                    targets.clone(),
                ),
                NetemEffectCommand::Loss {
                    percent,
                    correlation,
                    targets,
                } => (
                    NetemEffect::Loss {
                        percent: *percent,
                        correlation: *correlation,
                    },
                    targets.clone(),
                ),
                NetemEffectCommand::Duplicate {
                    percent,
                    correlation,
                    targets,
                } => (
                    NetemEffect::Duplicate {
                        percent: *percent,
                        correlation: *correlation,
                    },
                    targets.clone(),
                ),
                NetemEffectCommand::Corrupt {
                    percent,
                    correlation,
                    targets,
                } => (
                    NetemEffect::Corrupt {
                        percent: *percent,
                        correlation: *correlation,
                    },
                    targets.clone(),
                ),
            };
            (
                ChaosCommand::Netem(NetemCommand {
                    interface: args.interface.clone(),
                    target: args.target,
                    filter_mode: args.filter_mode.into(),
                    duration: args.duration,
                    effect,
                }),
                targets,
            )
        }
        Command::Pause { duration, targets } => (
            ChaosCommand::Pause {
                duration: *duration,
            },
            targets.clone(),
        ),
        Command::Stop { time, targets } => (ChaosCommand::Stop { wait_secs: *time }, targets.clone()),
        Command::Rm {
            force,
            links,
            volumes,
            targets,
        } => (
            ChaosCommand::Remove {
                force: *force,
                links: *links,
                volumes: *volumes,
            },
            targets.clone(),
        ),
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    let level = if cli.debug { "debug" } else { "info" };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if cli.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    });
    if let Some(hook) = cli.slackhook.clone() {
        layers.push(slack::SlackLayer::spawn(hook, cli.slackchannel.clone()).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(EnvFilter::new(level))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // All validation happens here, before anything is scheduled.
    let interval = cli
        .interval
        .context("undefined interval value; pass --interval")?;
    let (command, targets) = build_command(&cli.command);
    let selector = Selector::parse(&targets)?;
    command.validate(interval)?;

    let tls_material = tls::resolve(
        cli.tls,
        cli.tlsverify,
        cli.tlscacert.clone(),
        cli.tlscert.clone(),
        cli.tlskey.clone(),
    );
    let client = DockerClient::connect(&cli.host, tls_material.as_ref())
        .context("cannot connect to the Docker daemon")?;

    let (trigger, shutdown) = lifecycle::shutdown_channel();
    lifecycle::spawn_signal_listener(trigger);

    let ctx = RunContext {
        dry: cli.dry,
        random: cli.random,
    };
    let outcome = Scheduler::new(interval, cli.test_run)
        .run(Arc::new(client), ctx, command, selector, shutdown)
        .await;

    if outcome == RunOutcome::Interrupted {
        // Disruption work happened before the signal; reflect it.
        std::process::exit(1);
    }
    Ok(())
}
