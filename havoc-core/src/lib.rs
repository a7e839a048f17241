//! # havoc-core
//!
//! Chaos injection engine for Docker containers.
//!
//! The engine periodically selects running containers and applies a
//! disruptive action — killing the main process, pausing, stopping,
//! removing, or injecting network emulation faults through in-container
//! `tc` invocations — so that upstream systems can be tested against
//! real failure.
//!
//! Building blocks, composed by the `havoc` binary:
//!
//! - [`client`]: the narrow runtime interface (Docker via bollard, plus
//!   a recording mock) with the dry-run gate at its boundary
//! - [`selector`]: name-list / regex / random-of-matches targeting
//! - [`command`]: validated chaos command values
//! - [`executor`]: per-tick fan-out with error aggregation
//! - [`schedule`]: recurrent and one-shot firing
//! - [`lifecycle`]: signal handling and drain-on-shutdown
//!
//! Disruptions are attempted, not guaranteed: apply failures are logged
//! and never abort the recurring schedule. The engine keeps no state
//! and restores nothing it has removed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod command;
pub mod container;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod netem;
pub mod schedule;
pub mod selector;
pub mod signals;

pub use client::{ContainerClient, DockerClient, MockClient};
pub use command::{ChaosCommand, NetemCommand};
pub use container::Container;
pub use error::ChaosError;
pub use executor::RunContext;
pub use schedule::{RunOutcome, Scheduler};
pub use selector::Selector;
