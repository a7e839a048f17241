//! Runtime client: the narrow container-runtime interface the engine uses.
//!
//! [`ContainerClient`] splits into two layers:
//!
//! - required *runtime primitives* (`list_running`, `is_running`, `kill`,
//!   `freeze`, `unfreeze`, `remove`, `exec`, `rename`, `remove_image`)
//!   implemented per backend — [`DockerClient`] against the Docker API,
//!   [`MockClient`] recording calls for tests;
//! - provided *chaos verbs* (`stop`, `pause`, `netem`) composed from the
//!   primitives, so the stop grace-period protocol and the netem
//!   apply/sleep/revert sequence are written once and exercised the same
//!   way against both backends.
//!
//! Dry-run is evaluated at this boundary: every mutating operation, when
//! `dry` is true, emits a `DRY: `-prefixed log line and returns success
//! without contacting the runtime.

mod docker;
mod mock;

pub use docker::{DockerClient, TlsMaterial};
pub use mock::{MockCall, MockClient};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::command::NetemCommand;
use crate::container::Container;
use crate::error::ChaosError;
use crate::netem;
use crate::signals::{DEFAULT_KILL_SIGNAL, DEFAULT_STOP_SIGNAL};

/// Prefix for log lines emitted instead of mutating the runtime.
pub const DRY_RUN_PREFIX: &str = "DRY: ";

/// Predicate applied to each inspected container during listing.
pub type ContainerFilter<'a> = &'a (dyn Fn(&Container) -> bool + Send + Sync);

/// Outcome of polling a container for termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Inspect reported the container no longer running.
    Stopped,
    /// Inspect failed; the container is gone from the runtime.
    Removed,
    /// Still running when the wait elapsed.
    StillRunning,
}

fn prefix(dry: bool) -> &'static str {
    if dry {
        DRY_RUN_PREFIX
    } else {
        ""
    }
}

/// Narrow runtime interface consumed by the chaos executors.
///
/// Implementations must be safe for concurrent use; overlapping
/// dispatcher cycles share one client.
#[async_trait]
pub trait ContainerClient: Send + Sync {
    /// Enumerate running containers, inspect each, and return those
    /// accepted by `filter`. A failed inspect aborts the whole listing.
    async fn list_running(&self, filter: ContainerFilter<'_>)
        -> Result<Vec<Container>, ChaosError>;

    /// Inspect a single container's running state. An error means the
    /// container is no longer known to the runtime.
    async fn is_running(&self, container: &Container) -> Result<bool, ChaosError>;

    /// Send `signal` to the container's main process.
    async fn kill(&self, container: &Container, signal: &str, dry: bool)
        -> Result<(), ChaosError>;

    /// Suspend every process in the container (cgroup freezer).
    async fn freeze(&self, container: &Container) -> Result<(), ChaosError>;

    /// Resume a frozen container.
    async fn unfreeze(&self, container: &Container) -> Result<(), ChaosError>;

    /// Remove the container.
    async fn remove(
        &self,
        container: &Container,
        force: bool,
        links: bool,
        volumes: bool,
        dry: bool,
    ) -> Result<(), ChaosError>;

    /// Create and start an exec session inside the container. Returns
    /// once the exec has *started*, not when it completes.
    async fn exec(
        &self,
        container: &Container,
        argv: &[String],
        privileged: bool,
    ) -> Result<(), ChaosError>;

    /// Rename the container.
    async fn rename(&self, container: &Container, new_name: &str) -> Result<(), ChaosError>;

    /// Remove the image the container was created from.
    async fn remove_image(
        &self,
        container: &Container,
        force: bool,
        dry: bool,
    ) -> Result<(), ChaosError>;

    /// Poll the container once per second until it is no longer running,
    /// it disappears from the runtime, or `wait_secs` elapses.
    async fn wait_for_stop(&self, container: &Container, wait_secs: u64) -> StopOutcome {
        let deadline = Instant::now() + Duration::from_secs(wait_secs);
        loop {
            match self.is_running(container).await {
                Err(err) => {
                    debug!(
                        "inspect of {} ({}) failed, treating as removed: {err}",
                        container.name(),
                        container.id()
                    );
                    return StopOutcome::Removed;
                }
                Ok(false) => return StopOutcome::Stopped,
                Ok(true) => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return StopOutcome::StillRunning;
            }
            sleep(Duration::from_secs(1).min(remaining)).await;
        }
    }

    /// Stop the container: send its stop-signal (label override, else
    /// `SIGTERM`), wait up to `wait_secs`, and escalate to `SIGKILL` if
    /// it is still running. Still running after the second wait is the
    /// "could not be stopped" error.
    async fn stop(&self, container: &Container, wait_secs: u64, dry: bool)
        -> Result<(), ChaosError>
    {
        let signal = container.stop_signal().unwrap_or(DEFAULT_STOP_SIGNAL);
        info!(
            "{}Stopping {} ({}) with {signal}",
            prefix(dry),
            container.name(),
            container.id()
        );
        if dry {
            return Ok(());
        }

        self.kill(container, signal, false).await?;
        match self.wait_for_stop(container, wait_secs).await {
            StopOutcome::Stopped | StopOutcome::Removed => return Ok(()),
            StopOutcome::StillRunning => {}
        }

        debug!(
            "escalating to {DEFAULT_KILL_SIGNAL} for {} ({})",
            container.name(),
            container.id()
        );
        self.kill(container, DEFAULT_KILL_SIGNAL, false).await?;
        match self.wait_for_stop(container, wait_secs).await {
            StopOutcome::Stopped | StopOutcome::Removed => Ok(()),
            StopOutcome::StillRunning => Err(ChaosError::NotStopped {
                name: container.name().to_string(),
                id: container.id().to_string(),
            }),
        }
    }

    /// Pause the container for `duration`, then unpause. An unpause
    /// failure is returned as a leak: the pause stays in effect.
    async fn pause(
        &self,
        container: &Container,
        duration: Duration,
        dry: bool,
    ) -> Result<(), ChaosError> {
        info!(
            "{}Pausing {} ({}) for {duration:?}",
            prefix(dry),
            container.name(),
            container.id()
        );
        if dry {
            return Ok(());
        }

        self.freeze(container).await?;
        sleep(duration).await;
        self.unfreeze(container).await.map_err(|err| ChaosError::Leaked {
            name: container.name().to_string(),
            id: container.id().to_string(),
            source: Box::new(err),
        })?;
        debug!(
            "unpaused {} ({}) after {duration:?}",
            container.name(),
            container.id()
        );
        Ok(())
    }

    /// Apply a netem disruption for the command's duration, then tear
    /// it down.
    ///
    /// Without a target IP this is a single netem qdisc at the interface
    /// root. With one, a prio qdisc is installed first, the netem qdisc
    /// is attached to its band 3, and a u32 filter routes matching
    /// traffic there; each setup exec must start before the next is
    /// issued, and a setup failure surfaces without any teardown
    /// attempt. A teardown failure is returned as a leak.
    async fn netem(
        &self,
        container: &Container,
        command: &NetemCommand,
        dry: bool,
    ) -> Result<(), ChaosError> {
        let spec = command.effect.to_string();
        let interface = command.interface.as_str();
        let duration = command.duration;
        match command.target {
            None => info!(
                "{}Running netem '{spec}' on {} ({}) for {duration:?}",
                prefix(dry),
                container.name(),
                container.id()
            ),
            Some(ip) => info!(
                "{}Running netem '{spec}' on {} ({}) filtered by {ip} for {duration:?}",
                prefix(dry),
                container.name(),
                container.id()
            ),
        }
        if dry {
            return Ok(());
        }

        match command.target {
            None => {
                let argv = netem::qdisc_add_root(interface, &spec);
                debug!("netem setup: {}", argv.join(" "));
                self.exec(container, &argv, true).await?;
            }
            Some(ip) => {
                for argv in [
                    netem::qdisc_add_prio(interface),
                    netem::qdisc_add_band(interface, &spec),
                    netem::filter_add_ip(interface, ip, command.filter_mode),
                ] {
                    debug!("netem setup: {}", argv.join(" "));
                    self.exec(container, &argv, true).await?;
                }
            }
        }

        sleep(duration).await;

        info!(
            "Stopping netem on {} ({})",
            container.name(),
            container.id()
        );
        let argv = netem::qdisc_del_root(interface);
        debug!("netem teardown: {}", argv.join(" "));
        self.exec(container, &argv, true)
            .await
            .map_err(|err| ChaosError::Leaked {
                name: container.name().to_string(),
                id: container.id().to_string(),
                source: Box::new(err),
            })
    }
}
