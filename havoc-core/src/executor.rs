//! Chaos dispatcher: one cycle of resolve + fan-out.
//!
//! A cycle resolves the current target set, applies the command to every
//! target concurrently, and aggregates failures: targets are never
//! skipped because a sibling failed, and the first error (in target
//! order) is returned once all targets have been attempted.

use futures_util::future;
use tracing::{debug, error, warn};

use crate::client::ContainerClient;
use crate::command::ChaosCommand;
use crate::container::Container;
use crate::error::ChaosError;
use crate::selector::Selector;

/// Per-invocation switches threaded through the dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunContext {
    /// Log-only mode; no mutating runtime call is made.
    pub dry: bool,
    /// Narrow each tick's match set to one random container.
    pub random: bool,
}

/// Apply `command` to a single container.
async fn apply_one(
    client: &dyn ContainerClient,
    ctx: RunContext,
    command: &ChaosCommand,
    container: &Container,
) -> Result<(), ChaosError> {
    match command {
        ChaosCommand::Kill { signal } => client.kill(container, signal, ctx.dry).await,
        ChaosCommand::Stop { wait_secs } => client.stop(container, *wait_secs, ctx.dry).await,
        ChaosCommand::Remove {
            force,
            links,
            volumes,
        } => {
            client
                .remove(container, *force, *links, *volumes, ctx.dry)
                .await
        }
        ChaosCommand::Pause { duration } => client.pause(container, *duration, ctx.dry).await,
        ChaosCommand::Netem(netem) => client.netem(container, netem, ctx.dry).await,
    }
}

/// Run one dispatcher cycle: resolve targets and fan the command out.
pub async fn run_command(
    client: &dyn ContainerClient,
    ctx: RunContext,
    command: &ChaosCommand,
    selector: &Selector,
) -> Result<(), ChaosError> {
    let targets = match selector.resolve(client, ctx.random).await {
        Ok(targets) => targets,
        Err(err) => {
            error!("target resolution failed: {err}");
            return Err(err);
        }
    };
    if targets.is_empty() {
        debug!("no matching containers for '{}'", command.kind());
        return Ok(());
    }

    let results = future::join_all(
        targets
            .iter()
            .map(|container| apply_one(client, ctx, command, container)),
    )
    .await;

    let mut first_err = None;
    for (container, result) in targets.iter().zip(results) {
        if let Err(err) = result {
            if err.is_leak() {
                warn!("LEAKED: {err}");
            } else {
                error!(
                    "'{}' failed on {} ({}): {err}",
                    command.kind(),
                    container.name(),
                    container.id()
                );
            }
            if first_err.is_none() {
                first_err = Some(err);
            }
        }
    }
    match first_err {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
