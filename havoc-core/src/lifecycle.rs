//! Termination signals and cooperative shutdown.
//!
//! A [`ShutdownTrigger`] flips a watch channel once; every [`Shutdown`]
//! clone observes it. The scheduler stops issuing ticks on shutdown and
//! drains in-flight executors, so revert steps (unpause, netem teardown)
//! run to completion before the process exits.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Create a connected trigger/observer pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Flips the process into shutdown. Held by the signal listener.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side of the shutdown switch.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Wait until shutdown is requested. Returns immediately if it
    /// already was, or if the trigger was dropped without firing.
    pub async fn triggered(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Non-blocking check.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Spawn a task that trips `trigger` on SIGINT or SIGTERM.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("termination signal received, draining in-flight chaos");
        trigger.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            error!("cannot install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_observer() {
        let (trigger, mut shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move {
            shutdown.triggered().await;
        });
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("observer should wake")
            .expect("observer task should not panic");
    }

    #[tokio::test]
    async fn clones_all_observe_the_trigger() {
        let (trigger, shutdown) = shutdown_channel();
        let mut a = shutdown.clone();
        let mut b = shutdown;
        trigger.trigger();
        a.triggered().await;
        b.triggered().await;
        assert!(a.is_triggered());
    }

    #[tokio::test]
    async fn dropped_trigger_releases_waiters() {
        let (trigger, mut shutdown) = shutdown_channel();
        drop(trigger);
        // Must not hang.
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("waiter should return once the trigger is gone");
    }
}
