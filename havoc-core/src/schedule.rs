//! Recurrent scheduling of chaos commands.
//!
//! A timer task feeds command values into a rendezvous channel; the run
//! loop spawns one dispatcher cycle per received command. Cycles may
//! overlap when a cycle outlasts the interval; ticks themselves are
//! serial. On shutdown no further tick is dispatched and every spawned
//! cycle is awaited before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, info};

use crate::client::ContainerClient;
use crate::command::ChaosCommand;
use crate::executor::{run_command, RunContext};
use crate::lifecycle::Shutdown;
use crate::selector::Selector;

/// Why the scheduler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// One-shot mode fired and its cycle finished.
    Completed,
    /// Shutdown was requested; in-flight cycles have drained.
    Interrupted,
}

/// Fires the dispatcher on a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
    test_run: bool,
}

impl Scheduler {
    /// A scheduler firing every `interval`. With `test_run` it fires
    /// exactly once, after `interval` elapses.
    pub fn new(interval: Duration, test_run: bool) -> Self {
        Self { interval, test_run }
    }

    /// Drive the command until one-shot completion or shutdown.
    pub async fn run(
        &self,
        client: Arc<dyn ContainerClient>,
        ctx: RunContext,
        command: ChaosCommand,
        selector: Selector,
        mut shutdown: Shutdown,
    ) -> RunOutcome {
        info!(
            "scheduling '{}' every {:?}{}",
            command.kind(),
            self.interval,
            if self.test_run { " (one shot)" } else { "" }
        );

        let (tx, mut rx) = mpsc::channel::<ChaosCommand>(1);
        let interval = self.interval;
        let test_run = self.test_run;
        let timer = tokio::spawn(async move {
            if test_run {
                sleep(interval).await;
                let _ = tx.send(command).await;
            } else {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                loop {
                    ticker.tick().await;
                    if tx.send(command.clone()).await.is_err() {
                        break;
                    }
                }
            }
        });

        let selector = Arc::new(selector);
        let mut cycles = JoinSet::new();
        let outcome = loop {
            tokio::select! {
                // Checked first so a pending tick never wins over a
                // pending shutdown.
                biased;
                _ = shutdown.triggered() => break RunOutcome::Interrupted,
                received = rx.recv() => match received {
                    Some(command) => {
                        let client = Arc::clone(&client);
                        let selector = Arc::clone(&selector);
                        cycles.spawn(async move {
                            if let Err(err) =
                                run_command(client.as_ref(), ctx, &command, &selector).await
                            {
                                // Logged per target by the dispatcher;
                                // the schedule itself never aborts.
                                debug!("cycle ended with error: {err}");
                            }
                        });
                    }
                    None => break RunOutcome::Completed,
                },
            }
        };

        // Stop the tick source before draining so no new cycle can
        // start, then let in-flight disruptions revert.
        drop(rx);
        timer.abort();
        while cycles.join_next().await.is_some() {}
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockCall, MockClient};
    use crate::container::Container;
    use crate::lifecycle::shutdown_channel;
    use std::collections::HashMap;

    fn running(id: &str, name: &str) -> Container {
        Container::new(id, name, "img", HashMap::new(), true)
    }

    fn kill() -> ChaosCommand {
        ChaosCommand::Kill {
            signal: "SIGKILL".into(),
        }
    }

    #[tokio::test]
    async fn one_shot_fires_exactly_once() {
        let client = Arc::new(MockClient::new(vec![running("1", "/a")]));
        let (_trigger, shutdown) = shutdown_channel();
        let scheduler = Scheduler::new(Duration::from_millis(10), true);

        let outcome = scheduler
            .run(
                client.clone(),
                RunContext::default(),
                kill(),
                Selector::All,
                shutdown,
            )
            .await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn recurring_fires_until_shutdown() {
        let client = Arc::new(MockClient::new(vec![running("1", "/a")]));
        let (trigger, shutdown) = shutdown_channel();
        let scheduler = Scheduler::new(Duration::from_millis(10), false);

        let run = tokio::spawn({
            let client = client.clone();
            async move {
                scheduler
                    .run(
                        client,
                        RunContext::default(),
                        kill(),
                        Selector::All,
                        shutdown,
                    )
                    .await
            }
        });

        sleep(Duration::from_millis(55)).await;
        trigger.trigger();
        let outcome = run.await.expect("scheduler task should not panic");

        assert_eq!(outcome, RunOutcome::Interrupted);
        let fired = client.calls().len();
        assert!(fired >= 2, "expected several ticks, got {fired}");
    }

    #[tokio::test]
    async fn no_tick_dispatched_after_shutdown() {
        let client = Arc::new(MockClient::new(vec![running("1", "/a")]));
        let (trigger, shutdown) = shutdown_channel();
        let scheduler = Scheduler::new(Duration::from_millis(10), false);

        let run = tokio::spawn({
            let client = client.clone();
            async move {
                scheduler
                    .run(
                        client,
                        RunContext::default(),
                        kill(),
                        Selector::All,
                        shutdown,
                    )
                    .await
            }
        });

        sleep(Duration::from_millis(35)).await;
        trigger.trigger();
        run.await.expect("scheduler task should not panic");

        let fired = client.calls().len();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(client.calls().len(), fired, "ticks continued after shutdown");
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_pause() {
        let client = Arc::new(MockClient::new(vec![running("1", "/a")]));
        let (trigger, shutdown) = shutdown_channel();
        let scheduler = Scheduler::new(Duration::from_millis(10), true);

        let run = tokio::spawn({
            let client = client.clone();
            async move {
                scheduler
                    .run(
                        client,
                        RunContext::default(),
                        ChaosCommand::Pause {
                            duration: Duration::from_millis(40),
                        },
                        Selector::All,
                        shutdown,
                    )
                    .await
            }
        });

        // Let the one-shot fire and the pause begin, then interrupt
        // mid-disruption.
        sleep(Duration::from_millis(25)).await;
        trigger.trigger();
        run.await.expect("scheduler task should not panic");

        let calls = client.calls();
        assert!(
            calls.contains(&MockCall::Unfreeze { id: "1".into() }),
            "revert must complete before exit, got {calls:?}"
        );
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_fires_nothing() {
        let client = Arc::new(MockClient::new(vec![running("1", "/a")]));
        let (trigger, shutdown) = shutdown_channel();
        trigger.trigger();

        let scheduler = Scheduler::new(Duration::from_millis(20), false);
        let outcome = scheduler
            .run(
                client.clone(),
                RunContext::default(),
                kill(),
                Selector::All,
                shutdown,
            )
            .await;

        assert_eq!(outcome, RunOutcome::Interrupted);
        assert!(client.calls().is_empty());
    }
}
