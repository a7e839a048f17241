//! Slack forwarding of WARN/ERROR log events.
//!
//! A [`SlackLayer`] queues formatted events onto an unbounded channel; a
//! background task delivers them to a Slack incoming webhook so that
//! operators see disruption failures (and leaks in particular) without
//! tailing the engine's stdout.

use std::fmt::Write as _;

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// `tracing` layer that posts WARN and ERROR events to a Slack webhook.
pub struct SlackLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl SlackLayer {
    /// Create the layer and spawn its delivery task. Must be called
    /// from within a tokio runtime.
    pub fn spawn(hook_url: String, channel: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let http = reqwest::Client::new();
            while let Some(text) = rx.recv().await {
                let payload = serde_json::json!({
                    "channel": channel,
                    "username": "havoc",
                    "icon_emoji": ":boar:",
                    "text": text,
                });
                if let Err(err) = http.post(&hook_url).json(&payload).send().await {
                    // Not routed through tracing: a failing hook must not
                    // generate events that feed back into this layer.
                    eprintln!("slack hook delivery failed: {err}");
                }
            }
        });
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for SlackLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > Level::WARN {
            return;
        }
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        if !message.is_empty() {
            let _ = self
                .tx
                .send(format!("[{}] {message}", event.metadata().level()));
        }
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl Visit for MessageVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        }
    }
}
