//! Container handle built from runtime inspection.

use std::collections::HashMap;

/// Label consulted for a per-container stop-signal override.
pub const STOP_SIGNAL_LABEL: &str = "havoc.stop-signal";

/// One container observed on the runtime.
///
/// Built by the runtime client from a list/inspect round trip, handed to
/// an executor for the duration of a single action, and discarded after
/// each dispatcher tick. The `id` stays meaningful to the runtime client
/// for the lifetime of the actual container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: String,
    name: String,
    image_id: String,
    labels: HashMap<String, String>,
    running: bool,
}

impl Container {
    /// Build a handle from inspection data. The name is kept raw; Docker
    /// reports it with a leading `/`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image_id: impl Into<String>,
        labels: HashMap<String, String>,
        running: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_id: image_id.into(),
            labels,
            running,
        }
    }

    /// Stable runtime identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name with the leading `/` stripped.
    pub fn name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }

    /// Identifier of the image the container was created from.
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Whether the container was running at inspection time.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Stop-signal override from the container's labels, if present.
    pub fn stop_signal(&self) -> Option<&str> {
        self.labels.get(STOP_SIGNAL_LABEL).map(String::as_str)
    }
}
