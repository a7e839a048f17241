//! Recording mock of the runtime client, for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ContainerClient, ContainerFilter};
use crate::container::Container;
use crate::error::ChaosError;

/// One recorded runtime call.
///
/// Dry-run operations record nothing: a recorded call stands for an
/// actual request hitting the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `kill` with a signal name.
    Kill {
        /// Target container id.
        id: String,
        /// Signal name sent.
        signal: String,
    },
    /// `freeze` (runtime pause).
    Freeze {
        /// Target container id.
        id: String,
    },
    /// `unfreeze` (runtime unpause).
    Unfreeze {
        /// Target container id.
        id: String,
    },
    /// `remove`.
    Remove {
        /// Target container id.
        id: String,
        /// Force flag.
        force: bool,
        /// Remove-links flag.
        links: bool,
        /// Remove-volumes flag.
        volumes: bool,
    },
    /// `exec` of an argv inside the container.
    Exec {
        /// Target container id.
        id: String,
        /// Full argv, `tc` included.
        argv: Vec<String>,
        /// Privileged exec flag.
        privileged: bool,
    },
    /// `rename`.
    Rename {
        /// Target container id.
        id: String,
        /// New display name.
        new_name: String,
    },
    /// `remove_image`.
    RemoveImage {
        /// Image identifier.
        image_id: String,
        /// Force flag.
        force: bool,
    },
}

/// In-memory [`ContainerClient`] that records every runtime call.
///
/// Containers passed to [`MockClient::new`] are what `list_running`
/// serves and what `is_running` answers for; a container absent from the
/// set behaves as removed (inspect failure).
pub struct MockClient {
    containers: Vec<Container>,
    running: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<MockCall>>,
    auto_stop_on_kill: bool,
    fail_unfreeze: bool,
    fail_exec_at: Option<usize>,
    fail_kill_ids: Vec<String>,
}

impl MockClient {
    /// Mock serving the given containers.
    pub fn new(containers: Vec<Container>) -> Self {
        let running = containers
            .iter()
            .map(|c| (c.id().to_string(), c.running()))
            .collect();
        Self {
            containers,
            running: Mutex::new(running),
            calls: Mutex::new(Vec::new()),
            auto_stop_on_kill: false,
            fail_unfreeze: false,
            fail_exec_at: None,
            fail_kill_ids: Vec::new(),
        }
    }

    /// Containers transition to not-running after any kill.
    pub fn auto_stop_on_kill(mut self) -> Self {
        self.auto_stop_on_kill = true;
        self
    }

    /// `unfreeze` fails with a server error.
    pub fn fail_unfreeze(mut self) -> Self {
        self.fail_unfreeze = true;
        self
    }

    /// The `index`-th exec call (0-based) fails with a server error.
    pub fn fail_exec_at(mut self, index: usize) -> Self {
        self.fail_exec_at = Some(index);
        self
    }

    /// `kill` fails for the given container id.
    pub fn fail_kill_for(mut self, id: impl Into<String>) -> Self {
        self.fail_kill_ids.push(id.into());
        self
    }

    /// Snapshot of all recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    /// Just the exec argvs, in order.
    pub fn exec_argvs(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::Exec { argv, .. } => Some(argv),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().expect("mock lock poisoned").push(call);
    }

    fn server_error(message: &str) -> ChaosError {
        ChaosError::Runtime(bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl ContainerClient for MockClient {
    async fn list_running(
        &self,
        filter: ContainerFilter<'_>,
    ) -> Result<Vec<Container>, ChaosError> {
        Ok(self
            .containers
            .iter()
            .filter(|c| c.running() && filter(c))
            .cloned()
            .collect())
    }

    async fn is_running(&self, container: &Container) -> Result<bool, ChaosError> {
        self.running
            .lock()
            .expect("mock lock poisoned")
            .get(container.id())
            .copied()
            .ok_or_else(|| Self::server_error("no such container"))
    }

    async fn kill(
        &self,
        container: &Container,
        signal: &str,
        dry: bool,
    ) -> Result<(), ChaosError> {
        if dry {
            return Ok(());
        }
        if self.fail_kill_ids.iter().any(|id| id == container.id()) {
            return Err(Self::server_error("kill refused"));
        }
        self.record(MockCall::Kill {
            id: container.id().to_string(),
            signal: signal.to_string(),
        });
        if self.auto_stop_on_kill {
            self.running
                .lock()
                .expect("mock lock poisoned")
                .insert(container.id().to_string(), false);
        }
        Ok(())
    }

    async fn freeze(&self, container: &Container) -> Result<(), ChaosError> {
        self.record(MockCall::Freeze {
            id: container.id().to_string(),
        });
        Ok(())
    }

    async fn unfreeze(&self, container: &Container) -> Result<(), ChaosError> {
        if self.fail_unfreeze {
            return Err(Self::server_error("unpause refused"));
        }
        self.record(MockCall::Unfreeze {
            id: container.id().to_string(),
        });
        Ok(())
    }

    async fn remove(
        &self,
        container: &Container,
        force: bool,
        links: bool,
        volumes: bool,
        dry: bool,
    ) -> Result<(), ChaosError> {
        if dry {
            return Ok(());
        }
        self.record(MockCall::Remove {
            id: container.id().to_string(),
            force,
            links,
            volumes,
        });
        Ok(())
    }

    async fn exec(
        &self,
        container: &Container,
        argv: &[String],
        privileged: bool,
    ) -> Result<(), ChaosError> {
        let execs_so_far = self
            .calls()
            .iter()
            .filter(|call| matches!(call, MockCall::Exec { .. }))
            .count();
        if self.fail_exec_at == Some(execs_so_far) {
            return Err(Self::server_error("exec refused"));
        }
        self.record(MockCall::Exec {
            id: container.id().to_string(),
            argv: argv.to_vec(),
            privileged,
        });
        Ok(())
    }

    async fn rename(&self, container: &Container, new_name: &str) -> Result<(), ChaosError> {
        self.record(MockCall::Rename {
            id: container.id().to_string(),
            new_name: new_name.to_string(),
        });
        Ok(())
    }

    async fn remove_image(
        &self,
        container: &Container,
        force: bool,
        dry: bool,
    ) -> Result<(), ChaosError> {
        if dry {
            return Ok(());
        }
        self.record(MockCall::RemoveImage {
            image_id: container.image_id().to_string(),
            force,
        });
        Ok(())
    }
}
