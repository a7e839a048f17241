//! Docker implementation of the runtime client, via bollard.

use std::path::PathBuf;

use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, KillContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RenameContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions};
use bollard::image::RemoveImageOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::{debug, info};

use super::{prefix, ContainerClient, ContainerFilter};
use crate::container::Container;
use crate::error::ChaosError;

/// Connection timeout for the Docker API, seconds.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Client certificate material for a TLS connection to the daemon.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    /// CA certificate path.
    pub ca: PathBuf,
    /// Client certificate path.
    pub cert: PathBuf,
    /// Client key path.
    pub key: PathBuf,
}

/// [`ContainerClient`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the daemon at `host` (`unix://`, `tcp://` or `http://`),
    /// with TLS when certificate material is supplied.
    pub fn connect(host: &str, tls: Option<&TlsMaterial>) -> Result<Self, ChaosError> {
        let docker = if host.starts_with("unix://") {
            Docker::connect_with_unix(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        } else if let Some(tls) = tls {
            Docker::connect_with_ssl(
                host,
                &tls.key,
                &tls.cert,
                &tls.ca,
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?
        } else {
            Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        };
        Ok(Self { docker })
    }

}

#[async_trait]
impl ContainerClient for DockerClient {
    async fn list_running(
        &self,
        filter: ContainerFilter<'_>,
    ) -> Result<Vec<Container>, ChaosError> {
        debug!("retrieving running containers");
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await?;

        let mut accepted = Vec::new();
        for summary in summaries {
            let id = summary.id.unwrap_or_default();
            let inspect = self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await?;
            let name = inspect.name.unwrap_or_default();
            debug!("running container: {name} ({id})");

            let image_ref = inspect.image.unwrap_or_default();
            let image = self.docker.inspect_image(&image_ref).await?;

            let container = Container::new(
                id,
                name,
                image.id.unwrap_or(image_ref),
                inspect
                    .config
                    .and_then(|config| config.labels)
                    .unwrap_or_default(),
                inspect
                    .state
                    .and_then(|state| state.running)
                    .unwrap_or(false),
            );
            if filter(&container) {
                accepted.push(container);
            }
        }
        Ok(accepted)
    }

    async fn is_running(&self, container: &Container) -> Result<bool, ChaosError> {
        let inspect = self
            .docker
            .inspect_container(container.id(), None::<InspectContainerOptions>)
            .await?;
        Ok(inspect
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    async fn kill(
        &self,
        container: &Container,
        signal: &str,
        dry: bool,
    ) -> Result<(), ChaosError> {
        info!(
            "{}Killing {} ({}) with signal {signal}",
            prefix(dry),
            container.name(),
            container.id()
        );
        if dry {
            return Ok(());
        }
        self.docker
            .kill_container(container.id(), Some(KillContainerOptions { signal }))
            .await?;
        Ok(())
    }

    async fn freeze(&self, container: &Container) -> Result<(), ChaosError> {
        self.docker.pause_container(container.id()).await?;
        Ok(())
    }

    async fn unfreeze(&self, container: &Container) -> Result<(), ChaosError> {
        self.docker.unpause_container(container.id()).await?;
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
        info!(
            "{}Removing {} ({})",
            prefix(dry),
            container.name(),
            container.id()
        );
        if dry {
            return Ok(());
        }
        self.docker
            .remove_container(
                container.id(),
                Some(RemoveContainerOptions {
                    force,
                    link: links,
                    v: volumes,
                }),
            )
            .await?;
        Ok(())
    }

    async fn exec(
        &self,
        container: &Container,
        argv: &[String],
        privileged: bool,
    ) -> Result<(), ChaosError> {
        let created = self
            .docker
            .create_exec(
                container.id(),
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    privileged: Some(privileged),
                    attach_stdout: Some(false),
                    attach_stderr: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        debug!("starting exec {} ({})", argv.join(" "), created.id);
        self.docker
            .start_exec(
                &created.id,
                Some(StartExecOptions {
                    detach: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn rename(&self, container: &Container, new_name: &str) -> Result<(), ChaosError> {
        debug!(
            "renaming container {} ({}) to {new_name}",
            container.name(),
            container.id()
        );
        self.docker
            .rename_container(container.id(), RenameContainerOptions { name: new_name })
            .await?;
        Ok(())
    }

    async fn remove_image(
        &self,
        container: &Container,
        force: bool,
        dry: bool,
    ) -> Result<(), ChaosError> {
        info!("{}Removing image {}", prefix(dry), container.image_id());
        if dry {
            return Ok(());
        }
        self.docker
            .remove_image(
                container.image_id(),
                Some(RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        Ok(())
    }
}
