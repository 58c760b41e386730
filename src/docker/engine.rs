//! bollard-backed [`DockerEngine`]

use crate::config::AuthConfig;
use crate::docker::stream::{DaemonAddress, post_json_lines, registry_auth_header};
use crate::docker::{BuildLog, ContainerDetails, ContainerStatus, ContainerSummary, DockerEngine, EndpointInfo, RunSpec};
use crate::error::{FleetError, Result};
use crate::image::split_image_reference;
use crate::progress::LayerEvent;
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions, ListImagesOptions, PushImageOptions, RemoveImageOptions};
use bollard::models::{DeviceMapping, HostConfig};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BollardEngine {
    client: Docker,
    description: String,
    auth: Option<AuthConfig>,
    /// Socket for requests the typed client cannot decode fully
    address: Option<DaemonAddress>,
}

impl BollardEngine {
    pub fn new(client: Docker, description: String, auth: Option<AuthConfig>) -> Self {
        Self {
            client,
            description,
            auth,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Option<DaemonAddress>) -> Self {
        self.address = address;
        self
    }

    /// Push through the raw status stream so each message keeps its layer id
    fn push_raw(&self, address: DaemonAddress, repository: &str, tag: &str) -> BoxStream<'_, Result<LayerEvent>> {
        let image = format!("{}:{}", repository, tag);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("tag", tag)
            .finish();
        let path = format!("/v{}/images/{}/push?{}", self.client.client_version(), repository, query);
        let credentials = self.auth.as_ref().map(AuthConfig::to_credentials).unwrap_or_default();

        let lines = async move {
            let auth = registry_auth_header(&credentials)?;
            post_json_lines(&address, &path, &auth).await
        };
        stream::once(lines)
            .try_flatten()
            .map(|line| line.and_then(|line| LayerEvent::from_json_line(&line)))
            .map_err(move |e| stream_failure(&image, e))
            .boxed()
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(err, BollardError::DockerResponseServerError { status_code: 404, .. })
}

fn transfer_error(image: &str, err: BollardError) -> FleetError {
    FleetError::Transfer {
        image: image.to_string(),
        message: err.to_string(),
    }
}

fn stream_failure(image: &str, err: FleetError) -> FleetError {
    let message = match err {
        FleetError::Stream(message) => message,
        other => other.to_string(),
    };
    FleetError::Transfer {
        image: image.to_string(),
        message,
    }
}

#[async_trait]
impl DockerEngine for BollardEngine {
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn info(&self) -> Result<EndpointInfo> {
        let info = self.client.info().await?;
        Ok(EndpointInfo {
            name: info.name,
            operating_system: info.operating_system,
            kernel_version: info.kernel_version,
            os_type: info.os_type,
            architecture: info.architecture,
            mem_total: info.mem_total,
            ncpu: info.ncpu,
        })
    }

    fn pull(&self, image: &str) -> BoxStream<'_, Result<LayerEvent>> {
        // An empty tag would make the daemon pull every tag of the repository
        let (repository, tag) = split_image_reference(image);
        let options = CreateImageOptions {
            from_image: repository.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };
        let credentials = self.auth.as_ref().map(AuthConfig::to_credentials);
        let image = image.to_string();

        self.client
            .create_image(Some(options), None, credentials)
            .map(move |item| match item {
                Ok(info) => Ok(LayerEvent {
                    layer_id: info.id,
                    status: info.status,
                }),
                Err(e) => Err(transfer_error(&image, e)),
            })
            .boxed()
    }

    fn push(&self, repository: &str, tag: &str) -> BoxStream<'_, Result<LayerEvent>> {
        if let Some(address) = self.address.clone() {
            return self.push_raw(address, repository, tag);
        }

        // A preconfigured client has no known socket; its typed push messages carry no layer id
        let options = PushImageOptions { tag: tag.to_string() };
        let credentials = self.auth.as_ref().map(AuthConfig::to_credentials);
        let image = format!("{}:{}", repository, tag);

        self.client
            .push_image(repository, Some(options), credentials)
            .map(move |item| match item {
                Ok(info) => Ok(LayerEvent {
                    layer_id: None,
                    status: info.status,
                }),
                Err(e) => Err(transfer_error(&image, e)),
            })
            .boxed()
    }

    fn build(&self, context: Vec<u8>, dockerfile: &str, tag: &str) -> BoxStream<'_, Result<BuildLog>> {
        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            nocache: true,
            rm: true,
            ..Default::default()
        };
        let tag = tag.to_string();

        self.client
            .build_image(options, None, Some(context.into()))
            .map(move |item| match item {
                Ok(info) => match info.error {
                    Some(message) => Err(FleetError::Build {
                        tag: tag.clone(),
                        message,
                    }),
                    None => Ok(BuildLog {
                        stream: info.stream,
                        status: info.status,
                    }),
                },
                Err(e) => Err(FleetError::Build {
                    tag: tag.clone(),
                    message: e.to_string(),
                }),
            })
            .boxed()
    }

    async fn find_images(&self, reference: &str) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);
        let images = self
            .client
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(images.into_iter().map(|image| image.id).collect())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.client.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_image(&self, reference: &str) -> Result<()> {
        self.client
            .remove_image(reference, None::<RemoveImageOptions>, None)
            .await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let containers = self
            .client
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await?;
        Ok(containers
            .into_iter()
            .map(|container| ContainerSummary {
                id: container.id.unwrap_or_default(),
                image: container.image.unwrap_or_default(),
                names: container.names.unwrap_or_default(),
                state: container.state,
            })
            .collect())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerDetails>> {
        let response = match self
            .client
            .inspect_container(name_or_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = response.state.unwrap_or_default();
        let status = state
            .status
            .map(|status| ContainerStatus::parse(&status.to_string()))
            .unwrap_or(ContainerStatus::Unknown);

        Ok(Some(ContainerDetails {
            id: response.id.unwrap_or_default(),
            name: response
                .name
                .map(|name| name.trim_start_matches('/').to_string())
                .unwrap_or_else(|| name_or_id.to_string()),
            status,
            exit_code: state.exit_code,
        }))
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let devices = spec
            .devices
            .iter()
            .map(|device| DeviceMapping {
                path_on_host: Some(device.clone()),
                path_in_container: Some(device.clone()),
                cgroup_permissions: Some("rwm".to_string()),
            })
            .collect::<Vec<_>>();

        let host_config = HostConfig {
            network_mode: spec.network_mode.clone(),
            privileged: Some(spec.privileged),
            auto_remove: Some(spec.auto_remove),
            binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
            devices: (!devices.is_empty()).then_some(devices),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env_list()),
            tty: Some(spec.tty),
            cmd: spec.command.clone(),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            ..Default::default()
        });

        let created = self.client.create_container(options, config).await?;
        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(created.id)
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.client.stop_container(id, None::<StopContainerOptions>).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.client
            .remove_container(id, None::<RemoveContainerOptions>)
            .await?;
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            ..Default::default()
        };
        let chunks: Vec<_> = self.client.logs(id, Some(options)).try_collect().await?;
        Ok(chunks.iter().map(ToString::to_string).collect())
    }
}
