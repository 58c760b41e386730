//! In-memory Docker engine for integration tests

#![allow(dead_code)]

pub mod daemon;

use async_trait::async_trait;
use fleet_docker::docker::{
    BuildLog, ContainerDetails, ContainerStatus, ContainerSummary, DockerEngine, EndpointInfo, RunSpec,
};
use fleet_docker::error::{FleetError, Result};
use fleet_docker::progress::LayerEvent;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub details: ContainerDetails,
    pub image: String,
}

#[derive(Default)]
pub struct FakeEngine {
    pub info: EndpointInfo,
    pub images: Mutex<Vec<String>>,
    pub failing_removals: HashSet<String>,
    pub removed_images: Mutex<Vec<String>>,
    pub containers: Mutex<Vec<FakeContainer>>,
    pub runs: Mutex<Vec<RunSpec>>,
    pub stopped: Mutex<Vec<String>>,
    pub removed_containers: Mutex<Vec<String>>,
    pub transfer_events: Vec<LayerEvent>,
    pub transfer_error: Option<String>,
    pub pulled: Mutex<Vec<String>>,
    pub build_logs: Vec<BuildLog>,
    pub build_error: Option<String>,
    /// `(tag, dockerfile, context size)` per build
    pub builds: Mutex<Vec<(String, String, usize)>>,
}

impl FakeEngine {
    pub fn with_arch(arch: &str) -> Self {
        Self {
            info: EndpointInfo {
                name: Some("fake".to_string()),
                architecture: Some(arch.to_string()),
                ncpu: Some(4),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_images(self, images: &[&str]) -> Self {
        *self.images.lock().unwrap() = images.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_removal(mut self, image: &str) -> Self {
        self.failing_removals.insert(image.to_string());
        self
    }

    pub fn with_container(self, name: &str, image: &str, status: ContainerStatus, exit_code: Option<i64>) -> Self {
        self.containers.lock().unwrap().push(FakeContainer {
            details: ContainerDetails {
                id: format!("{}-id", name),
                name: name.to_string(),
                status,
                exit_code,
            },
            image: image.to_string(),
        });
        self
    }

    pub fn with_transfer_events(mut self, events: Vec<LayerEvent>) -> Self {
        self.transfer_events = events;
        self
    }

    pub fn with_transfer_error(mut self, message: &str) -> Self {
        self.transfer_error = Some(message.to_string());
        self
    }

    pub fn with_build_logs(mut self, lines: &[&str]) -> Self {
        self.build_logs = lines
            .iter()
            .map(|line| BuildLog {
                stream: Some(line.to_string()),
                status: None,
            })
            .collect();
        self
    }

    pub fn with_build_error(mut self, message: &str) -> Self {
        self.build_error = Some(message.to_string());
        self
    }

    fn events(&self, image: &str) -> BoxStream<'_, Result<LayerEvent>> {
        let mut items: Vec<Result<LayerEvent>> = self.transfer_events.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.transfer_error {
            items.push(Err(FleetError::Transfer {
                image: image.to_string(),
                message: message.clone(),
            }));
        }
        futures::stream::iter(items).boxed()
    }
}

#[async_trait]
impl DockerEngine for FakeEngine {
    fn describe(&self) -> String {
        "fake".to_string()
    }

    async fn info(&self) -> Result<EndpointInfo> {
        Ok(self.info.clone())
    }

    fn pull(&self, image: &str) -> BoxStream<'_, Result<LayerEvent>> {
        self.pulled.lock().unwrap().push(image.to_string());
        self.events(image)
    }

    fn push(&self, repository: &str, tag: &str) -> BoxStream<'_, Result<LayerEvent>> {
        self.events(&format!("{}:{}", repository, tag))
    }

    fn build(&self, context: Vec<u8>, dockerfile: &str, tag: &str) -> BoxStream<'_, Result<BuildLog>> {
        self.builds
            .lock()
            .unwrap()
            .push((tag.to_string(), dockerfile.to_string(), context.len()));
        let mut items: Vec<Result<BuildLog>> = self.build_logs.iter().cloned().map(Ok).collect();
        match &self.build_error {
            Some(message) => items.push(Err(FleetError::Build {
                tag: tag.to_string(),
                message: message.clone(),
            })),
            None => self.images.lock().unwrap().push(tag.to_string()),
        }
        futures::stream::iter(items).boxed()
    }

    async fn find_images(&self, reference: &str) -> Result<Vec<String>> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|image| image.as_str() == reference)
            .map(|image| format!("sha256:{}", image.len()))
            .collect())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        Ok(self.images.lock().unwrap().iter().any(|image| image == reference))
    }

    async fn remove_image(&self, reference: &str) -> Result<()> {
        if self.failing_removals.contains(reference) {
            return Err(FleetError::Docker(format!("conflict: image {} is in use", reference)));
        }
        self.images.lock().unwrap().retain(|image| image != reference);
        self.removed_images.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|container| container.details.status == ContainerStatus::Running)
            .map(|container| ContainerSummary {
                id: container.details.id.clone(),
                image: container.image.clone(),
                names: vec![format!("/{}", container.details.name)],
                state: Some("running".to_string()),
            })
            .collect())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerDetails>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .find(|container| container.details.name == name_or_id || container.details.id == name_or_id)
            .map(|container| container.details.clone()))
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let mut runs = self.runs.lock().unwrap();
        runs.push(spec.clone());
        Ok(format!("container-{}", runs.len()))
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.stopped.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let before = containers.len();
        containers.retain(|container| container.details.id != id);
        if containers.len() == before {
            return Err(FleetError::Docker(format!("No such container: {}", id)));
        }
        self.removed_containers.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        Ok(format!("2024-01-01T00:00:00Z hello from {}\n", id))
    }
}
