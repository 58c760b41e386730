//! Docker Engine access
//!
//! Every daemon call goes through the [`DockerEngine`] trait. [`BollardEngine`] implements
//! it on top of the bollard client; an [`Endpoint`] is resolved into an engine once, at the
//! command boundary.

pub mod endpoint;
pub mod engine;
pub mod info;
pub mod stream;

pub use endpoint::Endpoint;
pub use engine::BollardEngine;
pub use info::{endpoint_architecture, endpoint_ncpus, info_rows};
pub use stream::DaemonAddress;

use crate::error::Result;
use crate::progress::LayerEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use std::collections::BTreeMap;

/// Subset of the daemon's `/info` response
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointInfo {
    pub name: Option<String>,
    pub operating_system: Option<String>,
    pub kernel_version: Option<String>,
    pub os_type: Option<String>,
    pub architecture: Option<String>,
    pub mem_total: Option<i64>,
    pub ncpu: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub image: String,
    pub names: Vec<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" | "stopped" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            _ => ContainerStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub exit_code: Option<i64>,
}

/// Parameters of a detached `docker run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: Option<String>,
    pub env: BTreeMap<String, String>,
    /// `host:container[:mode]` bind strings
    pub binds: Vec<String>,
    pub devices: Vec<String>,
    pub network_mode: Option<String>,
    pub privileged: bool,
    pub auto_remove: bool,
    pub tty: bool,
    pub command: Option<Vec<String>>,
}

impl RunSpec {
    pub fn env_list(&self) -> Vec<String> {
        self.env.iter().map(|(key, value)| format!("{}={}", key, value)).collect()
    }
}

/// One message of an image build stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLog {
    /// Build output text, usually ending with a newline
    pub stream: Option<String>,
    /// Status lines such as `Successfully tagged ...`
    pub status: Option<String>,
}

/// Operations needed from a Docker daemon.
///
/// Lookups return `Option`/empty collections for missing objects; only daemon and
/// transport failures are errors.
#[async_trait]
pub trait DockerEngine: Send + Sync {
    /// Human-readable endpoint description for log lines
    fn describe(&self) -> String;

    async fn info(&self) -> Result<EndpointInfo>;

    /// Stream of layer status messages while pulling `image`
    fn pull(&self, image: &str) -> BoxStream<'_, Result<LayerEvent>>;

    /// Stream of layer status messages while pushing `repository:tag`
    fn push(&self, repository: &str, tag: &str) -> BoxStream<'_, Result<LayerEvent>>;

    /// Build `tag` from a tar archive of the build context
    fn build(&self, context: Vec<u8>, dockerfile: &str, tag: &str) -> BoxStream<'_, Result<BuildLog>>;

    /// IDs of local images matching `reference`
    async fn find_images(&self, reference: &str) -> Result<Vec<String>>;

    async fn image_exists(&self, reference: &str) -> Result<bool>;

    async fn remove_image(&self, reference: &str) -> Result<()>;

    /// Running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerDetails>>;

    /// Create and start a container, returning its id
    async fn run_container(&self, spec: &RunSpec) -> Result<String>;

    async fn stop_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Full stdout and stderr of a container, with timestamps
    async fn container_logs(&self, id: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_status_parse() {
        assert_eq!(ContainerStatus::parse("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::parse("exited"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::parse("stopped"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::parse("bogus"), ContainerStatus::Unknown);
    }

    #[test]
    fn test_env_list_is_sorted_key_value() {
        let mut spec = RunSpec::default();
        spec.env.insert("B".into(), "2".into());
        spec.env.insert("A".into(), "1".into());
        assert_eq!(spec.env_list(), vec!["A=1".to_string(), "B=2".to_string()]);
    }
}
