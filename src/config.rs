//! Configuration constants, registry selection and registry credentials

use crate::logging::Logger;
use bollard::auth::DockerCredentials;
use std::env;

pub const DEFAULT_MACHINE: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_DOCKER_TCP_PORT: u16 = 2375;
/// Seconds, applied to every API call made through one client
pub const DEFAULT_API_TIMEOUT: u64 = 240;

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const STAGING_REGISTRY: &str = "registry-stage2.duckietown.org";

/// Environment variable overriding the registry when not staging
pub const ENV_REGISTRY: &str = "DOCKER_REGISTRY";
pub const ENV_DOCKERHUB_USERNAME: &str = "DOCKERHUB_USERNAME";
pub const ENV_DOCKERHUB_PASSWORD: &str = "DOCKERHUB_PASSWORD";
pub const ENV_VERBOSE: &str = "FLEET_DOCKER_VERBOSE";

/// Registry credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Both variables must be set; otherwise no login happens
    pub fn from_env() -> Option<Self> {
        Self::from_values(
            env::var(ENV_DOCKERHUB_USERNAME).ok(),
            env::var(ENV_DOCKERHUB_PASSWORD).ok(),
        )
    }

    pub fn from_values(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) => Some(Self::new(username, password)),
            _ => None,
        }
    }

    pub fn to_credentials(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            ..Default::default()
        }
    }
}

/// Pick the registry for a command.
///
/// Staging wins. Otherwise a registry override from the environment that differs
/// from the default replaces the requested registry.
pub fn select_registry(
    staging: bool,
    requested: &str,
    env_override: Option<&str>,
    logger: &Logger,
) -> String {
    let registry = if staging {
        STAGING_REGISTRY.to_string()
    } else {
        match env_override {
            Some(custom) if custom != DEFAULT_REGISTRY => {
                logger.warning(&format!("Using custom {}='{}'.", ENV_REGISTRY, custom));
                custom.to_string()
            }
            _ => requested.to_string(),
        }
    };

    if registry != DEFAULT_REGISTRY {
        logger.info(&format!("Using custom registry: {}", registry));
    }
    registry
}
