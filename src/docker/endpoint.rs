//! Docker endpoint resolution

use crate::config::{AuthConfig, DEFAULT_API_TIMEOUT, DEFAULT_DOCKER_TCP_PORT};
use crate::docker::{BollardEngine, DaemonAddress};
use crate::error::{FleetError, Result};
use crate::logging::Logger;
use bollard::{API_DEFAULT_VERSION, Docker};
use url::Url;

/// Where a daemon lives
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Environment defaults (`DOCKER_HOST` or the local socket)
    Local,
    /// `unix://` path, `tcp://host:port` or a bare hostname
    Remote(String),
    /// Client built elsewhere, used as is
    Handle(Docker),
}

impl Endpoint {
    /// Parse a `--machine` style value. `None` means local defaults.
    pub fn from_machine(machine: Option<&str>) -> Self {
        match machine {
            None => Endpoint::Local,
            Some(address) => Endpoint::Remote(address.to_string()),
        }
    }

    /// Connect and attach registry credentials from the environment.
    ///
    /// A failing ping is only a warning: the first real call reports the error.
    pub async fn connect(self, logger: &Logger) -> Result<BollardEngine> {
        let description = self.to_string();
        let (client, address) = match self {
            Endpoint::Local => {
                let client = Docker::connect_with_local_defaults().map_err(|e| FleetError::Connection {
                    endpoint: description.clone(),
                    message: e.to_string(),
                })?;
                (client, Some(DaemonAddress::local()?))
            }
            Endpoint::Remote(address) => (connect_address(&address)?, Some(DaemonAddress::parse(&address)?)),
            Endpoint::Handle(client) => (client, None),
        };

        if let Err(e) = client.ping().await {
            logger.warning(&format!("Docker endpoint {} did not answer a ping: {}", description, e));
        }

        let auth = AuthConfig::from_env();
        if auth.is_some() {
            logger.debug("Using DockerHub credentials from the environment");
        }

        Ok(BollardEngine::new(client, description, auth).with_address(address))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Local => write!(f, "local"),
            Endpoint::Remote(address) => write!(f, "{}", sanitize_docker_baseurl(address, DEFAULT_DOCKER_TCP_PORT)),
            Endpoint::Handle(_) => write!(f, "preconfigured client"),
        }
    }
}

/// `unix:` and `tcp://` addresses pass through; a bare hostname becomes `tcp://host:port`
pub fn sanitize_docker_baseurl(baseurl: &str, port: u16) -> String {
    if baseurl.starts_with("unix:") || baseurl.starts_with("tcp://") {
        baseurl.to_string()
    } else {
        format!("tcp://{}:{}", baseurl, port)
    }
}

fn connect_address(address: &str) -> Result<Docker> {
    let baseurl = sanitize_docker_baseurl(address, DEFAULT_DOCKER_TCP_PORT);
    let connection_error = |message: String| FleetError::Connection {
        endpoint: baseurl.clone(),
        message,
    };

    if baseurl.starts_with("unix:") {
        return Docker::connect_with_unix(&baseurl, DEFAULT_API_TIMEOUT, API_DEFAULT_VERSION)
            .map_err(|e| connection_error(e.to_string()));
    }

    let parsed = Url::parse(&baseurl)?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(connection_error("missing host".to_string()));
    }
    Docker::connect_with_http(&baseurl, DEFAULT_API_TIMEOUT, API_DEFAULT_VERSION)
        .map_err(|e| connection_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passes_unix_and_tcp_through() {
        assert_eq!(
            sanitize_docker_baseurl("unix:///var/run/docker.sock", 2375),
            "unix:///var/run/docker.sock"
        );
        assert_eq!(sanitize_docker_baseurl("tcp://10.0.0.5:2376", 2375), "tcp://10.0.0.5:2376");
    }

    #[test]
    fn test_sanitize_wraps_bare_hostnames() {
        assert_eq!(sanitize_docker_baseurl("robot1.local", 2375), "tcp://robot1.local:2375");
        assert_eq!(sanitize_docker_baseurl("192.168.1.20", 4243), "tcp://192.168.1.20:4243");
    }

    #[test]
    fn test_from_machine() {
        assert!(matches!(Endpoint::from_machine(None), Endpoint::Local));
        assert!(matches!(
            Endpoint::from_machine(Some("robot1")),
            Endpoint::Remote(address) if address == "robot1"
        ));
    }

    #[test]
    fn test_display_sanitizes_remote() {
        assert_eq!(Endpoint::Remote("robot1".into()).to_string(), "tcp://robot1:2375");
        assert_eq!(Endpoint::Local.to_string(), "local");
    }

    #[test]
    fn test_connect_address_rejects_empty_host() {
        assert!(connect_address("tcp://:2375").is_err());
    }
}
