//! Raw JSON-lines requests to the daemon
//!
//! Some daemon streams carry fields the typed client drops (the layer `id` of push
//! status messages). Those requests are sent here over a plain HTTP/1 connection and
//! the body is handed back line by line.

use crate::config::{DEFAULT_API_TIMEOUT, DEFAULT_DOCKER_TCP_PORT};
use crate::docker::endpoint::sanitize_docker_baseurl;
use crate::error::{FleetError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bollard::auth::DockerCredentials;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpStream, UnixStream};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use url::Url;

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Socket a daemon listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonAddress {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl DaemonAddress {
    /// Parse a `unix://`, `tcp://` or bare host address
    pub fn parse(address: &str) -> Result<Self> {
        let baseurl = sanitize_docker_baseurl(address, DEFAULT_DOCKER_TCP_PORT);
        if let Some(path) = baseurl.strip_prefix("unix://") {
            return Ok(DaemonAddress::Unix(PathBuf::from(path)));
        }

        let parsed = Url::parse(&baseurl)?;
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| FleetError::Connection {
                endpoint: baseurl.clone(),
                message: "missing host".to_string(),
            })?;
        let port = parsed.port().unwrap_or(DEFAULT_DOCKER_TCP_PORT);
        Ok(DaemonAddress::Tcp(format!("{}:{}", host, port)))
    }

    /// `DOCKER_HOST` when set, the local socket otherwise
    pub fn local() -> Result<Self> {
        match std::env::var("DOCKER_HOST") {
            Ok(host) if !host.is_empty() => Self::parse(&host),
            _ => Ok(DaemonAddress::Unix(PathBuf::from(DEFAULT_SOCKET))),
        }
    }
}

impl std::fmt::Display for DaemonAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonAddress::Unix(path) => write!(f, "unix://{}", path.display()),
            DaemonAddress::Tcp(authority) => write!(f, "tcp://{}", authority),
        }
    }
}

/// Value of the `X-Registry-Auth` header
pub fn registry_auth_header(credentials: &DockerCredentials) -> Result<String> {
    Ok(STANDARD.encode(serde_json::to_string(credentials)?))
}

/// POST `path_and_query` and stream the non-empty lines of the response body.
///
/// A non-success status is returned as an error carrying the daemon's message.
pub async fn post_json_lines(
    address: &DaemonAddress,
    path_and_query: &str,
    registry_auth: &str,
) -> Result<BoxStream<'static, Result<String>>> {
    let request = Request::post(path_and_query)
        .header(HOST, "docker")
        .header(CONTENT_TYPE, "application/json")
        .header("X-Registry-Auth", registry_auth)
        .body(Empty::<Bytes>::new())
        .map_err(|e| FleetError::Docker(e.to_string()))?;

    let response = tokio::time::timeout(Duration::from_secs(DEFAULT_API_TIMEOUT), send(address, request))
        .await
        .map_err(|_| FleetError::Connection {
            endpoint: address.to_string(),
            message: format!("no answer within {}s", DEFAULT_API_TIMEOUT),
        })??;

    let status = response.status();
    if !status.is_success() {
        let body = response.into_body().collect().await?.to_bytes();
        return Err(FleetError::Docker(format!(
            "{} returned {}: {}",
            path_and_query,
            status,
            String::from_utf8_lossy(&body).trim()
        )));
    }

    let body = response.into_body().into_data_stream().map_err(std::io::Error::other);
    let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new())
        .map_err(|e| FleetError::Docker(e.to_string()))
        .try_filter(|line| futures::future::ready(!line.trim().is_empty()))
        .boxed();
    Ok(lines)
}

async fn send(address: &DaemonAddress, request: Request<Empty<Bytes>>) -> Result<Response<Incoming>> {
    match address {
        DaemonAddress::Unix(path) => {
            let stream = UnixStream::connect(path).await?;
            send_over(TokioIo::new(stream), request).await
        }
        DaemonAddress::Tcp(authority) => {
            let stream = TcpStream::connect(authority.as_str()).await?;
            send_over(TokioIo::new(stream), request).await
        }
    }
}

async fn send_over<T>(io: T, request: Request<Empty<Bytes>>) -> Result<Response<Incoming>>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, connection) = http1::handshake(io).await?;
    tokio::spawn(async move {
        // Errors surface through the response body
        let _ = connection.await;
    });
    Ok(sender.send_request(request).await?)
}
