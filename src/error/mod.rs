//! Error types shared by every fleet-docker operation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Error, Debug)]
pub enum FleetError {
    /// Error reported by the Docker daemon for a request
    #[error("Docker error: {0}")]
    Docker(String),

    /// The endpoint could not be reached or the address is malformed
    #[error("Connection error for '{endpoint}': {message}")]
    Connection { endpoint: String, message: String },

    /// The endpoint reports an architecture missing from the canonical table
    #[error("Architecture {0} not supported!")]
    UnsupportedArchitecture(String),

    /// A shell command exited with a non-zero status
    #[error("The command {command} returned exit code {code}")]
    CommandFailed { command: String, code: i32 },

    /// Image transfer stream reported an error
    #[error("Transfer error for '{image}': {message}")]
    Transfer { image: String, message: String },

    /// An `error` message inside a daemon status stream
    #[error("Daemon reported: {0}")]
    Stream(String),

    #[error("Build error for '{tag}': {message}")]
    Build { tag: String, message: String },

    #[error("Project error: {0}")]
    Project(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<bollard::errors::Error> for FleetError {
    fn from(err: bollard::errors::Error) -> Self {
        FleetError::Docker(err.to_string())
    }
}

impl From<hyper::Error> for FleetError {
    fn from(err: hyper::Error) -> Self {
        FleetError::Docker(format!("HTTP transport: {}", err))
    }
}

impl From<url::ParseError> for FleetError {
    fn from(err: url::ParseError) -> Self {
        FleetError::Config(format!("Invalid URL: {}", err))
    }
}
