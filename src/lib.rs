//! fleet-docker library
//!
//! Docker Engine helpers for a robot fleet: image pull and push with layer progress,
//! endpoint architecture detection, robot container lifecycle and project image cleanup.

pub mod arch;
pub mod cli;
pub mod config;
pub mod container;
pub mod docker;
pub mod error;
pub mod image;
pub mod logging;
pub mod progress;
pub mod project;
pub mod shell;

pub use docker::{DockerEngine, Endpoint};
pub use error::{FleetError, Result};
pub use logging::Logger;
pub use progress::{LayerEvent, TransferKind, TransferProgress};
