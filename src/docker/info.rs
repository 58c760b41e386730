//! Endpoint information: architecture, CPU count and the summary block

use crate::arch::require_canonical_arch;
use crate::docker::{DockerEngine, EndpointInfo};
use crate::error::{FleetError, Result};
use crate::logging::Logger;

/// Canonical architecture tag of the endpoint.
///
/// An architecture missing from the table yields `UnsupportedArchitecture`; callers
/// treat it as fatal.
pub async fn endpoint_architecture(engine: &dyn DockerEngine, logger: &Logger) -> Result<&'static str> {
    let info = engine.info().await?;
    let reported = info
        .architecture
        .ok_or_else(|| FleetError::Docker(format!("{} did not report an architecture", engine.describe())))?;
    let canonical = require_canonical_arch(&reported)?;
    logger.debug(&format!("Endpoint architecture {} maps to {}", reported, canonical));
    Ok(canonical)
}

/// Number of CPUs on the endpoint, 1 when it cannot be retrieved
pub async fn endpoint_ncpus(engine: &dyn DockerEngine, logger: &Logger) -> i64 {
    let default = 1;
    match engine.info().await.map(|info| info.ncpu) {
        Ok(Some(ncpu)) => {
            logger.debug(&format!("NCPU set to {}.", ncpu));
            ncpu
        }
        _ => {
            logger.warning(&format!(
                "Failed to retrieve the number of CPUs on the Docker endpoint. Using default value of {}.",
                default
            ));
            default
        }
    }
}

/// Key/value rows describing the endpoint, in display order
pub fn info_rows(info: &EndpointInfo) -> Vec<(&'static str, String)> {
    fn show<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".to_string())
    }

    vec![
        ("Hostname", show(&info.name)),
        ("Operating System", show(&info.operating_system)),
        ("Kernel Version", show(&info.kernel_version)),
        ("OSType", show(&info.os_type)),
        ("Architecture", show(&info.architecture)),
        ("Total Memory", show(&info.mem_total)),
        ("CPUs", show(&info.ncpu)),
    ]
}
