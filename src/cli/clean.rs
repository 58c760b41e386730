//! `clean`: remove the images of a project from a Docker endpoint

use crate::docker::{DockerEngine, endpoint_architecture};
use crate::error::Result;
use crate::image::{CleanOutcome, clean_images};
use crate::logging::Logger;
use crate::project::Project;

/// Resolved inputs of one cleanup
#[derive(Debug, Clone)]
pub struct CleanPlan {
    pub registry: String,
    /// `None` detects the architecture of the endpoint
    pub arch: Option<String>,
}

/// Remove the project image and, for releases, the release image.
///
/// Images missing on the endpoint are skipped silently; a failed removal is logged
/// and the next image is still processed.
pub async fn clean_project(
    engine: &dyn DockerEngine,
    project: &Project,
    plan: &CleanPlan,
    logger: &Logger,
) -> Result<Vec<(String, CleanOutcome)>> {
    let arch = match &plan.arch {
        Some(arch) => arch.clone(),
        None => {
            let arch = endpoint_architecture(engine, logger).await?;
            logger.info(&format!("Target architecture automatically set to {}.", arch));
            arch.to_string()
        }
    };

    let images = project.images(&arch, &plan.registry);
    for image in &images {
        logger.detail(&format!("Candidate image: {}", image));
    }

    let outcomes = clean_images(engine, &images, logger).await;
    Ok(images.into_iter().zip(outcomes).collect())
}
