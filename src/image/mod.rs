//! Image transfer and cleanup
//!
//! Pull and push consume the daemon's per-layer status stream through a
//! [`TransferProgress`] aggregator. Cleanup is best effort: a failed removal is logged
//! and the remaining images are still processed.

use crate::docker::{BuildLog, DockerEngine};
use crate::error::{FleetError, Result};
use crate::logging::{Logger, remove_escapes};
use crate::progress::{LayerEvent, ProgressBar, TransferKind, TransferProgress};
use futures::stream::{BoxStream, StreamExt};
use std::path::Path;

/// Outcome of removing one image during a cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    /// Not present on the endpoint; nothing to do
    Absent,
    Removed,
    /// Removal failed; the message was logged
    Failed(String),
}

/// Split `repository[:tag]` at the tag separator, ignoring registry ports.
///
/// References without a tag get `latest`.
pub fn split_image_reference(image: &str) -> (&str, &str) {
    let name_start = image.rfind('/').map(|pos| pos + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(pos) => {
            let split = name_start + pos;
            (&image[..split], &image[split + 1..])
        }
        None => (image, "latest"),
    }
}

/// Consume a transfer stream, feeding the aggregator and the progress bar.
///
/// The bar is finished at 100% when the stream ends, whatever the last estimate
/// was. A stream error stops the transfer and is returned as is.
pub async fn drive_transfer(
    mut events: BoxStream<'_, Result<LayerEvent>>,
    kind: TransferKind,
    progress: bool,
    logger: &Logger,
) -> Result<TransferProgress> {
    let mut state = TransferProgress::new(kind);
    let mut bar = progress.then(|| ProgressBar::new(kind.label(), logger.clone()));

    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(percentage) = state.process(&event) {
            if let Some(bar) = bar.as_mut() {
                bar.update(percentage);
            }
        }
    }

    if let Some(bar) = bar {
        bar.done();
    }
    Ok(state)
}

pub async fn pull_image(engine: &dyn DockerEngine, image: &str, progress: bool, logger: &Logger) -> Result<()> {
    logger.step(&format!("Pulling {} on {}", image, engine.describe()));
    let state = drive_transfer(engine.pull(image), TransferKind::Pull, progress, logger).await?;
    logger.detail(&format!(
        "{} of {} layers were already present or downloaded",
        state.completed().len(),
        state.seen().len()
    ));
    Ok(())
}

pub async fn push_image(engine: &dyn DockerEngine, image: &str, progress: bool, logger: &Logger) -> Result<()> {
    let (repository, tag) = split_image_reference(image);
    if repository.is_empty() {
        return Err(FleetError::Config(format!("Invalid image reference: '{}'", image)));
    }
    logger.step(&format!("Pushing {} from {}", image, engine.describe()));
    drive_transfer(engine.push(repository, tag), TransferKind::Push, progress, logger).await?;
    Ok(())
}

/// Pull `image` only when the endpoint does not have it yet
pub async fn pull_if_not_exist(engine: &dyn DockerEngine, image: &str, logger: &Logger) -> Result<bool> {
    if engine.image_exists(image).await? {
        logger.debug(&format!("Image {:?} already present", image));
        return Ok(false);
    }
    logger.info(&format!("Image {:?} not found. Pulling from registry.", image));
    pull_image(engine, image, true, logger).await?;
    Ok(true)
}

/// Remove one image if present. Errors are logged, not returned.
pub async fn clean_image(engine: &dyn DockerEngine, image: &str, logger: &Logger) -> CleanOutcome {
    let found = match engine.find_images(image).await {
        Ok(ids) => ids,
        Err(e) => {
            let message = format!("Could not look up image '{}' on '{}': {}", image, engine.describe(), e);
            logger.warning(&message);
            return CleanOutcome::Failed(message);
        }
    };

    if found.is_empty() {
        logger.debug(&format!("Image {} not present, skipping", image));
        return CleanOutcome::Absent;
    }

    logger.info(&format!("Removing image {}...", image));
    match engine.remove_image(image).await {
        Ok(()) => CleanOutcome::Removed,
        Err(e) => {
            let message = format!(
                "We had some issues removing the image '{}' on '{}'. Just a heads up!",
                image,
                engine.describe()
            );
            logger.warning(&message);
            logger.detail(&e.to_string());
            CleanOutcome::Failed(message)
        }
    }
}

/// Remove each image in turn; one failure never stops the rest
pub async fn clean_images(engine: &dyn DockerEngine, images: &[String], logger: &Logger) -> Vec<CleanOutcome> {
    let mut outcomes = Vec::with_capacity(images.len());
    for image in images {
        outcomes.push(clean_image(engine, image, logger).await);
    }
    outcomes
}

/// Tar archive of a build context directory
pub fn build_context(dir: &Path) -> Result<Vec<u8>> {
    let mut archive = tar::Builder::new(Vec::new());
    archive.follow_symlinks(false);
    archive.append_dir_all(".", dir)?;
    Ok(archive.into_inner()?)
}

/// Build `tag` from `context_dir` unless the endpoint already has it.
///
/// Build output is echoed line by line without terminal escapes. Returns whether a
/// build ran.
pub async fn build_if_not_exist(
    engine: &dyn DockerEngine,
    context_dir: &Path,
    tag: &str,
    logger: &Logger,
) -> Result<bool> {
    if engine.image_exists(tag).await? {
        logger.debug(&format!("Image {:?} already present, not building", tag));
        return Ok(false);
    }

    let dockerfile = context_dir.join("Dockerfile");
    if !dockerfile.is_file() {
        return Err(FleetError::Build {
            tag: tag.to_string(),
            message: format!("No Dockerfile in {}", context_dir.display()),
        });
    }

    logger.step(&format!("Building {} from {}", tag, context_dir.display()));
    let context = build_context(context_dir)?;
    let mut logs = Vec::new();
    let mut events = engine.build(context, "Dockerfile", tag);
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                logger.error(&format!("Unable to build, reason: {}", e));
                return Err(e);
            }
        };
        if let Some(text) = &event.stream {
            for line in remove_escapes(text).lines().filter(|line| !line.trim().is_empty()) {
                logger.detail(line);
            }
        }
        logs.push(event);
    }

    logger.success(&format!("Built {}", tag));
    logger.debug(&build_logs_to_string(&logs));
    Ok(true)
}

/// Concatenated `stream` text of a build, ignoring status messages
pub fn build_logs_to_string(logs: &[BuildLog]) -> String {
    logs.iter().filter_map(|log| log.stream.as_deref()).collect()
}
