//! Container lifecycle helpers for robot images

use crate::docker::{ContainerStatus, DockerEngine, RunSpec};
use crate::error::Result;
use crate::image::pull_image;
use crate::logging::Logger;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const ROS_MASTER_PORT: u16 = 11311;
pub const PICAM_IMAGE: &str = "duckietown/rpi-duckiebot-ros-picam:master18";
/// Raspberry Pi camera interface
pub const PICAM_DEVICE: &str = "/dev/vchiq";

/// Environment every robot container starts with
pub fn default_env(robot_name: &str, robot_ip: &str) -> BTreeMap<String, String> {
    [
        ("ROS_MASTER", robot_name.to_string()),
        ("DUCKIEBOT_NAME", robot_name.to_string()),
        ("ROS_MASTER_URI", format!("http://{}:{}", robot_ip, ROS_MASTER_PORT)),
        ("DUCKIEFLEET_ROOT", "/data/config".to_string()),
        ("DUCKIEBOT_IP", robot_ip.to_string()),
        ("DUCKIETOWN_SERVER", robot_ip.to_string()),
        ("QT_X11_NO_MITSHM", "1".to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// Defaults overridden by `extra`
pub fn merge_env(
    mut base: BTreeMap<String, String>,
    extra: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    if let Some(extra) = extra {
        base.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    base
}

/// Parse `KEY=VALUE` pairs as given on the command line
pub fn parse_env_pairs(pairs: &[String]) -> std::result::Result<BTreeMap<String, String>, String> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(format!("Invalid environment entry '{}', expected KEY=VALUE", pair)),
        })
        .collect()
}

/// `~/data` on this machine mounted at `/data`
pub fn bind_local_data_dir() -> String {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    format!("{}:/data", home.join("data").display())
}

pub fn bind_robot_data_dir() -> String {
    "/data:/data".to_string()
}

pub fn bind_avahi_socket() -> String {
    "/var/run/avahi-daemon/socket:/var/run/avahi-daemon/socket".to_string()
}

/// Detached, privileged, host-network run that removes itself on exit
pub fn robot_run_spec(image: &str, env: BTreeMap<String, String>, binds: Vec<String>) -> RunSpec {
    RunSpec {
        image: image.to_string(),
        env,
        binds,
        network_mode: Some("host".to_string()),
        privileged: true,
        auto_remove: true,
        ..Default::default()
    }
}

/// Camera driver run: host network, the camera device passed through, removed on exit
pub fn picamera_run_spec(robot_name: &str, robot_ip: &str) -> RunSpec {
    RunSpec {
        image: PICAM_IMAGE.to_string(),
        env: default_env(robot_name, robot_ip),
        devices: vec![PICAM_DEVICE.to_string()],
        network_mode: Some("host".to_string()),
        auto_remove: true,
        ..Default::default()
    }
}

/// Pull the camera image on the robot and start it detached
pub async fn start_picamera(
    engine: &dyn DockerEngine,
    robot_name: &str,
    robot_ip: &str,
    logger: &Logger,
) -> Result<String> {
    pull_image(engine, PICAM_IMAGE, true, logger).await?;

    let spec = picamera_run_spec(robot_name, robot_ip);
    logger.info(&format!(
        "Running {} on {} with environment vars: {:?}",
        PICAM_IMAGE, robot_name, spec.env
    ));
    let id = engine.run_container(&spec).await?;
    logger.success(&format!("Started camera container {}", short_id(&id)));
    Ok(id)
}

/// Start `image` on a robot unless a container from that exact image already runs.
///
/// Returns the new container id, or `None` when skipped. The check and the run are
/// not atomic.
pub async fn run_image_on_robot(
    engine: &dyn DockerEngine,
    image: &str,
    robot_name: &str,
    robot_ip: &str,
    env: Option<&BTreeMap<String, String>>,
    binds: Vec<String>,
    logger: &Logger,
) -> Result<Option<String>> {
    let env = merge_env(default_env(robot_name, robot_ip), env);
    logger.info(&format!("Running {} with environment: {:?}", image, env));

    let running = engine.list_containers().await?;
    if running.iter().any(|container| container.image == image) {
        logger.warning(&format!(
            "Container with image {} is already running on {}, skipping...",
            image, robot_name
        ));
        return Ok(None);
    }

    let id = engine.run_container(&robot_run_spec(image, env, binds)).await?;
    logger.success(&format!("Started container {} from {}", short_id(&id), image));
    Ok(Some(id))
}

/// Start `image` locally under `container_name`, replacing any container with that name
pub async fn run_image_on_localhost(
    engine: &dyn DockerEngine,
    image: &str,
    robot_name: &str,
    robot_ip: &str,
    container_name: &str,
    env: Option<&BTreeMap<String, String>>,
    binds: Vec<String>,
    logger: &Logger,
) -> Result<String> {
    let env = merge_env(default_env(robot_name, robot_ip), env);

    match engine.inspect_container(container_name).await {
        Ok(Some(existing)) => {
            logger.info("A container is already running on localhost - stopping it first..");
            stop_container(engine, &existing.id, logger).await;
            remove_container(engine, &existing.id, logger).await;
        }
        Ok(None) => {}
        Err(e) => logger.warning(&format!("Could not remove existing container: {}", e)),
    }

    logger.info(&format!("Running {} on localhost with environment vars: {:?}", image, env));
    let mut spec = robot_run_spec(image, env, binds);
    spec.tty = true;
    spec.name = Some(container_name.to_string());
    engine.run_container(&spec).await
}

pub async fn check_if_running(engine: &dyn DockerEngine, container_name: &str, logger: &Logger) -> bool {
    match engine.inspect_container(container_name).await {
        Ok(Some(_)) => {
            logger.info(&format!("{:?} is running.", container_name));
            true
        }
        Ok(None) => {
            logger.error(&format!("{:?} is NOT running - Aborting", container_name));
            false
        }
        Err(e) => {
            logger.error(&format!("{:?} is NOT running - Aborting:\n{}", container_name, e));
            false
        }
    }
}

/// Clear the way for a new container named `container_name`.
///
/// Missing containers are fine. A running one is stopped and removed. One that exited
/// with a non-zero code is kept for inspection and reported.
pub async fn remove_if_running(engine: &dyn DockerEngine, container_name: &str, logger: &Logger) -> Result<()> {
    let Some(container) = engine.inspect_container(container_name).await? else {
        return Ok(());
    };

    match container.status {
        ContainerStatus::Running => {
            logger.info(&format!("Container {} already running - stopping it first..", container_name));
            stop_container(engine, &container.id, logger).await;
        }
        ContainerStatus::Exited => {
            if let Some(code) = container.exit_code.filter(|code| *code != 0) {
                logger.error(&format!(
                    "Container {} exited with exit code {}. Consult logs using \"docker logs {}\"",
                    container_name, code, container_name
                ));
                return Ok(());
            }
        }
        _ => {}
    }

    logger.info(&format!("Removing container {}", container_name));
    if let Err(e) = engine.remove_container(&container.id).await {
        logger.error(&format!("Could not remove existing container: {}", e));
    }
    Ok(())
}

pub async fn stop_container(engine: &dyn DockerEngine, id: &str, logger: &Logger) {
    if let Err(e) = engine.stop_container(id).await {
        logger.warning(&format!("Container {} not found to stop! {}", short_id(id), e));
    }
}

pub async fn remove_container(engine: &dyn DockerEngine, id: &str, logger: &Logger) {
    if let Err(e) = engine.remove_container(id).await {
        logger.warning(&format!("Container {} not found to remove! {}", short_id(id), e));
    }
}

pub async fn logs_for_container(engine: &dyn DockerEngine, id: &str) -> Result<String> {
    engine.container_logs(id).await
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(12)]
}
