//! Shell command execution

use crate::config::DEFAULT_DOCKER_TCP_PORT;
use crate::error::{FleetError, Result};
use crate::logging::Logger;
use std::process::Stdio;
use tokio::process::Command;

/// Render argv the way it is logged and reported in errors
pub fn display_command(cmd: &[&str]) -> String {
    cmd.join(" ")
}

/// Run `cmd` and return its non-empty, right-trimmed stdout lines.
///
/// A non-zero exit becomes `CommandFailed` carrying the command line and the code.
pub async fn run_cmd_output(cmd: &[&str], logger: &Logger) -> Result<Vec<String>> {
    let (program, args) = split_program(cmd)?;
    logger.debug(&format!("$ {}", display_command(cmd)));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .await?;

    if !output.status.success() {
        return Err(command_failed(cmd, output.status.code(), logger));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Run `cmd` with inherited stdio
pub async fn run_cmd(cmd: &[&str], logger: &Logger) -> Result<()> {
    let (program, args) = split_program(cmd)?;
    logger.debug(&format!("$ {}", display_command(cmd)));

    let status = Command::new(program).args(args).status().await?;
    if !status.success() {
        return Err(command_failed(cmd, status.code(), logger));
    }
    Ok(())
}

/// Stream an image to a robot over SSH: `docker save | gzip | pv | ssh docker load`
pub async fn push_image_to_robot(image: &str, hostname: &str, logger: &Logger) -> Result<()> {
    let pipeline = format!(
        "docker save {} | gzip | pv | ssh -C duckie@{}.local docker load",
        image, hostname
    );
    logger.step(&format!("Transferring {} to {} over SSH", image, hostname));
    run_cmd(&["/bin/sh", "-c", &pipeline], logger).await
}

/// `docker attach` argv for a container, on a robot when `hostname` is given
pub fn attach_command(container: &str, hostname: Option<&str>) -> Vec<String> {
    let mut cmd = vec!["docker".to_string()];
    if let Some(hostname) = hostname {
        cmd.push("-H".to_string());
        cmd.push(format!("{}:{}", hostname, DEFAULT_DOCKER_TCP_PORT));
    }
    cmd.push("attach".to_string());
    cmd.push(container.to_string());
    cmd
}

/// Attach this terminal to a running container until it detaches or exits
pub async fn attach_terminal(container: &str, hostname: Option<&str>, logger: &Logger) -> Result<()> {
    let cmd = attach_command(container, hostname);
    let argv: Vec<&str> = cmd.iter().map(String::as_str).collect();
    run_cmd(&argv, logger).await
}

fn split_program<'a>(cmd: &'a [&'a str]) -> Result<(&'a str, &'a [&'a str])> {
    cmd.split_first()
        .map(|(program, args)| (*program, args))
        .ok_or_else(|| FleetError::Config("Empty command".to_string()))
}

fn command_failed(cmd: &[&str], code: Option<i32>, logger: &Logger) -> FleetError {
    // Killed by a signal
    let code = code.unwrap_or(-1);
    let err = FleetError::CommandFailed {
        command: display_command(cmd),
        code,
    };
    logger.debug(&err.to_string());
    err
}
