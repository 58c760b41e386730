//! Command-line argument parsing

use crate::config::{DEFAULT_MACHINE, DEFAULT_REGISTRY, ENV_VERBOSE};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fleet-docker")]
#[command(about = "Pull, push, run and clean Docker images on robots of a fleet")]
#[command(version)]
pub struct Args {
    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(long = "quiet", short = 'q', global = true, help = "Only print errors")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Removes the Docker images relative to the current project
    Clean(CleanArgs),
    /// Shows information about a Docker endpoint
    Info(MachineArgs),
    /// Pulls an image on a Docker endpoint
    Pull(TransferArgs),
    /// Pushes an image from a Docker endpoint to its registry
    Push(TransferArgs),
    /// Runs an image on a robot unless it is already running there
    Run(RunArgs),
    /// Prints the logs of a container
    Logs(LogsArgs),
    /// Copies a local image to a robot over SSH
    Transfer(SshTransferArgs),
    /// Builds an image from a directory unless the endpoint already has it
    Build(BuildArgs),
    /// Starts the camera driver on a robot
    Picamera(PicameraArgs),
    /// Attaches this terminal to a running container
    Attach(AttachArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct MachineArgs {
    #[arg(
        long = "machine",
        short = 'H',
        default_value = DEFAULT_MACHINE,
        help = "Docker socket or hostname"
    )]
    pub machine: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CleanArgs {
    #[arg(
        long = "workdir",
        short = 'C',
        help = "Directory containing the project to clean (default: current directory)"
    )]
    pub workdir: Option<PathBuf>,

    #[arg(long = "arch", short = 'a', help = "Target architecture for the image to clean")]
    pub arch: Option<String>,

    #[arg(
        long = "machine",
        short = 'H',
        default_value = DEFAULT_MACHINE,
        help = "Docker socket or hostname where to clean the image"
    )]
    pub machine: String,

    #[arg(long = "stage", visible_alias = "staging", help = "Use staging environment")]
    pub staging: bool,

    #[arg(long = "registry", default_value = DEFAULT_REGISTRY, help = "Use this Docker registry")]
    pub registry: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TransferArgs {
    /// Image reference
    pub image: String,

    #[command(flatten)]
    pub machine: MachineArgs,

    #[arg(long = "no-progress", help = "Do not draw a progress bar")]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Image reference
    pub image: String,

    #[arg(long = "robot", short = 'r', help = "Name of the robot")]
    pub robot: String,

    #[arg(long = "ip", help = "IP address of the robot; also used as the Docker endpoint")]
    pub ip: String,

    #[arg(long = "env", short = 'e', help = "Extra environment variable, KEY=VALUE")]
    pub env: Vec<String>,

    #[arg(long = "volume", help = "Extra bind mount, host:container[:mode]")]
    pub volumes: Vec<String>,

    #[arg(long = "with-data", help = "Mount the robot data directory at /data")]
    pub with_data: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LogsArgs {
    /// Container name or id
    pub container: String,

    #[command(flatten)]
    pub machine: MachineArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SshTransferArgs {
    /// Local image reference
    pub image: String,

    /// Robot hostname, without the `.local` suffix
    pub hostname: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct BuildArgs {
    /// Build context directory, containing a Dockerfile
    pub path: PathBuf,

    #[arg(long = "tag", short = 't', help = "Name and tag of the built image")]
    pub tag: String,

    #[command(flatten)]
    pub machine: MachineArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PicameraArgs {
    #[arg(long = "robot", short = 'r', help = "Name of the robot")]
    pub robot: String,

    #[arg(long = "ip", help = "IP address of the robot; also used as the Docker endpoint")]
    pub ip: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AttachArgs {
    /// Container name or id
    pub container: String,

    #[arg(long = "hostname", help = "Robot running the container (default: this machine)")]
    pub hostname: Option<String>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Load settings from environment variables
    pub fn from_env(mut self) -> Self {
        if std::env::var(ENV_VERBOSE).is_ok() {
            self.verbose = true;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("--verbose and --quiet cannot be used together".to_string());
        }
        match &self.command {
            Command::Clean(clean) if clean.registry.is_empty() => {
                return Err("Registry cannot be empty".to_string());
            }
            Command::Build(build) if build.tag.is_empty() => {
                return Err("Image tag cannot be empty".to_string());
            }
            _ => {}
        }
        Ok(())
    }
}
