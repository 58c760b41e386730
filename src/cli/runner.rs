//! Runs one parsed command against its Docker endpoint

use crate::arch::canonical_arch;
use crate::cli::args::{
    Args, AttachArgs, BuildArgs, CleanArgs, Command, LogsArgs, MachineArgs, PicameraArgs, RunArgs, SshTransferArgs,
    TransferArgs,
};
use crate::cli::clean::{CleanPlan, clean_project};
use crate::config::{ENV_REGISTRY, select_registry};
use crate::container::{bind_robot_data_dir, logs_for_container, parse_env_pairs, run_image_on_robot, start_picamera};
use crate::docker::{BollardEngine, DockerEngine, Endpoint, endpoint_ncpus, info_rows};
use crate::error::{FleetError, Result};
use crate::image::{CleanOutcome, build_if_not_exist, pull_image, push_image};
use crate::logging::Logger;
use crate::project::Project;
use crate::shell::{attach_terminal, push_image_to_robot};

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate().map_err(FleetError::Config)?;

        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Ok(Self { args, output })
    }

    pub fn logger(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Command::Clean(args) => self.clean(args).await,
            Command::Info(args) => self.info(args).await,
            Command::Pull(args) => self.pull(args).await,
            Command::Push(args) => self.push(args).await,
            Command::Run(args) => self.run_on_robot(args).await,
            Command::Logs(args) => self.logs(args).await,
            Command::Transfer(args) => self.transfer(args).await,
            Command::Build(args) => self.build(args).await,
            Command::Picamera(args) => self.picamera(args).await,
            Command::Attach(args) => self.attach(args).await,
        }?;

        self.output.detail(&format!(
            "Completed in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    async fn connect(&self, machine: &str) -> Result<BollardEngine> {
        Endpoint::from_machine(Some(machine)).connect(&self.output).await
    }

    async fn clean(&self, args: &CleanArgs) -> Result<()> {
        self.output.section("Clean project images");
        let workdir = match &args.workdir {
            Some(workdir) => workdir.clone(),
            None => std::env::current_dir()?,
        };
        self.output.info(&format!("Project workspace: {}", workdir.display()));

        let project = Project::open(&workdir, &self.output).await?;
        self.output.summary_kv(
            "Project",
            &[
                ("Name", project.name.clone()),
                ("Owner", project.owner.clone()),
                ("Version", project.version.clone()),
                ("Release", project.release_version().unwrap_or("no").to_string()),
            ],
        );

        let env_registry = std::env::var(ENV_REGISTRY).ok();
        let registry = select_registry(args.staging, &args.registry, env_registry.as_deref(), &self.output);

        let engine = self.connect(&args.machine).await?;
        let plan = CleanPlan {
            registry,
            arch: args.arch.clone(),
        };
        let outcomes = exit_on_unsupported_arch(
            clean_project(&engine, &project, &plan, &self.output).await,
            &self.output,
        )?;

        let removed = outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == CleanOutcome::Removed)
            .count();
        self.output.success(&format!("Removed {} of {} project images", removed, outcomes.len()));
        Ok(())
    }

    async fn info(&self, args: &MachineArgs) -> Result<()> {
        let engine = self.connect(&args.machine).await?;
        let info = engine.info().await?;
        self.output.summary_kv("Docker Endpoint", &info_rows(&info));

        let reported = info.architecture.clone().unwrap_or_default();
        match canonical_arch(&reported) {
            Some(arch) => self.output.info(&format!("Canonical architecture: {}", arch)),
            None => self.output.warning(&format!("Architecture {} not supported!", reported)),
        }
        if let Some(memory) = info.mem_total.and_then(|bytes| u64::try_from(bytes).ok()) {
            self.output.info(&format!("Memory: {}", self.output.format_size(memory)));
        }
        let ncpus = endpoint_ncpus(&engine, &self.output).await;
        self.output.detail(&format!("Usable CPUs: {}", ncpus));
        self.output.debug(&serde_json::to_string(&info)?);
        Ok(())
    }

    async fn pull(&self, args: &TransferArgs) -> Result<()> {
        let engine = self.connect(&args.machine.machine).await?;
        pull_image(&engine, &args.image, !args.no_progress, &self.output).await?;
        self.output.success(&format!("Pulled {}", args.image));
        Ok(())
    }

    async fn push(&self, args: &TransferArgs) -> Result<()> {
        let engine = self.connect(&args.machine.machine).await?;
        push_image(&engine, &args.image, !args.no_progress, &self.output).await?;
        self.output.success(&format!("Pushed {}", args.image));
        Ok(())
    }

    async fn run_on_robot(&self, args: &RunArgs) -> Result<()> {
        let extra_env = parse_env_pairs(&args.env).map_err(FleetError::Config)?;
        let mut binds = args.volumes.clone();
        if args.with_data {
            binds.push(bind_robot_data_dir());
        }

        let engine = self.connect(&args.ip).await?;
        let started = run_image_on_robot(
            &engine,
            &args.image,
            &args.robot,
            &args.ip,
            Some(&extra_env),
            binds,
            &self.output,
        )
        .await?;
        if started.is_none() {
            self.output.info("Nothing to do");
        }
        Ok(())
    }

    async fn logs(&self, args: &LogsArgs) -> Result<()> {
        let engine = self.connect(&args.machine.machine).await?;
        let logs = logs_for_container(&engine, &args.container).await?;
        print!("{}", logs);
        Ok(())
    }

    async fn transfer(&self, args: &SshTransferArgs) -> Result<()> {
        push_image_to_robot(&args.image, &args.hostname, &self.output).await?;
        self.output.success(&format!("Transferred {} to {}", args.image, args.hostname));
        Ok(())
    }

    async fn build(&self, args: &BuildArgs) -> Result<()> {
        self.output.section(&format!("Build {}", args.tag));
        let engine = self.connect(&args.machine.machine).await?;
        if !build_if_not_exist(&engine, &args.path, &args.tag, &self.output).await? {
            self.output.info(&format!("Image {} already exists, nothing to build", args.tag));
        }
        Ok(())
    }

    async fn picamera(&self, args: &PicameraArgs) -> Result<()> {
        let engine = self.connect(&args.ip).await?;
        start_picamera(&engine, &args.robot, &args.ip, &self.output).await?;
        Ok(())
    }

    async fn attach(&self, args: &AttachArgs) -> Result<()> {
        attach_terminal(&args.container, args.hostname.as_deref(), &self.output).await
    }
}

/// An unsupported architecture ends the process immediately, without retry
fn exit_on_unsupported_arch<T>(result: Result<T>, logger: &Logger) -> Result<T> {
    if let Err(FleetError::UnsupportedArchitecture(arch)) = &result {
        logger.error(&format!("Architecture {} not supported!", arch));
        std::process::exit(1);
    }
    result
}
