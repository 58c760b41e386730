//! Project descriptor for a working directory
//!
//! A project is a git repository whose images are tagged
//! `<registry>/<owner>/<name>:<version>-<arch>`. The version is the current branch; a
//! clean checkout sitting exactly on a `vX.Y.Z` tag is a release and also owns the
//! image tagged with that version.

use crate::error::{FleetError, Result};
use crate::logging::Logger;
use crate::shell::run_cmd_output;
use serde::Serialize;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_OWNER: &str = "duckietown";
/// Version used when HEAD is detached
pub const DETACHED_VERSION: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub path: PathBuf,
    pub name: String,
    pub owner: String,
    pub version: String,
    pub head_tag: Option<String>,
    pub dirty: bool,
}

impl Project {
    pub fn new(path: impl Into<PathBuf>, name: &str, owner: &str, version: &str) -> Self {
        Self {
            path: path.into(),
            name: name.to_string(),
            owner: owner.to_string(),
            version: version.to_string(),
            head_tag: None,
            dirty: false,
        }
    }

    pub fn with_head_tag(mut self, tag: Option<String>) -> Self {
        self.head_tag = tag;
        self
    }

    pub fn with_dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    /// Read the project metadata of the git repository containing `workdir`
    pub async fn open(workdir: &Path, logger: &Logger) -> Result<Self> {
        let dir = workdir.to_string_lossy().to_string();
        let git = |args: &[&str]| {
            let mut cmd = vec!["git", "-C", dir.as_str()];
            cmd.extend_from_slice(args);
            cmd.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        };

        let root = first_line(&git(&["rev-parse", "--show-toplevel"]), logger)
            .await
            .map_err(|_| FleetError::Project(format!("{} is not inside a git repository", workdir.display())))?
            .ok_or_else(|| FleetError::Project(format!("Cannot resolve the root of {}", workdir.display())))?;
        let root = PathBuf::from(root);

        let remote = first_line(&git(&["config", "--get", "remote.origin.url"]), logger)
            .await
            .unwrap_or(None);
        let (owner, name) = match remote.as_deref().and_then(parse_remote_url) {
            Some(parsed) => parsed,
            None => (
                DEFAULT_OWNER.to_string(),
                root.file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .ok_or_else(|| FleetError::Project(format!("Cannot name project at {}", root.display())))?,
            ),
        };

        // Fails on a repository without commits
        let branch = first_line(&git(&["rev-parse", "--abbrev-ref", "HEAD"]), logger)
            .await
            .unwrap_or(None)
            .unwrap_or_else(|| DETACHED_VERSION.to_string());
        let version = if branch == "HEAD" { DETACHED_VERSION.to_string() } else { branch };

        // No exact tag on HEAD makes `git describe` fail
        let head_tag = first_line(&git(&["describe", "--exact-match", "--tags", "HEAD"]), logger)
            .await
            .unwrap_or(None);

        let dirty = !lines(&git(&["status", "--porcelain"]), logger).await?.is_empty();

        Ok(Self {
            path: root,
            name,
            owner,
            version,
            head_tag,
            dirty,
        })
    }

    pub fn is_release(&self) -> bool {
        self.release_version().is_some()
    }

    /// Version of a clean checkout tagged `vX.Y.Z`
    pub fn release_version(&self) -> Option<&str> {
        if self.dirty {
            return None;
        }
        self.head_tag.as_deref().filter(|tag| is_release_tag(tag))
    }

    pub fn image(&self, arch: &str, registry: &str) -> String {
        format_image(registry, &self.owner, &self.name, &self.version, arch)
    }

    /// Release image reference; `None` unless the project is a release
    pub fn image_release(&self, arch: &str, registry: &str) -> Option<String> {
        self.release_version()
            .map(|version| format_image(registry, &self.owner, &self.name, version, arch))
    }

    /// Every image this project owns for `arch`
    pub fn images(&self, arch: &str, registry: &str) -> Vec<String> {
        let mut images = vec![self.image(arch, registry)];
        images.extend(self.image_release(arch, registry));
        images
    }
}

fn format_image(registry: &str, owner: &str, name: &str, version: &str, arch: &str) -> String {
    format!("{}/{}/{}:{}-{}", registry, owner, name, version, arch)
}

/// `vMAJOR.MINOR.PATCH`
pub fn is_release_tag(tag: &str) -> bool {
    let Some(version) = tag.strip_prefix('v') else {
        return false;
    };
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// `(owner, name)` from an https or scp-style git remote
pub fn parse_remote_url(remote: &str) -> Option<(String, String)> {
    let path = if remote.contains("://") {
        Url::parse(remote).ok()?.path().to_string()
    } else {
        // git@host:owner/name.git
        remote.split_once(':')?.1.to_string()
    };

    let mut segments = path.trim_matches('/').rsplit('/');
    let name = segments.next()?.trim_end_matches(".git");
    let owner = segments.next()?;
    if name.is_empty() || owner.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

async fn lines(cmd: &[String], logger: &Logger) -> Result<Vec<String>> {
    let argv: Vec<&str> = cmd.iter().map(String::as_str).collect();
    run_cmd_output(&argv, logger).await
}

async fn first_line(cmd: &[String], logger: &Logger) -> Result<Option<String>> {
    Ok(lines(cmd, logger).await?.into_iter().next())
}
