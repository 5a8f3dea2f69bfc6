//! Package installer detection and the install seam.
//!
//! `Installer` is the trait the build step drives; `PipInstaller` is the real
//! implementation, shelling out to whichever pip runtime is on the host.
//! Installs are sequential and any failure aborts the build.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::manifest::Requirement;
use crate::{BootstrapError, BootstrapResult};

/// Package installer runtimes supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerRuntime {
    Pip,
    Pip3,
    None,
}

impl InstallerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            InstallerRuntime::Pip => "pip",
            InstallerRuntime::Pip3 => "pip3",
            InstallerRuntime::None => "",
        }
    }

    /// Check if a runtime is available
    pub fn is_available(&self) -> bool {
        matches!(self, InstallerRuntime::Pip | InstallerRuntime::Pip3)
    }
}

/// Detect which installer runtime is available on the host.
///
/// Tries pip first, then pip3.
pub fn detect_installer() -> InstallerRuntime {
    if Command::new("pip")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
    {
        return InstallerRuntime::Pip;
    }

    if Command::new("pip3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
    {
        return InstallerRuntime::Pip3;
    }

    InstallerRuntime::None
}

/// Record of one dependency placed into an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    /// The full requirement string that was requested, e.g. `flask==2.0.0`.
    pub requested: String,
}

/// Installs one requirement at a time into a target directory.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(
        &self,
        requirement: &Requirement,
        target: &Path,
    ) -> BootstrapResult<InstalledPackage>;

    fn installer_name(&self) -> &'static str;
}

/// Real installer backed by a pip runtime on the host.
#[derive(Debug)]
pub struct PipInstaller {
    runtime: InstallerRuntime,
}

impl PipInstaller {
    pub fn new(runtime: InstallerRuntime) -> BootstrapResult<Self> {
        if !runtime.is_available() {
            return Err(BootstrapError::InstallerUnavailable);
        }
        Ok(Self { runtime })
    }

    /// Detect an available runtime and build an installer around it.
    pub fn detect() -> BootstrapResult<Self> {
        Self::new(detect_installer())
    }

    pub fn runtime(&self) -> InstallerRuntime {
        self.runtime
    }
}

#[async_trait]
impl Installer for PipInstaller {
    async fn install(
        &self,
        requirement: &Requirement,
        target: &Path,
    ) -> BootstrapResult<InstalledPackage> {
        let output = tokio::process::Command::new(self.runtime.command())
            .args(["install", "--quiet", "--disable-pip-version-check", "--target"])
            .arg(target)
            .arg(requirement.to_string())
            .output()
            .await
            .map_err(|e| BootstrapError::DependencyResolution {
                package: requirement.name.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(BootstrapError::DependencyResolution {
                package: requirement.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(InstalledPackage {
            name: requirement.name.clone(),
            requested: requirement.to_string(),
        })
    }

    fn installer_name(&self) -> &'static str {
        self.runtime.command()
    }
}
