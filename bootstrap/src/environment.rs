//! Environment build: dependency install plus verbatim source copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::entrypoint::EntrypointSpec;
use crate::installer::{InstalledPackage, Installer};
use crate::manifest::Manifest;
use crate::{BootstrapError, BootstrapResult, DEFAULT_EXPOSED_PORT};

/// Directory inside the environment root that receives the source tree.
pub const WORK_DIR_NAME: &str = "app";
/// Directory inside the environment root that receives installed packages.
pub const SITE_PACKAGES_DIR_NAME: &str = "site-packages";

/// Inputs to an environment build, fixed once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub manifest_path: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub exposed_port: u16,
    pub entrypoint: EntrypointSpec,
}

impl BuildConfig {
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            exposed_port: DEFAULT_EXPOSED_PORT,
            entrypoint: EntrypointSpec::default(),
        }
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.exposed_port = port;
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: EntrypointSpec) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.exposed_port == 0 {
            return Err("Exposed port must be nonzero".to_string());
        }
        // `starts_with` is lexical; `..` and symlinked spellings of the same
        // directory must compare equal, so resolve both sides first.
        let source = resolved_path(&self.source_dir);
        let target = resolved_path(&self.target_dir);
        if source == target {
            return Err("Source and target directories must differ".to_string());
        }
        if target.starts_with(&source) {
            return Err("Target directory cannot live inside the source tree".to_string());
        }
        if self.entrypoint.program.is_empty() {
            return Err("Entrypoint program cannot be empty".to_string());
        }
        Ok(())
    }
}

/// A built runtime environment: installed dependency set, copied source tree,
/// and the single declared port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: Uuid,
    pub root: PathBuf,
    /// Where the source tree landed; the entrypoint runs from here.
    pub work_dir: PathBuf,
    pub site_packages: PathBuf,
    pub installed: Vec<InstalledPackage>,
    pub exposed_port: u16,
    pub entrypoint: EntrypointSpec,
    pub built_at: DateTime<Utc>,
}

impl Environment {
    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.iter().any(|p| p.name == name)
    }

    pub fn installed_names(&self) -> Vec<&str> {
        self.installed.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Build an environment from the given configuration.
///
/// Steps run in order: parse the manifest, install every declared dependency
/// sequentially, then copy the source tree verbatim into the working
/// directory. The first failure aborts the build; there is no partial
/// environment to recover.
pub async fn build_environment(
    config: &BuildConfig,
    installer: &dyn Installer,
) -> BootstrapResult<Environment> {
    config.validate().map_err(BootstrapError::InvalidConfig)?;

    let manifest = Manifest::from_path(&config.manifest_path)?;
    let root = config.target_dir.clone();
    let work_dir = root.join(WORK_DIR_NAME);
    let site_packages = root.join(SITE_PACKAGES_DIR_NAME);
    fs::create_dir_all(&site_packages)?;

    let mut installed = Vec::with_capacity(manifest.len());
    for requirement in manifest.requirements() {
        info!(
            requirement = %requirement,
            installer = installer.installer_name(),
            "installing dependency"
        );
        installed.push(installer.install(requirement, &site_packages).await?);
    }

    let copied = copy_source_tree(&config.source_dir, &work_dir)?;
    info!(files = copied, work_dir = %work_dir.display(), "source tree copied");

    Ok(Environment {
        id: Uuid::new_v4(),
        root,
        work_dir,
        site_packages,
        installed,
        exposed_port: config.exposed_port,
        entrypoint: config.entrypoint.clone(),
        built_at: Utc::now(),
    })
}

/// Copy a source tree verbatim into `target`.
///
/// Every regular file and directory is copied, hidden entries included; there
/// is no ignore list and no transformation. The target must not exist yet or
/// must be an empty directory, and must lie outside the source tree. Returns
/// the number of files copied.
pub fn copy_source_tree(source: &Path, target: &Path) -> BootstrapResult<u64> {
    if !source.is_dir() {
        return Err(copy_error(source, "source is not a directory"));
    }
    // A target inside the source would make the walk below chase its own
    // output; the spelling can hide the nesting, so compare resolved paths.
    let canonical_source = source.canonicalize().map_err(|e| copy_error(source, e))?;
    if resolved_path(target).starts_with(&canonical_source) {
        return Err(copy_error(target, "target lives inside the source tree"));
    }
    if target.exists() {
        let mut entries = fs::read_dir(target).map_err(|e| copy_error(target, e))?;
        if entries.next().is_some() {
            return Err(copy_error(target, "target exists and is not empty"));
        }
    } else {
        fs::create_dir_all(target).map_err(|e| copy_error(target, e))?;
    }
    copy_dir_recursive(source, target)
}

fn copy_dir_recursive(source: &Path, target: &Path) -> BootstrapResult<u64> {
    let mut copied = 0;
    for entry in fs::read_dir(source).map_err(|e| copy_error(source, e))? {
        let entry = entry.map_err(|e| copy_error(source, e))?;
        let path = entry.path();
        let dest = target.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| copy_error(&path, e))?;
        if file_type.is_dir() {
            fs::create_dir(&dest).map_err(|e| copy_error(&dest, e))?;
            copied += copy_dir_recursive(&path, &dest)?;
        } else if file_type.is_file() {
            fs::copy(&path, &dest).map_err(|e| copy_error(&path, e))?;
            copied += 1;
        } else {
            return Err(copy_error(&path, "unsupported file type"));
        }
    }
    Ok(copied)
}

fn copy_error(path: &Path, reason: impl ToString) -> BootstrapError {
    BootstrapError::SourceCopy {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Resolve a path for containment checks: canonicalize as deep as the
/// filesystem allows and keep the rest lexically normalized, so relative,
/// `..`, and symlinked spellings of the same location compare equal.
fn resolved_path(path: &Path) -> PathBuf {
    let normalized = absolute_normalized(path);
    for ancestor in normalized.ancestors() {
        if let Ok(canonical) = ancestor.canonicalize() {
            if let Ok(remainder) = normalized.strip_prefix(ancestor) {
                return canonical.join(remainder);
            }
        }
    }
    normalized
}

fn absolute_normalized(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}
