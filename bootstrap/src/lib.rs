//! Runtime bootstrap for the bonus program service.
//!
//! This crate implements the build-then-launch contract the deployment relies
//! on: resolve a declared dependency manifest into an installed environment,
//! copy the application source tree verbatim, declare the single exposed
//! port, and start exactly one entrypoint process. Control flow is linear;
//! each step runs once and the first failure ends the run.
//!
//! There is deliberately no supervision, restart, or health-check logic here.
//! When the entrypoint exits, the environment's lifecycle ends with it.

pub mod entrypoint;
pub mod environment;
pub mod installer;
pub mod lifecycle;
pub mod manifest;

use thiserror::Error;

/// TCP port the built environment declares for inbound traffic.
pub const DEFAULT_EXPOSED_PORT: u16 = 5001;

/// Errors surfaced while building or starting an environment.
///
/// Every variant is fatal to the run that produced it: there is no retry
/// policy and no partially built environment.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A declared package or version constraint cannot be parsed or installed
    #[error("Dependency resolution failed for '{package}': {reason}")]
    DependencyResolution { package: String, reason: String },

    /// The source tree cannot be placed into the environment
    #[error("Source copy failed at '{path}': {reason}")]
    SourceCopy { path: String, reason: String },

    /// No package installer runtime was found on this host
    #[error("No package installer available. Install pip to build environments.")]
    InstallerUnavailable,

    /// The build configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lifecycle step was requested out of order
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: BootstrapState,
        to: BootstrapState,
    },

    /// The entrypoint process could not be spawned
    #[error("Failed to launch entrypoint '{command}': {reason}")]
    Launch { command: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

pub use entrypoint::{launch_entrypoint, EntrypointHandle, EntrypointSpec};
pub use environment::{build_environment, copy_source_tree, BuildConfig, Environment};
pub use installer::{
    detect_installer, InstalledPackage, Installer, InstallerRuntime, PipInstaller,
};
pub use lifecycle::{Bootstrap, BootstrapState};
pub use manifest::{Manifest, Requirement, VersionOp, VersionSpec};
