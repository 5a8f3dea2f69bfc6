//! Launch profiles: TOML files describing one build-and-launch run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use bootstrap::{BuildConfig, EntrypointSpec, DEFAULT_EXPOSED_PORT};

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse profile '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// One build-and-launch run. Every field has a default matching the deployed
/// service, so an empty or missing profile still describes a working run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchProfile {
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default = "default_target")]
    pub target: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub entrypoint: EntrypointProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointProfile {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

// The build target must sit outside the source tree, so the default goes to
// the system temp directory rather than the working directory.
fn default_target() -> PathBuf {
    std::env::temp_dir().join("bonus-env")
}

fn default_port() -> u16 {
    DEFAULT_EXPOSED_PORT
}

fn default_program() -> String {
    "python".to_string()
}

fn default_args() -> Vec<String> {
    vec!["main.py".to_string()]
}

impl Default for LaunchProfile {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            source: default_source(),
            target: default_target(),
            port: default_port(),
            entrypoint: EntrypointProfile::default(),
        }
    }
}

impl Default for EntrypointProfile {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

impl LaunchProfile {
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = fs::read_to_string(path).map_err(|e| ProfileError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let substituted = substitute_env_vars(&content);
        toml::from_str(&substituted).map_err(|e| ProfileError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load a profile, treating a missing file as all-defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ProfileError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig::new(&self.manifest, &self.source, &self.target)
            .with_exposed_port(self.port)
            .with_entrypoint(
                EntrypointSpec::new(&self.entrypoint.program)
                    .with_args(self.entrypoint.args.clone()),
            )
    }
}

/// Replace `${VAR}` references with environment values. Unset variables are
/// left in place untouched.
fn substitute_env_vars(content: &str) -> String {
    let pattern = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    pattern
        .replace_all(content, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}
