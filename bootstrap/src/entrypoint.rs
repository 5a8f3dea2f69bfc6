//! Entrypoint process launch and its owning handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::ExitStatus;
use tokio::process::{Child, Command};

use crate::{BootstrapError, BootstrapResult};

/// Command invocation started as the environment's main process.
///
/// The default mirrors the deployed service: `python main.py`, run from the
/// environment's working directory with no extra environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrypointSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env_vars: Vec<(String, String)>,
}

impl Default for EntrypointSpec {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["main.py".to_string()],
            env_vars: Vec::new(),
        }
    }
}

impl EntrypointSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for EntrypointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Owned handle to the single launched entrypoint process.
///
/// Dropping the handle tears the process down; nothing restarts it.
#[derive(Debug)]
pub struct EntrypointHandle {
    spec: EntrypointSpec,
    child: Child,
    exit: Option<ExitStatus>,
}

impl EntrypointHandle {
    pub fn spec(&self) -> &EntrypointSpec {
        &self.spec
    }

    /// OS process id, while the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.is_some()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Wait for the process to exit. Exit is terminal: repeated calls return
    /// the recorded status.
    pub async fn wait(&mut self) -> BootstrapResult<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }
}

/// Spawn the entrypoint in the environment's working directory.
pub async fn launch_entrypoint(
    spec: &EntrypointSpec,
    work_dir: &Path,
) -> BootstrapResult<EntrypointHandle> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(work_dir)
        .kill_on_drop(true);
    for (key, value) in &spec.env_vars {
        command.env(key, value);
    }

    let child = command
        .spawn()
        .map_err(|e| BootstrapError::Launch {
            command: spec.to_string(),
            reason: e.to_string(),
        })?;

    Ok(EntrypointHandle {
        spec: spec.clone(),
        child,
        exit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entrypoint_is_python_main() {
        let spec = EntrypointSpec::default();
        assert_eq!(spec.program, "python");
        assert_eq!(spec.args, vec!["main.py"]);
        assert!(spec.env_vars.is_empty());
    }

    #[test]
    fn test_display_joins_program_and_args() {
        assert_eq!(EntrypointSpec::default().to_string(), "python main.py");
        assert_eq!(EntrypointSpec::new("service").to_string(), "service");
    }

    #[test]
    fn test_builder_methods() {
        let spec = EntrypointSpec::new("sh")
            .with_args(["-c", "true"])
            .with_env_var("PORT", "5001");
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec!["-c", "true"]);
        assert_eq!(spec.env_vars, vec![("PORT".to_string(), "5001".to_string())]);
    }

    #[tokio::test]
    async fn test_launch_and_wait_success() {
        let dir = tempfile::tempdir().unwrap();
        let spec = EntrypointSpec::new("sh").with_args(["-c", "exit 0"]);
        let mut handle = launch_entrypoint(&spec, dir.path()).await.unwrap();
        let status = handle.wait().await.unwrap();
        assert!(status.success());
        assert!(handle.has_exited());
        assert_eq!(handle.exit_status(), Some(status));
        // a second wait returns the same recorded status
        assert!(handle.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_wait_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let spec = EntrypointSpec::new("sh").with_args(["-c", "exit 3"]);
        let mut handle = launch_entrypoint(&spec, dir.path()).await.unwrap();
        let status = handle.wait().await.unwrap();
        assert!(!status.success());
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_launch_missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let spec = EntrypointSpec::new("definitely-not-a-real-program-xyz");
        let err = launch_entrypoint(&spec, dir.path()).await.unwrap_err();
        match err {
            BootstrapError::Launch { command, .. } => {
                assert_eq!(command, "definitely-not-a-real-program-xyz");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
