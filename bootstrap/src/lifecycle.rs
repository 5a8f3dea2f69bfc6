//! Bootstrap lifecycle: one linear run from unbuilt to stopped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::entrypoint::{launch_entrypoint, EntrypointHandle};
use crate::environment::{build_environment, BuildConfig, Environment};
use crate::installer::Installer;
use crate::{BootstrapError, BootstrapResult};

/// Coarse lifecycle of one bootstrap run.
///
/// `Stopped` is terminal: a failed build, a failed launch, and a clean exit
/// all end there, and nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BootstrapState {
    Unbuilt,
    Building,
    Built,
    Starting,
    Running,
    Stopped,
}

impl BootstrapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BootstrapState::Stopped)
    }

    /// Check whether a transition to `to` is legal from this state.
    pub fn can_transition(self, to: BootstrapState) -> bool {
        use BootstrapState::*;
        matches!(
            (self, to),
            (Unbuilt, Building)
                | (Building, Built)
                | (Building, Stopped)
                | (Built, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopped)
        )
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapState::Unbuilt => "unbuilt",
            BootstrapState::Building => "building",
            BootstrapState::Built => "built",
            BootstrapState::Starting => "starting",
            BootstrapState::Running => "running",
            BootstrapState::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// Drives one environment through build and launch.
pub struct Bootstrap {
    config: BuildConfig,
    state: BootstrapState,
    environment: Option<Environment>,
}

impl Bootstrap {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            state: BootstrapState::Unbuilt,
            environment: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The built environment, available once `build` has succeeded.
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    fn transition(&mut self, to: BootstrapState) -> BootstrapResult<()> {
        if !self.state.can_transition(to) {
            return Err(BootstrapError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Install dependencies, copy the source tree, and record the exposed
    /// port. A failed build is terminal: the run moves straight to `Stopped`.
    pub async fn build(&mut self, installer: &dyn Installer) -> BootstrapResult<()> {
        self.transition(BootstrapState::Building)?;
        match build_environment(&self.config, installer).await {
            Ok(environment) => {
                info!(
                    environment = %environment.id,
                    port = environment.exposed_port,
                    "environment built"
                );
                self.environment = Some(environment);
                self.transition(BootstrapState::Built)
            }
            Err(e) => {
                self.state = BootstrapState::Stopped;
                Err(e)
            }
        }
    }

    /// Start the entrypoint as the environment's single main process.
    pub async fn launch(&mut self) -> BootstrapResult<EntrypointHandle> {
        self.transition(BootstrapState::Starting)?;
        let (entrypoint, work_dir) = match self.environment.as_ref() {
            Some(environment) => (environment.entrypoint.clone(), environment.work_dir.clone()),
            None => {
                self.state = BootstrapState::Stopped;
                return Err(BootstrapError::Launch {
                    command: self.config.entrypoint.to_string(),
                    reason: "no built environment".to_string(),
                });
            }
        };

        match launch_entrypoint(&entrypoint, &work_dir).await {
            Ok(handle) => {
                self.transition(BootstrapState::Running)?;
                info!(pid = ?handle.id(), command = %entrypoint, "entrypoint started");
                Ok(handle)
            }
            Err(e) => {
                self.state = BootstrapState::Stopped;
                Err(e)
            }
        }
    }

    /// Record that the launched entrypoint has exited. The run is over;
    /// nothing restarts it.
    pub fn observe_exit(&mut self) -> BootstrapResult<()> {
        self.transition(BootstrapState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(BootstrapState::Unbuilt.to_string(), "unbuilt");
        assert_eq!(BootstrapState::Running.to_string(), "running");
        assert_eq!(BootstrapState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_valid_transitions() {
        use BootstrapState::*;
        assert!(Unbuilt.can_transition(Building));
        assert!(Building.can_transition(Built));
        assert!(Building.can_transition(Stopped));
        assert!(Built.can_transition(Starting));
        assert!(Starting.can_transition(Running));
        assert!(Starting.can_transition(Stopped));
        assert!(Running.can_transition(Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        use BootstrapState::*;
        assert!(!Unbuilt.can_transition(Built));
        assert!(!Unbuilt.can_transition(Running));
        assert!(!Built.can_transition(Building));
        assert!(!Built.can_transition(Running));
        assert!(!Running.can_transition(Building));
        assert!(!Stopped.can_transition(Building));
        assert!(!Stopped.can_transition(Running));
        assert!(!Stopped.can_transition(Unbuilt));
    }

    #[test]
    fn test_stopped_is_terminal() {
        assert!(BootstrapState::Stopped.is_terminal());
        assert!(!BootstrapState::Running.is_terminal());
        assert!(!BootstrapState::Unbuilt.is_terminal());
    }

    #[tokio::test]
    async fn test_launch_before_build_is_invalid() {
        let config = BuildConfig::new("requirements.txt", "src", "env");
        let mut bootstrap = Bootstrap::new(config);
        assert_eq!(bootstrap.state(), BootstrapState::Unbuilt);

        let err = bootstrap.launch().await.unwrap_err();
        match err {
            BootstrapError::InvalidTransition { from, to } => {
                assert_eq!(from, BootstrapState::Unbuilt);
                assert_eq!(to, BootstrapState::Starting);
            }
            other => panic!("unexpected error: {other}"),
        }
        // the failed request did not move the state machine
        assert_eq!(bootstrap.state(), BootstrapState::Unbuilt);
    }

    #[test]
    fn test_observe_exit_requires_running() {
        let config = BuildConfig::new("requirements.txt", "src", "env");
        let mut bootstrap = Bootstrap::new(config);
        assert!(bootstrap.observe_exit().is_err());
    }
}
