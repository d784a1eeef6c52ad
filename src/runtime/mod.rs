//! Container runtime abstraction
//!
//! The lifecycle manager talks to the container engine only through
//! [`ContainerRuntime`], so the docker CLI can be swapped for a fake in tests.

mod docker;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Mount;
use crate::error::Result;

pub use docker::{shell_join, CliRuntime};

/// Inputs for an image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub image: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
}

/// Inputs for launching a container from a built image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    /// Display identifier forwarded as `DISPLAY`
    pub display: Option<String>,
    pub mounts: Vec<Mount>,
    /// Command override; empty keeps the image entrypoint
    pub command: Vec<String>,
    pub interactive: bool,
}

/// How a process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExitOutcome {
    Code(i32),
    Signaled(i32),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Code(0))
    }

    /// Shell convention: the exit code, or 128 + signal number
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Code(code) => *code,
            ExitOutcome::Signaled(signo) => 128 + signo,
        }
    }

    pub fn from_status(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signo) = status.signal() {
                return ExitOutcome::Signaled(signo);
            }
        }
        ExitOutcome::Code(1)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(code) => write!(f, "exit status {}", code),
            ExitOutcome::Signaled(signo) => write!(f, "killed by signal {}", signo),
        }
    }
}

/// Result of removing an image or container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
}

/// A launched foreground container
pub trait RunningContainer {
    /// Non-blocking poll; `Some` once the process has exited
    fn try_wait(&mut self) -> Result<Option<ExitOutcome>>;

    /// Ask the process to stop (SIGTERM)
    fn terminate(&mut self) -> Result<()>;

    /// Force the process to stop (SIGKILL)
    fn kill(&mut self) -> Result<()>;
}

/// Operations the lifecycle manager needs from a container engine
pub trait ContainerRuntime {
    /// Build an image; a non-zero outcome is returned, not raised
    fn build(&self, request: &BuildRequest) -> Result<ExitOutcome>;

    /// Launch a single foreground container
    fn spawn(&self, spec: &RunSpec) -> Result<Box<dyn RunningContainer>>;

    /// IDs of all containers, running or stopped, created from `image`
    fn list_instances(&self, image: &str) -> Result<Vec<String>>;

    fn remove_instance(&self, id: &str) -> Result<Removal>;

    fn remove_image(&self, image: &str) -> Result<Removal>;
}
