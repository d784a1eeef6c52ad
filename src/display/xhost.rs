//! X11 access control through `xhost`

use std::process::{Command, Stdio};

use tracing::debug;

use super::DisplayAccess;
use crate::error::{CtlError, Result};

/// Default xhost client spec for local containers
pub const LOCAL_CONTAINERS: &str = "local:docker";

/// Runs `xhost +<client>` to grant and `xhost -<client>` to revoke
#[derive(Debug, Clone)]
pub struct XhostAccess {
    program: String,
    client: String,
    dry_run: bool,
}

impl XhostAccess {
    pub fn new() -> Self {
        Self {
            program: "xhost".to_string(),
            client: LOCAL_CONTAINERS.to_string(),
            dry_run: false,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn xhost(&self, sign: char) -> Result<()> {
        let arg = format!("{}{}", sign, self.client);
        if self.dry_run {
            println!("Would run: {} {}", self.program, arg);
            return Ok(());
        }

        debug!(program = %self.program, arg = %arg, "Changing display access");
        let output = Command::new(&self.program)
            .arg(&arg)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    CtlError::Display(format!("'{}' not found in PATH", self.program))
                }
                _ => CtlError::Display(format!("Failed to run '{}': {}", self.program, e)),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CtlError::Display(format!(
                "{} {} failed: {}",
                self.program,
                arg,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl Default for XhostAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayAccess for XhostAccess {
    fn grant(&self) -> Result<()> {
        self.xhost('+')
    }

    fn revoke(&self) -> Result<()> {
        self.xhost('-')
    }
}
