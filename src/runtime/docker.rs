//! Docker-compatible CLI runtime (docker, podman)

use std::io::IsTerminal;
use std::process::{Child, Command, Output, Stdio};

use tracing::debug;

use super::{BuildRequest, ContainerRuntime, ExitOutcome, Removal, RunSpec, RunningContainer};
use crate::error::{CtlError, Result};

/// Runtime driving a docker-compatible binary.
///
/// In dry-run mode every command is printed instead of executed.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    program: String,
    dry_run: bool,
}

impl CliRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub(crate) fn build_args(request: &BuildRequest) -> Vec<String> {
        vec![
            "build".to_string(),
            "-t".to_string(),
            request.image.clone(),
            "-f".to_string(),
            request.dockerfile.to_string_lossy().to_string(),
            request.context.to_string_lossy().to_string(),
        ]
    }

    pub(crate) fn run_args(spec: &RunSpec, tty: bool) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        if spec.interactive {
            args.push("-i".to_string());
            if tty {
                args.push("-t".to_string());
            }
        }

        if let Some(display) = &spec.display {
            args.push("-e".to_string());
            args.push(format!("DISPLAY={}", display));
        }

        for mount in &spec.mounts {
            args.push("-v".to_string());
            args.push(mount.volume_arg());
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    fn announce(&self, args: &[String]) -> bool {
        let line = shell_join(
            std::iter::once(self.program.as_str()).chain(args.iter().map(String::as_str)),
        );
        if self.dry_run {
            println!("Would run: {}", line);
        } else {
            debug!(command = %line, "Invoking container runtime");
        }
        self.dry_run
    }

    fn spawn_error(&self, e: std::io::Error) -> CtlError {
        match e.kind() {
            std::io::ErrorKind::NotFound => {
                CtlError::Runtime(format!("'{}' not found in PATH", self.program))
            }
            _ => CtlError::Runtime(format!("Failed to start '{}': {}", self.program, e)),
        }
    }

    fn capture(&self, args: &[String]) -> Result<Output> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))
    }

    fn remove(&self, args: Vec<String>) -> Result<Removal> {
        if self.announce(&args) {
            return Ok(Removal::Removed);
        }

        let output = self.capture(&args)?;
        if output.status.success() {
            return Ok(Removal::Removed);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_absent_error(&stderr) {
            Ok(Removal::AlreadyAbsent)
        } else {
            Err(CtlError::Runtime(format!(
                "{} {} failed: {}",
                self.program,
                args.join(" "),
                stderr.trim()
            )))
        }
    }
}

/// Engine messages meaning the resource is already gone
fn is_absent_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such image")
        || lower.contains("no such container")
        || lower.contains("image not known")
        || lower.contains("no container with name or id")
}

impl ContainerRuntime for CliRuntime {
    fn build(&self, request: &BuildRequest) -> Result<ExitOutcome> {
        let args = Self::build_args(request);
        if self.announce(&args) {
            return Ok(ExitOutcome::Code(0));
        }

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| self.spawn_error(e))?;
        Ok(ExitOutcome::from_status(status))
    }

    fn spawn(&self, spec: &RunSpec) -> Result<Box<dyn RunningContainer>> {
        let args = Self::run_args(spec, std::io::stdin().is_terminal());
        if self.announce(&args) {
            return Ok(Box::new(DryRunContainer));
        }

        let child = Command::new(&self.program)
            .args(&args)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        debug!(pid = child.id(), "Container process started");
        Ok(Box::new(ChildContainer { child }))
    }

    fn list_instances(&self, image: &str) -> Result<Vec<String>> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "-q".to_string(),
            "--filter".to_string(),
            format!("ancestor={}", image),
        ];
        if self.announce(&args) {
            return Ok(Vec::new());
        }

        let output = self.capture(&args)?;
        if !output.status.success() {
            return Err(CtlError::Runtime(format!(
                "Listing containers of '{}' failed: {}",
                image,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn remove_instance(&self, id: &str) -> Result<Removal> {
        self.remove(vec!["rm".to_string(), "-f".to_string(), id.to_string()])
    }

    fn remove_image(&self, image: &str) -> Result<Removal> {
        self.remove(vec!["rmi".to_string(), image.to_string()])
    }
}

struct ChildContainer {
    child: Child,
}

impl RunningContainer for ChildContainer {
    fn try_wait(&mut self) -> Result<Option<ExitOutcome>> {
        Ok(self.child.try_wait()?.map(ExitOutcome::from_status))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(|_| CtlError::Runtime("Container pid out of range".to_string()))?;
        // SAFETY: pid belongs to a child we have not reaped yet.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            // ESRCH: already gone
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(CtlError::Io(err));
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        match self.child.kill() {
            Ok(()) => Ok(()),
            // already exited and reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(CtlError::Io(e)),
        }
    }
}

struct DryRunContainer;

impl RunningContainer for DryRunContainer {
    fn try_wait(&mut self) -> Result<Option<ExitOutcome>> {
        Ok(Some(ExitOutcome::Code(0)))
    }

    fn terminate(&mut self) -> Result<()> {
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Join arguments into a copy-pasteable shell line
pub fn shell_join<'a>(args: impl IntoIterator<Item = &'a str>) -> String {
    args.into_iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@+%".contains(c));
            if plain {
                arg.to_string()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
