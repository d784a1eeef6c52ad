//! Lifecycle manager for the snaketron image
//!
//! The manager owns the one artifact this workspace tracks. The marker file
//! is the only state shared between invocations and is read and written
//! under the build lock.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::types::{
    ArtifactRef, BuildOutcome, CleanReport, RunOutcome, StatusReport, TeardownWarning,
};
use crate::config::LauncherConfig;
use crate::definition::BuildDefinition;
use crate::display::{DisplayAccess, DisplayGrant, NoAccessControl, XhostAccess};
use crate::error::{CtlError, Result};
use crate::marker::{BuildLock, BuildState, MarkerStore};
use crate::runtime::{
    BuildRequest, CliRuntime, ContainerRuntime, ExitOutcome, Removal, RunSpec, RunningContainer,
};
use crate::signal::Interrupt;

/// How often the run loop checks the container and the interrupt flag
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a terminated container may take to exit before it is killed
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(10);

/// Builds, runs and cleans up the configured image
pub struct LifecycleManager {
    config: LauncherConfig,
    runtime: Box<dyn ContainerRuntime>,
    display: Box<dyn DisplayAccess>,
    markers: MarkerStore,
    interrupt: Interrupt,
    dry_run: bool,
    poll_interval: Duration,
    kill_grace: Duration,
}

impl LifecycleManager {
    pub fn new(
        config: LauncherConfig,
        runtime: Box<dyn ContainerRuntime>,
        display: Box<dyn DisplayAccess>,
    ) -> Self {
        let markers = MarkerStore::new(config.marker_path());
        Self {
            config,
            runtime,
            display,
            markers,
            interrupt: Interrupt::new(),
            dry_run: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Manager backed by the configured CLI runtime and xhost
    pub fn from_config(config: LauncherConfig, dry_run: bool) -> Self {
        let runtime = CliRuntime::new(config.runtime.clone()).dry_run(dry_run);
        let display: Box<dyn DisplayAccess> = if config.xhost {
            Box::new(
                XhostAccess::new()
                    .with_client(config.xhost_client.clone())
                    .dry_run(dry_run),
            )
        } else {
            Box::new(NoAccessControl)
        };

        Self::new(config, Box::new(runtime), display).dry_run(dry_run)
    }

    /// In dry-run mode the marker and lock are never touched
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Time between SIGTERM and SIGKILL when the container keeps running
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// The artifact this workspace builds
    pub fn artifact(&self) -> ArtifactRef {
        ArtifactRef::new(self.config.image.clone())
    }

    /// Build the image unless the marker shows it is already built from the
    /// current build definition. `force` rebuilds regardless.
    pub fn ensure_built(&self, force: bool) -> Result<BuildOutcome> {
        let artifact = self.artifact();
        let definition = BuildDefinition::load(&self.config.dockerfile_path())?;
        let _lock = self.lock()?;

        let recorded = self.markers.load()?;
        if let Some(state) = &recorded {
            if !force && state.is_current(artifact.name(), &definition.fingerprint) {
                info!(artifact = %artifact, "Image is up to date, skipping build");
                return Ok(BuildOutcome {
                    artifact,
                    fingerprint: definition.fingerprint,
                    built: false,
                });
            }
            if state.artifact != artifact.name() {
                warn!(
                    previous = %state.artifact,
                    artifact = %artifact,
                    "Marker tracks a different image, which will no longer be cleaned"
                );
            } else if !force {
                info!(artifact = %artifact, "Build definition changed, rebuilding");
            }
        }

        info!(
            artifact = %artifact,
            dockerfile = %definition.path.display(),
            "Building image"
        );
        let request = BuildRequest {
            image: artifact.name().to_string(),
            dockerfile: definition.path.clone(),
            context: self.config.context.clone(),
        };
        let exit = self.runtime.build(&request)?;
        if !exit.success() {
            return Err(CtlError::Build {
                artifact: artifact.to_string(),
                status: exit.to_string(),
            });
        }

        if !self.dry_run {
            self.markers
                .store(&BuildState::new(artifact.name(), definition.fingerprint.clone()))?;
        }
        info!(artifact = %artifact, "Image built");

        Ok(BuildOutcome {
            artifact,
            fingerprint: definition.fingerprint,
            built: true,
        })
    }

    /// Launch the built image in the foreground with display access.
    ///
    /// Display access is revoked on every path out of this function,
    /// including an interrupt delivered while the container runs.
    pub fn run(&self, artifact: &ArtifactRef) -> Result<RunOutcome> {
        if !self.dry_run {
            match self.markers.load()? {
                Some(state) if state.artifact == artifact.name() => {}
                _ => return Err(CtlError::NotBuilt(artifact.to_string())),
            }
        }

        if self.interrupt.is_set() {
            return Err(CtlError::Signal("Interrupted before launch".to_string()));
        }

        let spec = RunSpec {
            image: artifact.name().to_string(),
            display: self.config.display_value(),
            mounts: self.config.run_mounts(),
            command: self.config.command.clone(),
            interactive: self.config.interactive,
        };
        if spec.display.is_none() {
            warn!("DISPLAY is not set, the container will not be able to open a window");
        }

        let grant = DisplayGrant::acquire(&*self.display)?;
        info!(artifact = %artifact, "Launching container");
        let mut container = self.runtime.spawn(&spec)?;
        let exit = self.wait(&mut *container)?;
        let interrupted = self.interrupt.is_set();

        if let Err(e) = grant.release() {
            warn!(error = %e, "Failed to revoke display access");
        }

        info!(artifact = %artifact, %exit, interrupted, "Container exited");
        Ok(RunOutcome {
            artifact: artifact.clone(),
            exit,
            interrupted,
        })
    }

    /// `ensure_built` followed by `run`
    pub fn build_and_run(&self, force: bool) -> Result<RunOutcome> {
        let outcome = self.ensure_built(force)?;
        self.run(&outcome.artifact)
    }

    /// Remove every container derived from the tracked image, the image
    /// itself, and the marker. Resources that are already gone count as
    /// removed; other failures become warnings.
    pub fn clean(&self) -> Result<CleanReport> {
        if !self.markers.exists() {
            info!("Nothing to clean");
            return Ok(CleanReport::default());
        }

        let _lock = self.lock()?;
        let artifact = match self.markers.load() {
            Ok(Some(state)) => ArtifactRef::new(state.artifact),
            Ok(None) => {
                info!("Nothing to clean");
                return Ok(CleanReport::default());
            }
            Err(CtlError::Marker(message)) => {
                warn!(%message, "Unreadable marker, cleaning the configured image instead");
                self.artifact()
            }
            Err(e) => return Err(e),
        };

        let mut report = CleanReport {
            artifact: Some(artifact.clone()),
            ..Default::default()
        };

        let instances = match self.runtime.list_instances(artifact.name()) {
            Ok(ids) => ids,
            Err(e) => {
                report.warnings.push(self.teardown_warning(
                    format!("containers of {}", artifact),
                    e,
                ));
                Vec::new()
            }
        };

        for id in instances {
            match self.runtime.remove_instance(&id) {
                Ok(Removal::Removed) => {
                    debug!(container = %id, "Container removed");
                    report.removed_instances.push(id);
                }
                Ok(Removal::AlreadyAbsent) => debug!(container = %id, "Container already gone"),
                Err(e) => {
                    report
                        .warnings
                        .push(self.teardown_warning(format!("container {}", id), e));
                }
            }
        }

        match self.runtime.remove_image(artifact.name()) {
            Ok(Removal::Removed) => {
                info!(artifact = %artifact, "Image removed");
                report.image_removed = true;
            }
            Ok(Removal::AlreadyAbsent) => debug!(artifact = %artifact, "Image already gone"),
            Err(e) => {
                report
                    .warnings
                    .push(self.teardown_warning(format!("image {}", artifact), e));
            }
        }

        if !self.dry_run {
            report.marker_removed = self.markers.remove()?;
        }

        Ok(report)
    }

    /// Describe the marker and whether it matches the current build definition
    pub fn status(&self) -> Result<StatusReport> {
        let artifact = self.artifact();
        let recorded = self.markers.load()?;
        let fingerprint = match BuildDefinition::load(&self.config.dockerfile_path()) {
            Ok(definition) => Some(definition.fingerprint),
            Err(CtlError::DefinitionMissing(_)) => None,
            Err(e) => return Err(e),
        };

        let fresh = match (&recorded, &fingerprint) {
            (Some(state), Some(fp)) => state.is_current(artifact.name(), fp),
            _ => false,
        };

        Ok(StatusReport {
            artifact,
            marker: self.markers.path().to_path_buf(),
            recorded_artifact: recorded.as_ref().map(|s| s.artifact.clone()),
            built_at: recorded.map(|s| s.built_at),
            fingerprint,
            fresh,
        })
    }

    fn lock(&self) -> Result<Option<BuildLock>> {
        if self.dry_run {
            return Ok(None);
        }
        BuildLock::acquire(self.config.lock_path()).map(Some)
    }

    /// Poll until the container exits. The first interrupt sends SIGTERM;
    /// another interrupt, or the grace period running out, sends SIGKILL.
    fn wait(&self, container: &mut dyn RunningContainer) -> Result<ExitOutcome> {
        let mut terminated: Option<(Instant, usize)> = None;
        let mut killed = false;
        loop {
            if let Some(exit) = container.try_wait()? {
                return Ok(exit);
            }

            let interrupts = self.interrupt.count();
            match terminated {
                None if interrupts > 0 => {
                    info!("Interrupt received, stopping container");
                    if let Err(e) = container.terminate() {
                        warn!(error = %e, "Failed to signal container");
                    }
                    terminated = Some((Instant::now(), interrupts));
                }
                Some((since, seen))
                    if !killed && (interrupts > seen || since.elapsed() >= self.kill_grace) =>
                {
                    warn!(interrupts, "Container is still running, killing it");
                    if let Err(e) = container.kill() {
                        warn!(error = %e, "Failed to kill container");
                    }
                    killed = true;
                }
                _ => {}
            }

            thread::sleep(self.poll_interval);
        }
    }

    fn teardown_warning(&self, resource: String, error: CtlError) -> TeardownWarning {
        let warning = TeardownWarning {
            resource,
            message: error.to_string(),
        };
        warn!(resource = %warning.resource, message = %warning.message, "Teardown step failed");
        warning
    }
}
