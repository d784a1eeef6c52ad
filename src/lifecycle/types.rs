//! Values produced by lifecycle operations

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::runtime::ExitOutcome;

/// Name of a built image
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of `ensure_built`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub artifact: ArtifactRef,
    /// Fingerprint of the build definition in effect
    pub fingerprint: String,
    /// Whether the build step actually ran
    pub built: bool,
}

/// Result of `run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub artifact: ArtifactRef,
    pub exit: ExitOutcome,
    /// An interrupt arrived while the container was running
    pub interrupted: bool,
}

impl RunOutcome {
    /// Exit code for the workflow process
    pub fn exit_code(&self) -> i32 {
        let code = self.exit.code();
        if self.interrupted && code == 0 {
            130
        } else {
            code
        }
    }
}

/// A teardown step that failed for a reason other than "already gone"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownWarning {
    pub resource: String,
    pub message: String,
}

impl fmt::Display for TeardownWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

/// Result of `clean`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Artifact tracked by the marker, `None` when nothing was tracked
    pub artifact: Option<ArtifactRef>,
    pub removed_instances: Vec<String>,
    pub image_removed: bool,
    pub marker_removed: bool,
    pub warnings: Vec<TeardownWarning>,
}

impl CleanReport {
    pub fn nothing_to_clean(&self) -> bool {
        self.artifact.is_none()
    }
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub artifact: ArtifactRef,
    pub marker: PathBuf,
    /// Artifact recorded in the marker, if any
    pub recorded_artifact: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    /// Fingerprint of the current build definition, `None` if it is missing
    pub fingerprint: Option<String>,
    /// Marker matches the configured artifact and current definition
    pub fresh: bool,
}

impl StatusReport {
    pub fn built(&self) -> bool {
        self.recorded_artifact.is_some()
    }
}
