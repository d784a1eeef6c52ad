//! Existence marker persistence
//!
//! The marker records which artifact was built from which build definition.
//! It is written only after a successful build and removed by `clean`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CtlError, Result};

/// Persisted record of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    /// Image name of the built artifact
    pub artifact: String,
    /// Fingerprint of the build definition the artifact was built from
    pub fingerprint: String,
    /// When the build finished
    pub built_at: DateTime<Utc>,
}

impl BuildState {
    pub fn new(artifact: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            fingerprint: fingerprint.into(),
            built_at: Utc::now(),
        }
    }

    /// Whether this record still describes `artifact` built from `fingerprint`
    pub fn is_current(&self, artifact: &str, fingerprint: &str) -> bool {
        self.artifact == artifact && self.fingerprint == fingerprint
    }
}

/// Reads and writes the marker file
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the marker, `None` when absent.
    ///
    /// A marker holding only an image name (no JSON) is accepted with an
    /// empty fingerprint, so it is tracked for cleanup but always stale.
    pub fn load(&self) -> Result<Option<BuildState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CtlError::Io(e)),
        };

        match serde_json::from_str::<BuildState>(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                let name = content.trim();
                if name.is_empty() || name.contains(char::is_whitespace) || name.starts_with('{') {
                    return Err(CtlError::Marker(format!(
                        "Unreadable marker {}: {}",
                        self.path.display(),
                        e
                    )));
                }
                warn!(
                    marker = %self.path.display(),
                    artifact = name,
                    "Marker has no fingerprint, treating as stale"
                );
                Ok(Some(BuildState {
                    artifact: name.to_string(),
                    fingerprint: String::new(),
                    built_at: DateTime::<Utc>::default(),
                }))
            }
        }
    }

    /// Write the marker atomically (temp file then rename)
    pub fn store(&self, state: &BuildState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| CtlError::Marker(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(marker = %self.path.display(), artifact = %state.artifact, "Marker written");
        Ok(())
    }

    /// Delete the marker; returns whether one existed
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CtlError::Io(e)),
        }
    }
}

/// Exclusive lock around the check-build-record sequence.
///
/// An advisory `flock` on `<marker>.lock`. The file stays on disk; the kernel
/// releases the lock when the holder exits, however it exits.
#[derive(Debug)]
pub struct BuildLock {
    file: File,
    path: PathBuf,
}

impl BuildLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Err(CtlError::LockHeld(path));
            }
            return Err(CtlError::Io(e));
        }

        // Holder pid, informational only
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        debug!(lock = %path.display(), "Build lock acquired");
        Ok(Self { file, path })
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "Failed to release build lock");
        }
    }
}
