//! Build definition fingerprinting
//!
//! The Dockerfile content is the only invalidation signal for a built image:
//! two definitions with the same bytes produce the same fingerprint.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{CtlError, Result};

/// A build definition and the fingerprint of its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDefinition {
    pub path: PathBuf,
    pub fingerprint: String,
}

impl BuildDefinition {
    /// Read and fingerprint the definition at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CtlError::DefinitionMissing(path.to_path_buf()),
            _ => CtlError::Io(e),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            fingerprint: fingerprint(&bytes),
        })
    }
}

/// Lowercase hex sha256 of `bytes`
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
