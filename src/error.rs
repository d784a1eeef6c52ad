//! Error types for snaketron-ctl

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtlError {
    #[error("Build of '{artifact}' failed: {status}")]
    Build { artifact: String, status: String },

    #[error("Image '{0}' has not been built. Run `snaketron-ctl build` first")]
    NotBuilt(String),

    #[error("Another snaketron-ctl process holds the lock at {}", .0.display())]
    LockHeld(PathBuf),

    #[error("Build definition not found: {}", .0.display())]
    DefinitionMissing(PathBuf),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Display error: {0}")]
    Display(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Marker error: {0}")]
    Marker(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CtlError>;
