//! Image lifecycle management
//!
//! Builds the image once per build definition, launches it with display
//! access held for the length of the run, and tears everything down again:
//! - `ensure_built`: build if the marker is absent or stale, then record it
//! - `run`: grant display, launch, wait, revoke
//! - `clean`: remove derived containers, the image and the marker

mod manager;
mod types;

pub use manager::LifecycleManager;
pub use types::{ArtifactRef, BuildOutcome, CleanReport, RunOutcome, StatusReport, TeardownWarning};
