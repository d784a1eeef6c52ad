//! snaketron-ctl - build once, run with display forwarding
//!
//! Builds the snaketron container image only when its Dockerfile changed,
//! runs it in the foreground with access to the host X server, and removes
//! the image and everything derived from it on request.
//!
//! # Example
//!
//! ```no_run
//! use snaketron_ctl::{LauncherConfig, LifecycleManager};
//!
//! let config = LauncherConfig::load(None).unwrap();
//! let manager = LifecycleManager::from_config(config, false);
//! let outcome = manager.build_and_run(false).unwrap();
//! std::process::exit(outcome.exit_code());
//! ```

pub mod cli;
pub mod config;
pub mod definition;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod marker;
pub mod output;
pub mod runtime;
pub mod signal;

pub use config::{LauncherConfig, Mount};
pub use error::{CtlError, Result};
pub use lifecycle::{ArtifactRef, LifecycleManager};
pub use output::{format_output, OutputFormat, Report};
pub use signal::Interrupt;
